use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use strata_core::Config;

const USAGE: &str = "\
usage: strata [--verbose] <command> [options]

commands:
  render   bounce to a WAV file
  play     stream to the default output device (built with --features device)

options:
  --out PATH         output file for render (default: strata.wav)
  --seconds N        length in seconds (default: 10)
  --bpm N            override the tempo
  --project FILE     play a saved project instead of the demo
  -v, --verbose      debug logging";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Render,
    Play,
    Help,
}

#[derive(Debug, Clone, PartialEq)]
struct Args {
    command: Command,
    verbose: bool,
    out: PathBuf,
    seconds: f64,
    bpm: Option<f64>,
    project: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args {
        command: Command::Help,
        verbose: false,
        out: PathBuf::from("strata.wav"),
        seconds: 10.0,
        bpm: None,
        project: None,
    };
    let mut command = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--verbose" | "-v" => parsed.verbose = true,
            "--help" | "-h" => command = Some(Command::Help),
            "--out" => parsed.out = PathBuf::from(value(&mut iter, arg)?),
            "--seconds" => parsed.seconds = number(&mut iter, arg)?,
            "--bpm" => parsed.bpm = Some(number(&mut iter, arg)?),
            "--project" => parsed.project = Some(PathBuf::from(value(&mut iter, arg)?)),
            "render" if command.is_none() => command = Some(Command::Render),
            "play" if command.is_none() => command = Some(Command::Play),
            "help" if command.is_none() => command = Some(Command::Help),
            other => return Err(format!("unexpected argument '{}'", other)),
        }
    }
    parsed.command = command.unwrap_or(Command::Help);
    if !(parsed.seconds.is_finite() && parsed.seconds > 0.0) {
        return Err(format!("--seconds must be positive, got {}", parsed.seconds));
    }
    Ok(parsed)
}

fn value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<&'a str, String> {
    iter.next()
        .map(String::as_str)
        .ok_or_else(|| format!("{} needs a value", flag))
}

fn number<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<f64, String> {
    let raw = value(iter, flag)?;
    raw.parse()
        .map_err(|_| format!("{} expects a number, got '{}'", flag, raw))
}

fn init_logging(verbose: bool) {
    use simplelog::{
        ColorChoice, CombinedLogger, LevelFilter, SharedLogger, TermLogger, TerminalMode,
        WriteLogger,
    };

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("strata")
        .join("strata.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        log_level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    match File::create(&log_path) {
        Ok(file) => loggers.push(WriteLogger::new(
            LevelFilter::Debug,
            simplelog::Config::default(),
            file,
        )),
        Err(e) => eprintln!("strata: not logging to {}: {}", log_path.display(), e),
    }
    let _ = CombinedLogger::init(loggers);

    log::debug!("strata starting (log level: {:?})", log_level);
}

fn run(args: &Args) -> Result<(), String> {
    let config = Config::load();
    match args.command {
        Command::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        Command::Render => {
            let summary = match &args.project {
                Some(project) => strata_core::render_project(
                    &config,
                    project,
                    &args.out,
                    args.seconds,
                    args.bpm,
                )?,
                None => strata_core::render_demo(&config, &args.out, args.seconds, args.bpm)?,
            };
            if summary.peak > 1.0 {
                log::warn!(target: "render", "output clips (peak {:.2})", summary.peak);
            }
            Ok(())
        }
        Command::Play => play(&config, args),
    }
}

#[cfg(feature = "device")]
fn play(config: &Config, args: &Args) -> Result<(), String> {
    use strata_core::{demo, Session};

    let (mut session, engine) = match &args.project {
        Some(project) => Session::from_project(&config.engine_config(), project)?,
        None => demo::demo_session(config),
    };
    if let Some(bpm) = args.bpm {
        session.set_tempo(bpm);
    }
    session.play();
    strata_core::device::play(engine, args.seconds)
}

#[cfg(not(feature = "device"))]
fn play(_config: &Config, _args: &Args) -> Result<(), String> {
    Err("this build has no audio device support; rebuild with --features device".to_string())
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("strata: {}\n\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

//! # strata-core
//!
//! Control-side glue around the real-time engine: configuration, the
//! editable session, offline rendering, and (with the `device` feature) live
//! output through the system's default audio device.

pub mod config;
pub mod demo;
#[cfg(feature = "device")]
pub mod device;
pub mod render;
pub mod session;

pub use config::Config;
pub use render::{render_demo, render_project, render_to_wav, AudioSource, RenderSummary};
pub use session::{load_project, save_project, Session};

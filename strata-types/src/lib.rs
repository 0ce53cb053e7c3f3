//! # strata-types
//!
//! Shared data model for the Strata sequencing and synthesis core.
//! Patterns, their arrangement on a timeline, transport settings, and the
//! snapshot structs an external serializer reads and writes. Everything here
//! is owned by the control thread; the audio thread only ever sees published
//! copies.

pub mod state;

// Re-export all state types at crate root for convenience
pub use state::*;

/// Unique identifier for a pattern in a timeline's library.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct PatternId(u32);

impl PatternId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PatternId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Addressable processing node on the audio thread (synth, effect slots).
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// The synthesizer is always node 0; effect slots follow from 1.
    pub const SYNTH: NodeId = NodeId(0);

    pub fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }

    /// Node id of the effect in slot `slot` (0-based).
    pub fn effect(slot: usize) -> Self {
        Self(slot as u32 + 1)
    }

    /// Effect slot addressed by this node, `None` for the synth.
    pub fn effect_slot(self) -> Option<usize> {
        self.0.checked_sub(1).map(|s| s as usize)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a parameter within a node's parameter list (0-based).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ParamIndex(u32);

impl ParamIndex {
    pub fn new(idx: u32) -> Self {
        Self(idx)
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ParamIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

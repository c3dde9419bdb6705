//! `guidepost` - guided onboarding overlay for a note-taking web app
//!
//! This library provides the onboarding overlay state machine, the persisted
//! "seen" flag it consults, and a terminal session that hosts it.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod overlay;
pub mod page;
pub mod session;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use overlay::{
    Acknowledgment, InstructionStep, OnboardingOverlay, OverlayOptions, OverlayState, Phase,
    Point, Rect,
};
pub use page::PageState;
pub use session::Session;
pub use storage::{FlagStore, MemoryFlagStore, SqliteFlagStore};

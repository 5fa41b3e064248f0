//! # MSU Scripter Common Library
//!
//! Shared code for the MSU Scripter workspace:
//! - Error taxonomy shared by every engine
//! - TOML bootstrap configuration and logging settings
//! - Event types and the broadcast event bus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{EventBus, ScripterEvent};

//! Types and configuration shared by every slide-chat crate.

pub mod config;
pub mod types;

pub use config::{ConfigError, SlideConfig};
pub use types::{ChatMessage, Role, SlideSummary};

//! `flytime-core` — types, configuration and formatting shared by every
//! flytime crate.

pub mod config;
pub mod error;
pub mod format;
pub mod types;

pub use error::{FlytimeError, Result};
pub use format::format_duration;
pub use types::{Balance, EntityId};

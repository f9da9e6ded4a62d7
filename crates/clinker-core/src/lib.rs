pub mod config;
pub mod error;
pub mod types;

pub use config::ClinkerConfig;
pub use error::{ClinkerError, Result};
pub use types::*;

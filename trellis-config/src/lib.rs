// Options handling for the Trellis runtime

pub mod error;
pub mod options;
pub mod provider;

pub use error::{ConfigError, Result};
pub use options::Options;
pub use provider::{OptionsExt, OptionsProvider};

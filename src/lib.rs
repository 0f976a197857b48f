// Trellis - a small application runtime built around a name-keyed
// dependency-injection container and a middleware-driven HTTP router.

// Re-export core functionality
pub use trellis_core::*;

// Re-export optional crates
#[cfg(feature = "config")]
pub use trellis_config;

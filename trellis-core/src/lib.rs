// Core library for the Trellis application runtime
// This module contains the container, resolver, routing and middleware components

pub mod application;
pub mod container;
pub mod error;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod provider;
pub mod router_provider;
pub mod routing;

// Re-export commonly used types
pub use application::*;
pub use container::*;
pub use error::*;
pub use http::*;
pub use middleware::*;
pub use provider::*;
pub use router_provider::*;
pub use routing::{error_handler, Context, ContextFn, ErrorHandler, Handler, Route, Router, RouterState};

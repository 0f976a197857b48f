// Provider contract and container delegates

use crate::container::FactoryRecipe;
use crate::http::MethodMask;
use crate::middleware::{AfterSpec, MiddlewareSpec};
use crate::routing::{ContextFn, ErrorHandler, Handler};
use crate::Error;
use std::sync::Arc;

/// A provider supplies the build recipe for a service and, optionally,
/// delegate methods that become registration shorthands on the container.
pub trait ServiceProvider: Send + Sync {
    /// Dependency names plus build function for the service this provider
    /// backs.
    fn factory(&self) -> FactoryRecipe;

    /// Delegate methods to merge into the container's callable surface.
    fn delegates(&self) -> Vec<Delegate> {
        Vec::new()
    }
}

/// A delegate call queued on the container: executed at boot with the
/// arguments captured at call time.
pub type DelegateFn = Arc<dyn Fn(DelegateArgs) -> Result<(), Error> + Send + Sync>;

/// A named delegate exposed by a provider.
pub struct Delegate {
    pub name: String,
    pub call: DelegateFn,
}

impl Delegate {
    pub fn new<F>(name: impl Into<String>, call: F) -> Self
    where
        F: Fn(DelegateArgs) -> Result<(), Error> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            call: Arc::new(call),
        }
    }
}

/// One positional delegate argument.
///
/// Delegates are dispatched by name through an explicit registry, so their
/// arguments travel as a typed positional list instead of loose variadics.
#[derive(Clone)]
pub enum DelegateArg {
    Str(String),
    Mask(MethodMask),
    Handler(Handler),
    Middleware(MiddlewareSpec),
    After(AfterSpec),
    ErrorHandler(ErrorHandler),
    Configurator(ContextFn),
}

/// Positional argument list for a delegate call.
#[derive(Clone, Default)]
pub struct DelegateArgs {
    values: Vec<DelegateArg>,
}

impl DelegateArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, value: DelegateArg) -> Self {
        self.values.push(value);
        self
    }

    pub fn with_str(self, value: impl Into<String>) -> Self {
        self.push(DelegateArg::Str(value.into()))
    }

    pub fn with_mask(self, mask: MethodMask) -> Self {
        self.push(DelegateArg::Mask(mask))
    }

    pub fn with_handler(self, handler: Handler) -> Self {
        self.push(DelegateArg::Handler(handler))
    }

    pub fn with_middleware(self, middleware: MiddlewareSpec) -> Self {
        self.push(DelegateArg::Middleware(middleware))
    }

    pub fn with_after(self, after: AfterSpec) -> Self {
        self.push(DelegateArg::After(after))
    }

    pub fn with_error_handler(self, handler: ErrorHandler) -> Self {
        self.push(DelegateArg::ErrorHandler(handler))
    }

    pub fn with_configurator(self, configure: ContextFn) -> Self {
        self.push(DelegateArg::Configurator(configure))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn str_at(&self, index: usize) -> Result<String, Error> {
        match self.values.get(index) {
            Some(DelegateArg::Str(value)) => Ok(value.clone()),
            _ => Err(self.mismatch(index, "string")),
        }
    }

    pub fn mask_at(&self, index: usize) -> Result<MethodMask, Error> {
        match self.values.get(index) {
            Some(DelegateArg::Mask(mask)) => Ok(*mask),
            _ => Err(self.mismatch(index, "method mask")),
        }
    }

    pub fn handler_at(&self, index: usize) -> Result<Handler, Error> {
        match self.values.get(index) {
            Some(DelegateArg::Handler(handler)) => Ok(handler.clone()),
            _ => Err(self.mismatch(index, "handler")),
        }
    }

    pub fn middleware_at(&self, index: usize) -> Result<MiddlewareSpec, Error> {
        match self.values.get(index) {
            Some(DelegateArg::Middleware(middleware)) => Ok(middleware.clone()),
            _ => Err(self.mismatch(index, "middleware")),
        }
    }

    pub fn after_at(&self, index: usize) -> Result<AfterSpec, Error> {
        match self.values.get(index) {
            Some(DelegateArg::After(after)) => Ok(after.clone()),
            _ => Err(self.mismatch(index, "response middleware")),
        }
    }

    pub fn error_handler_at(&self, index: usize) -> Result<ErrorHandler, Error> {
        match self.values.get(index) {
            Some(DelegateArg::ErrorHandler(handler)) => Ok(handler.clone()),
            _ => Err(self.mismatch(index, "error handler")),
        }
    }

    pub fn configurator_at(&self, index: usize) -> Result<ContextFn, Error> {
        match self.values.get(index) {
            Some(DelegateArg::Configurator(configure)) => Ok(configure.clone()),
            _ => Err(self.mismatch(index, "context configurator")),
        }
    }

    fn mismatch(&self, index: usize, expected: &str) -> Error {
        Error::DelegateArg(format!("argument {index} must be a {expected}"))
    }
}

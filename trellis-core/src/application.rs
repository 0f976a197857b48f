// Application surface: container plus router sugar

use crate::container::{Container, Injected, ResolvedArgs, ServiceValue};
use crate::logging::{debug, error};
use crate::middleware::{AfterSpec, MiddlewareSpec};
use crate::provider::{DelegateArgs, ServiceProvider};
use crate::routing::{error_handler, Context, Handler, Router};
use crate::{Error, HttpRequest, HttpResponse, MethodMask};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;

/// The application: a container with the router pre-registered and the
/// router's delegates re-exposed as typed methods.
///
/// The expected lifecycle is a four-step protocol: construct, register
/// services and routes, [`App::boot`], then [`App::handle`] once per
/// request, with the surrounding transport owning the sockets.
#[derive(Debug)]
pub struct App {
    container: Container,
}

impl App {
    pub fn new() -> Self {
        let container = Container::new();
        container
            .provider("Router", crate::router_provider::RouterProvider::new())
            .expect("fresh container accepts the router provider");
        Self { container }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    // ----- registration passthrough -----

    pub fn constant<T: Any + Send + Sync>(&self, name: &str, value: T) -> Result<&Self, Error> {
        self.container.constant(name, value)?;
        Ok(self)
    }

    pub fn value<T: Any + Send + Sync>(&self, name: &str, value: T) -> Result<&Self, Error> {
        self.container.value(name, value)?;
        Ok(self)
    }

    pub fn factory<I, S, F>(&self, name: &str, dependencies: I, build: F) -> Result<&Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(ResolvedArgs) -> Result<ServiceValue, Error> + Send + Sync + 'static,
    {
        self.container.factory(name, dependencies, build)?;
        Ok(self)
    }

    pub fn provider<P>(&self, name: &str, provider: P) -> Result<&Self, Error>
    where
        P: ServiceProvider + Any + Send + Sync,
    {
        self.container.provider(name, provider)?;
        Ok(self)
    }

    pub fn config(&self, config: Injected<()>) -> Result<&Self, Error> {
        self.container.config(config)?;
        Ok(self)
    }

    // ----- router delegate sugar -----

    pub fn get(&self, pattern: impl Into<String>, handler: Handler) -> Result<&Self, Error> {
        self.route_delegate("get", pattern, handler)
    }

    pub fn post(&self, pattern: impl Into<String>, handler: Handler) -> Result<&Self, Error> {
        self.route_delegate("post", pattern, handler)
    }

    pub fn put(&self, pattern: impl Into<String>, handler: Handler) -> Result<&Self, Error> {
        self.route_delegate("put", pattern, handler)
    }

    pub fn patch(&self, pattern: impl Into<String>, handler: Handler) -> Result<&Self, Error> {
        self.route_delegate("patch", pattern, handler)
    }

    pub fn delete(&self, pattern: impl Into<String>, handler: Handler) -> Result<&Self, Error> {
        self.route_delegate("delete", pattern, handler)
    }

    pub fn any(&self, pattern: impl Into<String>, handler: Handler) -> Result<&Self, Error> {
        self.route_delegate("any", pattern, handler)
    }

    /// Register a route with an explicit method mask, e.g.
    /// `MethodMask::POST | MethodMask::DELETE`.
    pub fn request(
        &self,
        mask: MethodMask,
        pattern: impl Into<String>,
        handler: Handler,
    ) -> Result<&Self, Error> {
        self.container.delegate(
            "request",
            DelegateArgs::new()
                .with_mask(mask)
                .with_str(pattern)
                .with_handler(handler),
        )?;
        Ok(self)
    }

    /// Group routes under a shared path prefix with their own middleware
    /// scope.
    pub fn context<F>(&self, prefix: impl Into<String>, configure: F) -> Result<&Self, Error>
    where
        F: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.container.delegate(
            "context",
            DelegateArgs::new()
                .with_str(prefix)
                .with_configurator(Arc::new(configure)),
        )?;
        Ok(self)
    }

    pub fn before(&self, middleware: MiddlewareSpec) -> Result<&Self, Error> {
        self.container
            .delegate("before", DelegateArgs::new().with_middleware(middleware))?;
        Ok(self)
    }

    pub fn after(&self, middleware: AfterSpec) -> Result<&Self, Error> {
        self.container
            .delegate("after", DelegateArgs::new().with_after(middleware))?;
        Ok(self)
    }

    pub fn otherwise(&self, handler: Handler) -> Result<&Self, Error> {
        self.container
            .delegate("otherwise", DelegateArgs::new().with_handler(handler))?;
        Ok(self)
    }

    pub fn error<F, Fut>(&self, handler: F) -> Result<&Self, Error>
    where
        F: Fn(Error, HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.container.delegate(
            "error",
            DelegateArgs::new().with_error_handler(error_handler(handler)),
        )?;
        Ok(self)
    }

    /// Call any registered delegate by name.
    pub fn delegate(&self, name: &str, args: DelegateArgs) -> Result<&Self, Error> {
        self.container.delegate(name, args)?;
        Ok(self)
    }

    // ----- lifecycle -----

    /// Freeze registration and run the deferred configuration queue.
    pub fn boot(&self) -> Result<&Self, Error> {
        self.container.boot()?;
        Ok(self)
    }

    /// Dispatch one request through the router, surfacing errors.
    pub async fn try_handle(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        if !self.container.is_booted() {
            return Err(Error::IllegalState(
                "handle called before the container was booted".into(),
            ));
        }
        let router = self.container.get_as::<Router>("Router")?;
        router.handle(request).await
    }

    /// Dispatch one request, always producing a well-formed response: an
    /// error not recovered inside the router becomes a plain 500.
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        match self.try_handle(request).await {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, "unhandled dispatch error");
                HttpResponse::internal_server_error().with_text("Internal server error")
            }
        }
    }

    fn route_delegate(
        &self,
        name: &str,
        pattern: impl Into<String>,
        handler: Handler,
    ) -> Result<&Self, Error> {
        debug!(delegate = name, "queueing route registration");
        self.container.delegate(
            name,
            DelegateArgs::new().with_str(pattern).with_handler(handler),
        )?;
        Ok(self)
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

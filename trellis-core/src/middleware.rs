// Middleware pipeline for request/response processing

use crate::container::{Injector, ResolvedArgs};
use crate::logging::{debug, trace};
use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed response future, the return shape of every dispatch step.
pub type BoxResponseFuture = Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>;

/// The next step of the middleware chain. Call it exactly once to continue
/// dispatch (with the same or a replaced request), or drop it and return a
/// response to short-circuit.
pub type Next = Box<dyn FnOnce(HttpRequest) -> BoxResponseFuture + Send>;

/// Type alias for handler functions at the end of a chain
pub type HandlerFn = Arc<dyn Fn(HttpRequest) -> BoxResponseFuture + Send + Sync>;

/// Middleware wrapping route dispatch on the way in.
///
/// A replaced request passed to `next` is visible to the rest of the chain
/// and to the final handler.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error>;
}

/// Middleware wrapping the response on the way out.
#[async_trait]
pub trait ResponseMiddleware: Send + Sync {
    async fn handle(&self, res: HttpResponse) -> Result<HttpResponse, Error>;
}

/// Newtype for registering middleware as a container service, so a chain
/// entry can reference it by service name.
#[derive(Clone)]
pub struct DynMiddleware(pub Arc<dyn Middleware>);

/// Newtype for registering response middleware as a container service.
#[derive(Clone)]
pub struct DynResponseMiddleware(pub Arc<dyn ResponseMiddleware>);

struct FnMiddleware<F>(F);

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(HttpRequest, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send,
{
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        (self.0)(req, next).await
    }
}

struct FnResponseMiddleware<F>(F);

#[async_trait]
impl<F, Fut> ResponseMiddleware for FnResponseMiddleware<F>
where
    F: Fn(HttpResponse) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send,
{
    async fn handle(&self, res: HttpResponse) -> Result<HttpResponse, Error> {
        (self.0)(res).await
    }
}

/// A dependency array for the request phase: the resolved dependencies are
/// handed to the function alongside the request and the continuation.
#[derive(Clone)]
pub struct InjectedMiddleware {
    dependencies: Vec<String>,
    call: Arc<dyn Fn(HttpRequest, Next, ResolvedArgs) -> BoxResponseFuture + Send + Sync>,
}

impl InjectedMiddleware {
    pub fn new<I, S, F, Fut>(dependencies: I, call: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(HttpRequest, Next, ResolvedArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            call: Arc::new(move |req, next, args| Box::pin(call(req, next, args))),
        }
    }
}

struct BoundInjectedMiddleware {
    middleware: InjectedMiddleware,
    args: ResolvedArgs,
}

#[async_trait]
impl Middleware for BoundInjectedMiddleware {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        (self.middleware.call)(req, next, self.args.clone()).await
    }
}

/// A dependency array for the response phase.
#[derive(Clone)]
pub struct InjectedAfter {
    dependencies: Vec<String>,
    call: Arc<dyn Fn(HttpResponse, ResolvedArgs) -> BoxResponseFuture + Send + Sync>,
}

impl InjectedAfter {
    pub fn new<I, S, F, Fut>(dependencies: I, call: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(HttpResponse, ResolvedArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            call: Arc::new(move |res, args| Box::pin(call(res, args))),
        }
    }
}

struct BoundInjectedAfter {
    after: InjectedAfter,
    args: ResolvedArgs,
}

#[async_trait]
impl ResponseMiddleware for BoundInjectedAfter {
    async fn handle(&self, res: HttpResponse) -> Result<HttpResponse, Error> {
        (self.after.call)(res, self.args.clone()).await
    }
}

/// One request-phase chain entry, resolved to an actual middleware at
/// dispatch time.
#[derive(Clone)]
pub enum MiddlewareSpec {
    /// A middleware object supplied directly.
    Handler(Arc<dyn Middleware>),
    /// A container service name, resolved at dispatch time; the service
    /// must be a registered [`DynMiddleware`].
    Service(String),
    /// A dependency array resolved like a handler.
    Injected(InjectedMiddleware),
}

impl MiddlewareSpec {
    pub fn from_middleware<M: Middleware + 'static>(middleware: M) -> Self {
        MiddlewareSpec::Handler(Arc::new(middleware))
    }

    /// Wrap a plain `(request, next) -> response` closure.
    pub fn from_fn<F, Fut>(call: F) -> Self
    where
        F: Fn(HttpRequest, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        MiddlewareSpec::Handler(Arc::new(FnMiddleware(call)))
    }

    pub fn service(name: impl Into<String>) -> Self {
        MiddlewareSpec::Service(name.into())
    }

    pub(crate) fn materialize(&self, injector: &Injector) -> Result<Arc<dyn Middleware>, Error> {
        match self {
            MiddlewareSpec::Handler(middleware) => Ok(middleware.clone()),
            MiddlewareSpec::Service(name) => {
                let middleware = injector
                    .get(name)?
                    .downcast::<DynMiddleware>()
                    .map_err(|_| Error::InvalidMiddleware(name.clone()))?;
                Ok(middleware.0.clone())
            }
            MiddlewareSpec::Injected(middleware) => {
                let values = injector.resolve(&middleware.dependencies)?;
                Ok(Arc::new(BoundInjectedMiddleware {
                    middleware: middleware.clone(),
                    args: ResolvedArgs::new("injected middleware", values),
                }))
            }
        }
    }
}

/// One response-phase chain entry.
#[derive(Clone)]
pub enum AfterSpec {
    Handler(Arc<dyn ResponseMiddleware>),
    Service(String),
    Injected(InjectedAfter),
}

impl AfterSpec {
    pub fn from_middleware<M: ResponseMiddleware + 'static>(middleware: M) -> Self {
        AfterSpec::Handler(Arc::new(middleware))
    }

    /// Wrap a plain `response -> response` closure.
    pub fn from_fn<F, Fut>(call: F) -> Self
    where
        F: Fn(HttpResponse) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        AfterSpec::Handler(Arc::new(FnResponseMiddleware(call)))
    }

    pub fn service(name: impl Into<String>) -> Self {
        AfterSpec::Service(name.into())
    }

    pub(crate) fn materialize(
        &self,
        injector: &Injector,
    ) -> Result<Arc<dyn ResponseMiddleware>, Error> {
        match self {
            AfterSpec::Handler(middleware) => Ok(middleware.clone()),
            AfterSpec::Service(name) => {
                let middleware = injector
                    .get(name)?
                    .downcast::<DynResponseMiddleware>()
                    .map_err(|_| Error::InvalidMiddleware(name.clone()))?;
                Ok(middleware.0.clone())
            }
            AfterSpec::Injected(after) => {
                let values = injector.resolve(&after.dependencies)?;
                Ok(Arc::new(BoundInjectedAfter {
                    after: after.clone(),
                    args: ResolvedArgs::new("injected response middleware", values),
                }))
            }
        }
    }
}

/// Request-phase chain executor. Entries run in registration order, so the
/// earliest-registered middleware is the outermost wrapper.
#[derive(Clone)]
pub struct MiddlewareChain {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareChain {
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            middlewares: Arc::new(middlewares),
        }
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Execute the chain with `handler` at its end.
    pub async fn apply(&self, req: HttpRequest, handler: HandlerFn) -> Result<HttpResponse, Error> {
        debug!(
            middleware_count = self.middlewares.len(),
            path = %req.path,
            "executing middleware chain"
        );
        self.execute_from(0, req, handler).await
    }

    fn execute_from(
        &self,
        index: usize,
        req: HttpRequest,
        handler: HandlerFn,
    ) -> BoxResponseFuture {
        if index >= self.middlewares.len() {
            trace!("middleware chain complete, calling handler");
            handler(req)
        } else {
            let middleware = self.middlewares[index].clone();
            let chain = self.clone();

            trace!(middleware_index = index, "executing middleware");
            Box::pin(async move {
                middleware
                    .handle(
                        req,
                        Box::new(move |req| chain.execute_from(index + 1, req, handler)),
                    )
                    .await
            })
        }
    }
}

// ========== Built-in Middleware ==========

/// Logs the request line and the response status through `tracing`.
pub struct LoggerMiddleware;

#[async_trait]
impl Middleware for LoggerMiddleware {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        let start = std::time::Instant::now();
        let method = req.method;
        let path = req.path.clone();

        let result = next(req).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                debug!(%method, path = %path, status = response.status, ?duration, "request handled");
            }
            Err(error) => {
                debug!(%method, path = %path, %error, ?duration, "request failed");
            }
        }

        result
    }
}

// Route table, path matching and request dispatch

use crate::container::{Injected, Injector, Locals, ResolvedArgs};
use crate::logging::{debug, trace};
use crate::middleware::{
    AfterSpec, BoxResponseFuture, HandlerFn, MiddlewareChain, MiddlewareSpec, ResponseMiddleware,
};
use crate::{Error, HttpRequest, HttpResponse, Method, MethodMask};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

/// A route handler: either a directly-callable function receiving the
/// request, or a dependency array whose names are resolved from the
/// container (with the request and route parameters injectable by name)
/// before the final function runs.
#[derive(Clone)]
pub enum Handler {
    Fn(HandlerFn),
    Injected(Injected<BoxResponseFuture>),
}

impl Handler {
    /// Wrap a plain async `request -> response` function.
    pub fn from_fn<F, Fut>(call: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        Handler::Fn(Arc::new(move |req| Box::pin(call(req))))
    }

    /// Dependency array with a synchronous final function.
    pub fn injected<I, S, F>(dependencies: I, call: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(ResolvedArgs) -> Result<HttpResponse, Error> + Send + Sync + 'static,
    {
        Handler::Injected(Injected::new(dependencies, move |args| {
            let result = call(args);
            let future: BoxResponseFuture = Box::pin(std::future::ready(result));
            Ok(future)
        }))
    }

    /// Dependency array with an async final function.
    pub fn injected_async<I, S, F, Fut>(dependencies: I, call: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(ResolvedArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        Handler::Injected(Injected::new(dependencies, move |args| {
            let future: BoxResponseFuture = Box::pin(call(args));
            Ok(future)
        }))
    }
}

/// Handler invoked with the error and the original request when dispatch
/// fails and recovery is configured.
pub type ErrorHandler = Arc<dyn Fn(Error, HttpRequest) -> BoxResponseFuture + Send + Sync>;

/// Build an [`ErrorHandler`] from an async closure.
pub fn error_handler<F, Fut>(call: F) -> ErrorHandler
where
    F: Fn(Error, HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Arc::new(move |error, req| Box::pin(call(error, req)))
}

/// Configurator run against a freshly created sub-context.
pub type ContextFn = Arc<dyn Fn(&mut Context) -> Result<(), Error> + Send + Sync>;

/// Route definition: method mask, path pattern and handler.
#[derive(Clone)]
pub struct Route {
    pub mask: MethodMask,
    pub pattern: String,
    pub handler: Handler,
}

#[derive(Clone)]
enum Entry {
    Route(Route),
    Context(Context),
}

/// A path-prefixed, middleware-scoped group of routes. Routes and nested
/// contexts are tried in registration order; the first match wins.
#[derive(Clone, Default)]
pub struct Context {
    prefix: String,
    before: Vec<MiddlewareSpec>,
    after: Vec<AfterSpec>,
    entries: Vec<Entry>,
}

impl Context {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: normalize_prefix(prefix.into()),
            ..Self::default()
        }
    }

    /// The registration primitive every method helper is sugar over.
    pub fn route(
        &mut self,
        mask: MethodMask,
        pattern: impl Into<String>,
        handler: Handler,
    ) -> &mut Self {
        self.entries.push(Entry::Route(Route {
            mask,
            pattern: pattern.into(),
            handler,
        }));
        self
    }

    /// Alias of [`Context::route`] for an explicit method mask.
    pub fn request(
        &mut self,
        mask: MethodMask,
        pattern: impl Into<String>,
        handler: Handler,
    ) -> &mut Self {
        self.route(mask, pattern, handler)
    }

    pub fn get(&mut self, pattern: impl Into<String>, handler: Handler) -> &mut Self {
        self.route(MethodMask::GET, pattern, handler)
    }

    pub fn post(&mut self, pattern: impl Into<String>, handler: Handler) -> &mut Self {
        self.route(MethodMask::POST, pattern, handler)
    }

    pub fn put(&mut self, pattern: impl Into<String>, handler: Handler) -> &mut Self {
        self.route(MethodMask::PUT, pattern, handler)
    }

    pub fn patch(&mut self, pattern: impl Into<String>, handler: Handler) -> &mut Self {
        self.route(MethodMask::PATCH, pattern, handler)
    }

    pub fn delete(&mut self, pattern: impl Into<String>, handler: Handler) -> &mut Self {
        self.route(MethodMask::DELETE, pattern, handler)
    }

    pub fn any(&mut self, pattern: impl Into<String>, handler: Handler) -> &mut Self {
        self.route(MethodMask::ANY, pattern, handler)
    }

    /// Nest a sub-context: its routes are prefixed with `prefix` and its
    /// middleware scope is additive to this one.
    pub fn context<F>(&mut self, prefix: impl Into<String>, configure: F) -> Result<&mut Self, Error>
    where
        F: FnOnce(&mut Context) -> Result<(), Error>,
    {
        let mut child = Context::with_prefix(prefix);
        configure(&mut child)?;
        self.entries.push(Entry::Context(child));
        Ok(self)
    }

    /// Append request-phase middleware to this context's scope.
    pub fn before(&mut self, middleware: MiddlewareSpec) -> &mut Self {
        self.before.push(middleware);
        self
    }

    /// Append response-phase middleware to this context's scope.
    pub fn after(&mut self, middleware: AfterSpec) -> &mut Self {
        self.after.push(middleware);
        self
    }
}

/// The routes, middleware and fallback handlers a router dispatches over.
/// Shared between the provider configuring it and the router built from it.
#[derive(Default)]
pub struct RouterState {
    root: Context,
    otherwise: Option<Handler>,
    error: Option<ErrorHandler>,
}

impl RouterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root_mut(&mut self) -> &mut Context {
        &mut self.root
    }

    /// Fallback handler for unmatched requests.
    pub fn otherwise(&mut self, handler: Handler) -> &mut Self {
        self.otherwise = Some(handler);
        self
    }

    /// Recovery handler for errors raised during dispatch.
    pub fn error(&mut self, handler: ErrorHandler) -> &mut Self {
        self.error = Some(handler);
        self
    }
}

/// Everything needed to run one matched route.
struct Dispatch {
    handler: Handler,
    params: HashMap<String, String>,
    before: Vec<MiddlewareSpec>,
    after: Vec<AfterSpec>,
}

/// Request dispatcher over a [`RouterState`].
///
/// A router is constructed through the container (its provider factory
/// binds the injector used to resolve handler dependencies); an unbound
/// router refuses to handle requests.
pub struct Router {
    state: Arc<RwLock<RouterState>>,
    injector: Option<Injector>,
}

impl Router {
    /// An unbound router with its own empty state. Configuration is
    /// possible, handling is not until an injector is bound.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RouterState::default())),
            injector: None,
        }
    }

    /// Bind a router to shared state and a resolver.
    pub fn bind(state: Arc<RwLock<RouterState>>, injector: Injector) -> Self {
        Self {
            state,
            injector: Some(injector),
        }
    }

    pub fn state(&self) -> &Arc<RwLock<RouterState>> {
        &self.state
    }

    /// Dispatch one request.
    ///
    /// Errors from matching, middleware or the handler are caught exactly
    /// once here: the registered error handler, if any, produces the
    /// response; otherwise the error is returned to the caller.
    pub async fn handle(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let injector = self
            .injector
            .as_ref()
            .ok_or_else(|| Error::Logic("handle called before the router was constructed".into()))?
            .clone();

        let original = request.clone();
        match self.dispatch(&injector, request).await {
            Ok(response) => Ok(response),
            Err(error) => {
                let recovery = self.state.read().unwrap().error.clone();
                match recovery {
                    Some(handler) => {
                        debug!(%error, "dispatch failed, invoking error handler");
                        handler(error, original).await
                    }
                    None => Err(error),
                }
            }
        }
    }

    async fn dispatch(
        &self,
        injector: &Injector,
        mut request: HttpRequest,
    ) -> Result<HttpResponse, Error> {
        // Split the query string off the path before any matching.
        if let Some(index) = request.path.find('?') {
            let query = request.path.split_off(index);
            request.query_params = parse_query_string(&query[1..]);
        }

        let (root_before, root_after) = {
            let state = self.state.read().unwrap();
            (state.root.before.clone(), state.root.after.clone())
        };

        // Root-scoped middleware wraps the entire match-and-dispatch, so a
        // middleware that rewrites the request path changes which route
        // matches, and the otherwise handler sees the rewritten request.
        let state = self.state.clone();
        let inner_injector = injector.clone();
        let core: HandlerFn = Arc::new(move |req: HttpRequest| {
            let state = state.clone();
            let injector = inner_injector.clone();
            Box::pin(async move { match_and_dispatch(state, injector, req).await })
        });

        let chain = materialize_chain(&root_before, injector)?;
        let afters = materialize_afters(&root_after, injector)?;

        let mut response = chain.apply(request, core).await?;
        for after in afters.iter().rev() {
            response = after.handle(response).await?;
        }
        Ok(response)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

async fn match_and_dispatch(
    state: Arc<RwLock<RouterState>>,
    injector: Injector,
    mut req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let (found, otherwise) = {
        let state = state.read().unwrap();
        (
            find_route(&state.root.entries, "", req.method, &req.path, &[], &[]),
            state.otherwise.clone(),
        )
    };

    match found {
        Some(dispatch) => {
            trace!(path = %req.path, params = ?dispatch.params, "route matched");
            req.path_params = dispatch.params;

            let handler = dispatch.handler;
            let handler_injector = injector.clone();
            let handler_fn: HandlerFn =
                Arc::new(move |req| invoke_handler(&handler_injector, &handler, req));

            let chain = materialize_chain(&dispatch.before, &injector)?;
            let afters = materialize_afters(&dispatch.after, &injector)?;

            let mut response = chain.apply(req, handler_fn).await?;
            for after in afters.iter().rev() {
                response = after.handle(response).await?;
            }
            Ok(response)
        }
        None => match otherwise {
            Some(handler) => {
                debug!(path = %req.path, "no route matched, invoking otherwise handler");
                invoke_handler(&injector, &handler, req).await
            }
            None => Err(Error::RouteNotFound(format!("{} {}", req.method, req.path))),
        },
    }
}

/// Invoke a handler, injecting the current request and the extracted route
/// parameters by name alongside any container-registered service.
fn invoke_handler(injector: &Injector, handler: &Handler, req: HttpRequest) -> BoxResponseFuture {
    match handler {
        Handler::Fn(call) => call(req),
        Handler::Injected(injected) => {
            let params = req.path_params.clone();
            let mut locals = Locals::new().with("RouteParameter", params.clone());
            for (name, value) in params {
                locals = locals.with(name, value);
            }
            let locals = locals.with("Request", req);

            match injector.invoke(injected, &locals) {
                Ok(future) => future,
                Err(error) => Box::pin(std::future::ready(Err(error))),
            }
        }
    }
}

fn materialize_chain(
    specs: &[MiddlewareSpec],
    injector: &Injector,
) -> Result<MiddlewareChain, Error> {
    let mut middlewares = Vec::with_capacity(specs.len());
    for spec in specs {
        middlewares.push(spec.materialize(injector)?);
    }
    Ok(MiddlewareChain::new(middlewares))
}

fn materialize_afters(
    specs: &[AfterSpec],
    injector: &Injector,
) -> Result<Vec<Arc<dyn ResponseMiddleware>>, Error> {
    specs.iter().map(|spec| spec.materialize(injector)).collect()
}

/// Depth-first, registration-order search. Context middleware accumulates
/// outer-to-inner on the way down; the root context's own middleware is
/// handled by the dispatcher and is not part of `before`/`after` here.
fn find_route(
    entries: &[Entry],
    prefix: &str,
    method: Method,
    path: &str,
    before: &[MiddlewareSpec],
    after: &[AfterSpec],
) -> Option<Dispatch> {
    for entry in entries {
        match entry {
            Entry::Route(route) => {
                if !route.mask.contains(method) {
                    continue;
                }
                let pattern = join_paths(prefix, &route.pattern);
                if let Some(params) = match_path(&pattern, path) {
                    return Some(Dispatch {
                        handler: route.handler.clone(),
                        params,
                        before: before.to_vec(),
                        after: after.to_vec(),
                    });
                }
            }
            Entry::Context(context) => {
                let child_prefix = join_paths(prefix, &context.prefix);
                let mut child_before = before.to_vec();
                child_before.extend(context.before.iter().cloned());
                let mut child_after = after.to_vec();
                child_after.extend(context.after.iter().cloned());
                if let Some(found) = find_route(
                    &context.entries,
                    &child_prefix,
                    method,
                    path,
                    &child_before,
                    &child_after,
                ) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// Match a route path pattern against a request path.
///
/// Patterns are literal segments plus `{name}` parameter segments; the
/// segment counts must match exactly and a parameter accepts any single
/// non-slash segment. Returns the extracted parameters on a match.
fn match_path(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_parts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if pattern_parts.len() != path_parts.len() {
        return None;
    }

    let mut params = HashMap::new();

    for (pattern_part, path_part) in pattern_parts.iter().zip(path_parts.iter()) {
        if let Some(name) = pattern_part
            .strip_prefix('{')
            .and_then(|part| part.strip_suffix('}'))
        {
            params.insert(name.to_string(), path_part.to_string());
        } else if pattern_part != path_part {
            return None;
        }
    }

    Some(params)
}

/// Parse a query string into a map of parameters
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|part| {
            let mut split = part.splitn(2, '=');
            let key = split.next()?;
            let value = split.next().unwrap_or("");
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

fn normalize_prefix(prefix: String) -> String {
    if prefix.is_empty() || prefix == "/" {
        return String::new();
    }
    let prefix = if prefix.starts_with('/') {
        prefix
    } else {
        format!("/{prefix}")
    };
    prefix.trim_end_matches('/').to_string()
}

fn join_paths(prefix: &str, pattern: &str) -> String {
    if prefix.is_empty() {
        return pattern.to_string();
    }
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        pattern.trim_start_matches('/')
    )
}

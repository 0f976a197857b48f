// Provider adapter exposing the router to the container

use crate::container::FactoryRecipe;
use crate::provider::{Delegate, DelegateArgs, ServiceProvider};
use crate::routing::{Router, RouterState};
use crate::{Injector, MethodMask};
use std::sync::{Arc, RwLock};

/// Registers the router as a container service.
///
/// The provider owns the shared [`RouterState`]; its factory declares a
/// dependency on the injector and binds it to a [`Router`] over that
/// state. Its delegates are the route registration shorthands promoted
/// onto the container (`get`, `post`, `context`, `before`, ...), which
/// queue until boot like every other config call.
pub struct RouterProvider {
    state: Arc<RwLock<RouterState>>,
}

impl RouterProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RouterState::new())),
        }
    }

    pub fn state(&self) -> &Arc<RwLock<RouterState>> {
        &self.state
    }

    fn route_delegate(&self, name: &str, mask: MethodMask) -> Delegate {
        let state = self.state.clone();
        Delegate::new(name, move |args: DelegateArgs| {
            let pattern = args.str_at(0)?;
            let handler = args.handler_at(1)?;
            state.write().unwrap().root_mut().route(mask, pattern, handler);
            Ok(())
        })
    }
}

impl Default for RouterProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceProvider for RouterProvider {
    fn factory(&self) -> FactoryRecipe {
        let state = self.state.clone();
        FactoryRecipe::new(["Injector"], move |args| {
            let injector = args.arg::<Injector>(0)?;
            let router = Router::bind(state.clone(), (*injector).clone());
            Ok(Arc::new(router))
        })
    }

    fn delegates(&self) -> Vec<Delegate> {
        let mut delegates = vec![
            self.route_delegate("get", MethodMask::GET),
            self.route_delegate("post", MethodMask::POST),
            self.route_delegate("put", MethodMask::PUT),
            self.route_delegate("patch", MethodMask::PATCH),
            self.route_delegate("delete", MethodMask::DELETE),
            self.route_delegate("any", MethodMask::ANY),
        ];

        let state = self.state.clone();
        delegates.push(Delegate::new("request", move |args: DelegateArgs| {
            let mask = args.mask_at(0)?;
            let pattern = args.str_at(1)?;
            let handler = args.handler_at(2)?;
            state.write().unwrap().root_mut().route(mask, pattern, handler);
            Ok(())
        }));

        let state = self.state.clone();
        delegates.push(Delegate::new("context", move |args: DelegateArgs| {
            let prefix = args.str_at(0)?;
            let configure = args.configurator_at(1)?;
            state
                .write()
                .unwrap()
                .root_mut()
                .context(prefix, |context| configure(context))?;
            Ok(())
        }));

        let state = self.state.clone();
        delegates.push(Delegate::new("before", move |args: DelegateArgs| {
            let middleware = args.middleware_at(0)?;
            state.write().unwrap().root_mut().before(middleware);
            Ok(())
        }));

        let state = self.state.clone();
        delegates.push(Delegate::new("after", move |args: DelegateArgs| {
            let middleware = args.after_at(0)?;
            state.write().unwrap().root_mut().after(middleware);
            Ok(())
        }));

        let state = self.state.clone();
        delegates.push(Delegate::new("otherwise", move |args: DelegateArgs| {
            let handler = args.handler_at(0)?;
            state.write().unwrap().otherwise(handler);
            Ok(())
        }));

        let state = self.state.clone();
        delegates.push(Delegate::new("error", move |args: DelegateArgs| {
            let handler = args.error_handler_at(0)?;
            state.write().unwrap().error(handler);
            Ok(())
        }));

        delegates
    }
}

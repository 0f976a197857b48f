// Name-keyed dependency injection container and resolver

use crate::logging::{debug, trace};
use crate::provider::{Delegate, DelegateArgs, DelegateFn, ServiceProvider};
use crate::Error;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The dynamic value cell every service resolves to.
///
/// The registry is keyed by name, not by type, so values are erased and
/// consumers downcast through [`ResolvedArgs`] or [`Injector::get_as`].
pub type ServiceValue = Arc<dyn Any + Send + Sync>;

/// Wrap a plain value for storage in the container.
pub fn into_service<T: Any + Send + Sync>(value: T) -> ServiceValue {
    Arc::new(value)
}

/// Build function of a factory/provider definition: receives the resolved
/// dependencies in declared order, returns the built service value.
pub type BuildFn = Arc<dyn Fn(ResolvedArgs) -> Result<ServiceValue, Error> + Send + Sync>;

/// Dependency list plus build function, the recipe behind a lazy service.
#[derive(Clone)]
pub struct FactoryRecipe {
    pub dependencies: Vec<String>,
    pub build: BuildFn,
}

impl FactoryRecipe {
    pub fn new<I, S, F>(dependencies: I, build: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(ResolvedArgs) -> Result<ServiceValue, Error> + Send + Sync + 'static,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            build: Arc::new(build),
        }
    }
}

/// Positional access to resolved dependency values.
///
/// Arity is fixed by the declared name list, so an out-of-range index or a
/// failed downcast is a programming error surfaced as
/// [`Error::DependencyType`] naming the target being built.
#[derive(Clone)]
pub struct ResolvedArgs {
    target: String,
    values: Vec<ServiceValue>,
}

impl ResolvedArgs {
    pub(crate) fn new(target: impl Into<String>, values: Vec<ServiceValue>) -> Self {
        Self {
            target: target.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw erased value at `index`.
    pub fn raw(&self, index: usize) -> Option<&ServiceValue> {
        self.values.get(index)
    }

    /// Downcast the value at `index` to `T`.
    pub fn arg<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, Error> {
        let mistyped = || Error::DependencyType {
            target: self.target.clone(),
            index,
            expected: std::any::type_name::<T>(),
        };
        let value = self.values.get(index).ok_or_else(mistyped)?;
        value.clone().downcast::<T>().map_err(|_| mistyped())
    }
}

/// An explicit dependency array: ordered dependency names paired with a
/// function taking the resolved values positionally. Replaces the loose
/// `[dep1, dep2, fn]` convention with a typed construct.
pub struct Injected<R> {
    dependencies: Vec<String>,
    call: Arc<dyn Fn(ResolvedArgs) -> Result<R, Error> + Send + Sync>,
}

impl<R> Injected<R> {
    pub fn new<I, S, F>(dependencies: I, call: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(ResolvedArgs) -> Result<R, Error> + Send + Sync + 'static,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            call: Arc::new(call),
        }
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub(crate) fn call(&self, args: ResolvedArgs) -> Result<R, Error> {
        (self.call)(args)
    }
}

impl<R> Clone for Injected<R> {
    fn clone(&self) -> Self {
        Self {
            dependencies: self.dependencies.clone(),
            call: self.call.clone(),
        }
    }
}

/// Name -> value overlay consulted before the registry during
/// [`Injector::invoke`]. Used by the router to inject the current request
/// and route parameters.
#[derive(Clone, Default)]
pub struct Locals {
    values: HashMap<String, ServiceValue>,
}

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.values.insert(name.into(), Arc::new(value));
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: ServiceValue) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    fn get(&self, name: &str) -> Option<ServiceValue> {
        self.values.get(name).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServiceKind {
    Constant,
    Value,
    Factory,
    Provider,
}

#[derive(Clone)]
enum ServiceState {
    Unbuilt(FactoryRecipe),
    Building,
    Built(ServiceValue),
}

#[derive(Clone)]
struct ServiceRecord {
    kind: ServiceKind,
    state: ServiceState,
}

/// Shared registry behind both [`Container`] and [`Injector`].
#[derive(Default)]
struct Registry {
    services: RwLock<HashMap<String, ServiceRecord>>,
}

/// The resolver capability handed to factories that need to resolve
/// services at runtime (the router, most prominently). Registered in every
/// container under the service name `"Injector"`, so build functions can
/// declare it like any other dependency instead of receiving a live
/// back-reference to the container.
#[derive(Clone)]
pub struct Injector {
    registry: Arc<Registry>,
}

impl Injector {
    /// Resolve a list of dependency names into built values.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<ServiceValue>, Error> {
        names.iter().map(|name| self.get(name.as_ref())).collect()
    }

    /// Resolve a single name.
    pub fn get(&self, name: &str) -> Result<ServiceValue, Error> {
        self.resolve_one(name, &mut Vec::new(), None)
    }

    /// Resolve a single name and downcast it to `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, Error> {
        self.get(name)?
            .downcast::<T>()
            .map_err(|_| Error::DependencyType {
                target: name.to_string(),
                index: 0,
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn has(&self, name: &str) -> bool {
        self.registry.services.read().unwrap().contains_key(name)
    }

    /// Invoke a dependency array: resolve its declared names, checking the
    /// `locals` overlay first, then call the function with the values in
    /// declared order.
    pub fn invoke<R>(&self, injected: &Injected<R>, locals: &Locals) -> Result<R, Error> {
        let mut chain = Vec::new();
        let mut values = Vec::with_capacity(injected.dependencies().len());
        for name in injected.dependencies() {
            values.push(self.resolve_one(name, &mut chain, Some(locals))?);
        }
        injected.call(ResolvedArgs::new("invoked function", values))
    }

    fn resolve_one(
        &self,
        name: &str,
        chain: &mut Vec<String>,
        locals: Option<&Locals>,
    ) -> Result<ServiceValue, Error> {
        if let Some(value) = locals.and_then(|l| l.get(name)) {
            return Ok(value);
        }

        let recipe = {
            let mut services = self.registry.services.write().unwrap();
            let record = services
                .get_mut(name)
                .ok_or_else(|| Error::UnknownService(name.to_string()))?;
            match std::mem::replace(&mut record.state, ServiceState::Building) {
                ServiceState::Built(value) => {
                    record.state = ServiceState::Built(value.clone());
                    return Ok(value);
                }
                ServiceState::Building => {
                    let mut cycle = chain.clone();
                    cycle.push(name.to_string());
                    return Err(Error::CircularDependency { chain: cycle });
                }
                ServiceState::Unbuilt(recipe) => recipe,
            }
        };

        trace!(service = name, deps = ?recipe.dependencies, "building service");
        chain.push(name.to_string());
        let built = self.build_service(&recipe, name, chain, locals);
        chain.pop();

        let value = match built {
            Ok(value) => value,
            Err(error) => {
                // Put the recipe back so the next resolution surfaces the
                // same error instead of a phantom cycle.
                let mut services = self.registry.services.write().unwrap();
                if let Some(record) = services.get_mut(name) {
                    record.state = ServiceState::Unbuilt(recipe);
                }
                return Err(error);
            }
        };

        let mut services = self.registry.services.write().unwrap();
        if let Some(record) = services.get_mut(name) {
            record.state = ServiceState::Built(value.clone());
        }
        debug!(service = name, "service built and cached");
        Ok(value)
    }

    fn build_service(
        &self,
        recipe: &FactoryRecipe,
        name: &str,
        chain: &mut Vec<String>,
        locals: Option<&Locals>,
    ) -> Result<ServiceValue, Error> {
        let mut values = Vec::with_capacity(recipe.dependencies.len());
        for dependency in &recipe.dependencies {
            values.push(self.resolve_one(dependency, chain, locals)?);
        }
        (recipe.build)(ResolvedArgs::new(name, values))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BootState {
    Initial,
    Booted,
}

/// The dependency injection container.
///
/// Owns the service registry, a queue of deferred configuration closures
/// and a delegate registry merged in from providers. Registration is only
/// legal before [`Container::boot`]; resolution is lazy and cached, so a
/// service builds at most once for the lifetime of the container.
#[derive(Clone)]
pub struct Container {
    registry: Arc<Registry>,
    state: Arc<RwLock<BootState>>,
    configs: Arc<RwLock<Vec<Injected<()>>>>,
    delegates: Arc<RwLock<HashMap<String, DelegateFn>>>,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container").finish_non_exhaustive()
    }
}

impl Container {
    pub fn new() -> Self {
        debug!("creating container");
        let container = Self {
            registry: Arc::new(Registry::default()),
            state: Arc::new(RwLock::new(BootState::Initial)),
            configs: Arc::new(RwLock::new(Vec::new())),
            delegates: Arc::new(RwLock::new(HashMap::new())),
        };

        // The resolver is itself a service, so factories can declare it.
        let injector = container.injector();
        container.registry.services.write().unwrap().insert(
            "Injector".to_string(),
            ServiceRecord {
                kind: ServiceKind::Constant,
                state: ServiceState::Built(Arc::new(injector)),
            },
        );

        container
    }

    /// A cloneable resolver handle over this container's registry.
    pub fn injector(&self) -> Injector {
        Injector {
            registry: self.registry.clone(),
        }
    }

    /// Register a constant: a fixed value that is never rebuilt.
    pub fn constant<T: Any + Send + Sync>(&self, name: &str, value: T) -> Result<&Self, Error> {
        self.ensure_initial("constant")?;
        self.insert(
            name,
            ServiceRecord {
                kind: ServiceKind::Constant,
                state: ServiceState::Built(Arc::new(value)),
            },
        )?;
        Ok(self)
    }

    /// Register a value. Unlike constants and factories, values may be
    /// re-registered while the container is in its initial state.
    pub fn value<T: Any + Send + Sync>(&self, name: &str, value: T) -> Result<&Self, Error> {
        self.ensure_initial("value")?;
        self.insert(
            name,
            ServiceRecord {
                kind: ServiceKind::Value,
                state: ServiceState::Built(Arc::new(value)),
            },
        )?;
        Ok(self)
    }

    /// Register a factory: dependency names plus a build function, invoked
    /// lazily on first resolution and cached afterwards (singleton).
    pub fn factory<I, S, F>(&self, name: &str, dependencies: I, build: F) -> Result<&Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(ResolvedArgs) -> Result<ServiceValue, Error> + Send + Sync + 'static,
    {
        self.ensure_initial("factory")?;
        self.insert(
            name,
            ServiceRecord {
                kind: ServiceKind::Factory,
                state: ServiceState::Unbuilt(FactoryRecipe::new(dependencies, build)),
            },
        )?;
        Ok(self)
    }

    /// Register a provider-backed service.
    ///
    /// The provider object itself becomes the constant `"<name>Provider"`
    /// so config closures can reach it during boot, the service `name` is
    /// defined by the provider's factory recipe, and any delegates the
    /// provider exposes are merged into the container's callable surface.
    pub fn provider<P>(&self, name: &str, provider: P) -> Result<&Self, Error>
    where
        P: ServiceProvider + Any + Send + Sync,
    {
        self.ensure_initial("provider")?;

        let recipe = provider.factory();
        let delegates = provider.delegates();
        let provider_name = format!("{name}Provider");

        // Check every name up front so a conflict leaves nothing behind.
        {
            let services = self.registry.services.read().unwrap();
            for key in [name, provider_name.as_str()] {
                if services.contains_key(key) {
                    return Err(Error::DuplicateName(key.to_string()));
                }
            }
            let registered = self.delegates.read().unwrap();
            for delegate in &delegates {
                if registered.contains_key(&delegate.name) {
                    return Err(Error::DuplicateName(format!("delegate {}", delegate.name)));
                }
            }
        }

        self.insert(
            &provider_name,
            ServiceRecord {
                kind: ServiceKind::Constant,
                state: ServiceState::Built(Arc::new(provider)),
            },
        )?;
        self.insert(
            name,
            ServiceRecord {
                kind: ServiceKind::Provider,
                state: ServiceState::Unbuilt(recipe),
            },
        )?;

        let mut registered = self.delegates.write().unwrap();
        for Delegate { name, call } in delegates {
            trace!(delegate = name.as_str(), "delegate registered");
            registered.insert(name, call);
        }

        Ok(self)
    }

    /// Queue a configuration closure to run at boot, after all
    /// registration, with its dependencies resolved through the injector.
    pub fn config(&self, config: Injected<()>) -> Result<&Self, Error> {
        self.ensure_initial("config")?;
        self.configs.write().unwrap().push(config);
        Ok(self)
    }

    /// Call a provider delegate by name. The call is queued like any other
    /// config closure and executes at boot in call order.
    pub fn delegate(&self, name: &str, args: DelegateArgs) -> Result<&Self, Error> {
        self.ensure_initial("delegate")?;

        let call = {
            let delegates = self.delegates.read().unwrap();
            match delegates.get(name) {
                Some(call) => call.clone(),
                None => {
                    let mut known: Vec<String> = delegates.keys().cloned().collect();
                    known.sort();
                    return Err(Error::UnknownDelegate {
                        name: name.to_string(),
                        known,
                    });
                }
            }
        };

        self.configs.write().unwrap().push(Injected::new(
            Vec::<String>::new(),
            move |_| call(args.clone()),
        ));
        Ok(self)
    }

    /// Merge another unbooted container's definitions, config queue and
    /// delegates into this one.
    pub fn import(&self, other: &Container) -> Result<&Self, Error> {
        self.ensure_initial("import")?;
        other.ensure_initial("import")?;

        {
            let other_services = other.registry.services.read().unwrap();
            let mut services = self.registry.services.write().unwrap();
            for (name, record) in other_services.iter() {
                // Each container carries its own resolver handle.
                if name == "Injector" {
                    continue;
                }
                if services.contains_key(name) {
                    return Err(Error::DuplicateName(name.clone()));
                }
                services.insert(name.clone(), record.clone());
            }
        }

        self.configs
            .write()
            .unwrap()
            .extend(other.configs.read().unwrap().iter().cloned());

        {
            let other_delegates = other.delegates.read().unwrap();
            let mut delegates = self.delegates.write().unwrap();
            for (name, call) in other_delegates.iter() {
                if delegates.contains_key(name) {
                    return Err(Error::DuplicateName(format!("delegate {name}")));
                }
                delegates.insert(name.clone(), call.clone());
            }
        }

        Ok(self)
    }

    /// Freeze registration and run every deferred config closure in
    /// registration order. Config closures may trigger resolution, and
    /// with it the building of services.
    pub fn boot(&self) -> Result<&Self, Error> {
        {
            let mut state = self.state.write().unwrap();
            if *state == BootState::Booted {
                return Err(Error::IllegalState("container is already booted".into()));
            }
            *state = BootState::Booted;
        }

        let configs = std::mem::take(&mut *self.configs.write().unwrap());
        debug!(config_count = configs.len(), "booting container");

        let injector = self.injector();
        for config in &configs {
            injector.invoke(config, &Locals::new())?;
        }

        debug!("container booted");
        Ok(self)
    }

    pub fn is_booted(&self) -> bool {
        *self.state.read().unwrap() == BootState::Booted
    }

    /// Resolve a list of service names into built values.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<ServiceValue>, Error> {
        self.injector().resolve(names)
    }

    /// Resolve a single service, sugar for `resolve([name])[0]`.
    pub fn get(&self, name: &str) -> Result<ServiceValue, Error> {
        self.injector().get(name)
    }

    /// Resolve a single service and downcast it to `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, Error> {
        self.injector().get_as(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.injector().has(name)
    }

    fn ensure_initial(&self, what: &str) -> Result<(), Error> {
        if *self.state.read().unwrap() != BootState::Initial {
            return Err(Error::IllegalState(format!(
                "{what} can only be called before boot"
            )));
        }
        Ok(())
    }

    fn insert(&self, name: &str, record: ServiceRecord) -> Result<(), Error> {
        let mut services = self.registry.services.write().unwrap();
        if let Some(existing) = services.get(name) {
            // Values may be written over by another value; everything
            // else is write-once.
            let replaceable =
                existing.kind == ServiceKind::Value && record.kind == ServiceKind::Value;
            if !replaceable {
                return Err(Error::DuplicateName(name.to_string()));
            }
        }
        trace!(service = name, kind = ?record.kind, "service registered");
        services.insert(name.to_string(), record);
        Ok(())
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

// Options provider and the container-facing sugar

use crate::Options;
use std::sync::{Arc, RwLock};
use tracing::debug;
use trellis_core::{App, Error, FactoryRecipe, Injected, ResolvedArgs, ServiceProvider};

/// Provider backing the `"Options"` service.
///
/// Accumulates option sets during the config phase ([`OptionsProvider::add`]
/// is reachable through the `"OptionsProvider"` constant) and freezes the
/// merged tree into the service value the first time `"Options"` is
/// resolved.
pub struct OptionsProvider {
    options: Arc<RwLock<Options>>,
}

impl OptionsProvider {
    pub fn new(initial: Options) -> Self {
        Self {
            options: Arc::new(RwLock::new(initial)),
        }
    }

    /// Merge another option set into the accumulated tree.
    pub fn add(&self, options: Options) {
        debug!("merging options set");
        self.options.write().unwrap().merge(options);
    }
}

impl Default for OptionsProvider {
    fn default() -> Self {
        Self::new(Options::new())
    }
}

impl ServiceProvider for OptionsProvider {
    fn factory(&self) -> FactoryRecipe {
        let options = self.options.clone();
        FactoryRecipe::new(Vec::<String>::new(), move |_args| {
            Ok(Arc::new(options.read().unwrap().clone()))
        })
    }
}

/// Options sugar on the application: registers the provider on first use
/// and queues each option set to merge during boot, after all
/// registration.
pub trait OptionsExt {
    fn options(&self, options: Options) -> Result<&Self, Error>;
}

impl OptionsExt for App {
    fn options(&self, options: Options) -> Result<&Self, Error> {
        if !self.container().has("Options") {
            self.container()
                .provider("Options", OptionsProvider::default())?;
        }

        self.config(Injected::new(
            ["OptionsProvider"],
            move |args: ResolvedArgs| {
                let provider = args.arg::<OptionsProvider>(0)?;
                provider.add(options.clone());
                Ok(())
            },
        ))?;
        Ok(self)
    }
}

//! Lazily-initialized provider holder.
//!
//! The server builds its provider on first use so that starting up (or running
//! endpoints that never call the model) does not require credentials. The
//! holder is owned by application state; `reset` drops the cached instance.

use std::sync::{Arc, RwLock};

use tracing::info;

use super::{ProviderConfig, SharedProvider, create_provider};
use crate::types::{BookError, Result};

type Factory = dyn Fn(&ProviderConfig) -> Result<SharedProvider> + Send + Sync;

pub struct LazyProvider {
    config: ProviderConfig,
    factory: Arc<Factory>,
    cached: RwLock<Option<SharedProvider>>,
}

impl std::fmt::Debug for LazyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyProvider")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl LazyProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_factory(config, create_provider)
    }

    /// Holder that builds providers with a custom constructor
    pub fn with_factory<F>(config: ProviderConfig, factory: F) -> Self
    where
        F: Fn(&ProviderConfig) -> Result<SharedProvider> + Send + Sync + 'static,
    {
        Self {
            config,
            factory: Arc::new(factory),
            cached: RwLock::new(None),
        }
    }

    /// Holder pre-populated with an existing provider
    pub fn ready(provider: SharedProvider) -> Self {
        let cached = provider.clone();
        Self {
            config: ProviderConfig::default(),
            factory: Arc::new(move |_| Ok(provider.clone())),
            cached: RwLock::new(Some(cached)),
        }
    }

    /// Return the cached provider, constructing it on first call
    pub fn get(&self) -> Result<SharedProvider> {
        if let Some(provider) = self.read_cached()? {
            return Ok(provider);
        }

        let mut slot = self
            .cached
            .write()
            .map_err(|_| BookError::Config("provider lock poisoned".to_string()))?;
        if let Some(provider) = slot.as_ref() {
            return Ok(provider.clone());
        }

        let provider = (self.factory)(&self.config)?;
        info!(
            provider = provider.name(),
            model = provider.model(),
            "LLM provider initialized"
        );
        *slot = Some(provider.clone());
        Ok(provider)
    }

    /// Drop the cached instance; the next `get` constructs a fresh one
    pub fn reset(&self) {
        if let Ok(mut slot) = self.cached.write() {
            *slot = None;
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.cached.read().map(|slot| slot.is_some()).unwrap_or(false)
    }

    fn read_cached(&self) -> Result<Option<SharedProvider>> {
        let slot = self
            .cached
            .read()
            .map_err(|_| BookError::Config("provider lock poisoned".to_string()))?;
        Ok(slot.clone())
    }
}

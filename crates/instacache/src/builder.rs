// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for constructing instance caches.

use std::collections::HashMap;
use std::time::Duration;

use instacache_backend::{CacheBackend, DynamicBackendExt};
#[cfg(any(feature = "metrics", test))]
use opentelemetry::metrics::MeterProvider;
use tick::Clock;

use crate::strategy::Strategies;
use crate::telemetry::{CacheName, CacheTelemetry};
use crate::{BackendFailure, CacheKey, CachedData, EntityType, Error, InstanceCache, Settings, TypeRegistry};

const DEFAULT_CACHE_NAME: CacheName = "instacache";

/// Builder for [`InstanceCache`].
///
/// Settings can be supplied as a whole with [`settings`](Self::settings) (for
/// example after deserializing them) and then adjusted field by field.
///
/// # Example
///
/// ```
/// use instacache::{BackendFailure, InstanceCache};
/// use instacache_memory::InMemoryBackend;
/// use std::time::Duration;
/// use tick::Clock;
///
/// let cache = InstanceCache::builder(InMemoryBackend::new(), Clock::new_frozen())
///     .name("catalog")
///     .key_prefix("CAT")
///     .ttl(Duration::from_secs(600))
///     .backend_failure(BackendFailure::TreatAsMiss)
///     .logs()
///     .build()?;
///
/// assert_eq!(cache.name(), "catalog");
/// assert_eq!(cache.settings().key_prefix, "CAT");
/// # Ok::<(), instacache::Error>(())
/// ```
#[derive(Debug)]
pub struct InstanceCacheBuilder<B> {
    backend: B,
    clock: Clock,
    name: CacheName,
    settings: Settings,
    registry: TypeRegistry,
    strategies: HashMap<String, Strategies>,
    logs_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    instruments: Option<crate::telemetry::metrics::Instruments>,
}

impl<B> InstanceCacheBuilder<B>
where
    B: CacheBackend<CacheKey, CachedData> + 'static,
{
    pub(crate) fn new(backend: B, clock: Clock) -> Self {
        Self {
            backend,
            clock,
            name: DEFAULT_CACHE_NAME,
            settings: Settings::default(),
            registry: TypeRegistry::new(),
            strategies: HashMap::new(),
            logs_enabled: false,
            #[cfg(any(feature = "metrics", test))]
            instruments: None,
        }
    }

    /// Replaces all settings at once.
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the first segment of every cache key.
    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.settings.key_prefix = prefix.into();
        self
    }

    /// Makes written entries expire after `ttl`.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.settings.ttl = Some(ttl);
        self
    }

    /// Turns the cache layer on or off.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.settings.enabled = enabled;
        self
    }

    /// Runs the invalidator for deleted entities, using their last cached data.
    #[must_use]
    pub fn cascade_on_delete(mut self, cascade: bool) -> Self {
        self.settings.cascade_on_delete = cascade;
        self
    }

    /// Chooses how bulk backend failures are handled.
    #[must_use]
    pub fn backend_failure(mut self, policy: BackendFailure) -> Self {
        self.settings.backend_failure = policy;
        self
    }

    /// Registers an entity type together with its strategies.
    #[must_use]
    pub fn register(mut self, entity_type: EntityType, strategies: Strategies) -> Self {
        let entity_type = self.registry.register(entity_type);
        self.strategies.insert(entity_type.label(), strategies);
        self
    }

    /// Registers an entity type that can be resolved and wrapped but not loaded.
    #[must_use]
    pub fn register_type(mut self, entity_type: EntityType) -> Self {
        let entity_type = self.registry.register(entity_type);
        self.strategies.remove(&entity_type.label());
        self
    }

    /// Sets the name reported in logs and metrics.
    #[must_use]
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Enables structured logging of cache activity through `tracing`.
    #[must_use]
    pub fn logs(mut self) -> Self {
        self.logs_enabled = true;
        self
    }

    /// Enables OpenTelemetry metrics using the provided meter provider.
    #[cfg(any(feature = "metrics", test))]
    #[must_use]
    pub fn metrics(mut self, provider: &dyn MeterProvider) -> Self {
        self.instruments = Some(crate::telemetry::metrics::Instruments::from_provider(provider));
        self
    }

    /// Builds the cache.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the settings are invalid.
    pub fn build(self) -> Result<InstanceCache, Error> {
        self.settings.validate()?;

        #[cfg(any(feature = "metrics", test))]
        let telemetry = CacheTelemetry::with_instruments(self.logs_enabled, self.instruments);
        #[cfg(not(any(feature = "metrics", test)))]
        let telemetry = CacheTelemetry::new(self.logs_enabled);

        Ok(InstanceCache::from_parts(
            self.name,
            self.backend.into_dynamic(),
            self.registry,
            self.strategies,
            self.settings,
            telemetry,
            self.clock,
        ))
    }
}

#[cfg(feature = "memory")]
impl InstanceCache {
    /// Starts building a cache over a fresh in-process backend.
    pub fn in_memory(clock: Clock) -> InstanceCacheBuilder<instacache_memory::InMemoryBackend<CacheKey, CachedData>> {
        Self::builder(instacache_memory::InMemoryBackend::new(), clock)
    }
}

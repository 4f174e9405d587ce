//! Personalization of the price.
//!
//! The server renders the baseline price, which is safe to show to
//! anyone.  Once hydrated, the [`PriceCoordinator`] asks the pricing
//! service for the price of this particular user through a
//! [`Resource`], one per distinct baseline price, and announces the
//! outcome on the bus:
//!
//! - [`PRICE_UPDATE`] with the personalized price, or
//! - [`PRICE_ERROR`] with a message for the user, in which case the
//!   baseline price is simply left where it is.
//!
//! At most one of the two is published per resource, and only while that
//! resource is still the latest attempt: an attempt overtaken by a newer
//! one settles quietly, so a slow stale answer never replaces a fresher
//! price.  Nothing is ever retried automatically;
//! [`refresh`](PriceCoordinator::refresh) is the explicit way to make
//! another attempt.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock,
    },
};

use crate::{
    bus::{EventBus, PRICE_ERROR, PRICE_UPDATE},
    config::PricingConfig,
    error::{Error, Result},
    pricing::{PriceQuery, PriceQuote, PriceSource},
    resource::{Resource, ResourceCache},
    time::deadline,
};

/// Client-side flags, such as the one marking a logged in user.
pub trait FlagStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;

    /// A flag is set when it holds `"1"`.
    fn is_set(&self, key: &str) -> bool {
        self.get(key).as_deref() == Some("1")
    }
}

/// Flags kept in memory; clones share them.
#[derive(Clone, Debug, Default)]
pub struct MemoryFlags {
    flags: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: &str) {
        self.flags
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) {
        self.flags
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

impl FlagStore for MemoryFlags {
    fn get(&self, key: &str) -> Option<String> {
        self.flags
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

/// Drives the personalized price; clones share the same cache.
#[derive(Clone)]
pub struct PriceCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    bus: EventBus,
    source: Arc<dyn PriceSource>,
    flags: Arc<dyn FlagStore>,
    config: PricingConfig,
    // keyed by the bit pattern of the baseline price
    cache: ResourceCache<u64, f64>,
    // bumped by every attempt; only the latest may announce
    generation: Arc<AtomicU64>,
}

impl PriceCoordinator {
    pub fn new(
        bus: EventBus,
        source: impl PriceSource,
        flags: impl FlagStore,
        config: PricingConfig,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                bus,
                source: Arc::new(source),
                flags: Arc::new(flags),
                config,
                cache: ResourceCache::new(),
                generation: Arc::new(AtomicU64::new(0)),
            }),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn config(&self) -> &PricingConfig {
        &self.inner.config
    }

    /// The personalized price for `base`.
    ///
    /// The same resource is handed out for as long as `base` stays the
    /// same; a different `base` starts a new attempt.
    pub fn resource_for(&self, base: f64) -> Resource<f64> {
        self.inner
            .cache
            .get_or_create(base.to_bits(), || self.attempt(base))
    }

    /// Start a new attempt for `base` regardless of any previous one.
    pub fn refresh(&self, base: f64) -> Resource<f64> {
        self.inner.cache.replace(base.to_bits(), self.attempt(base))
    }

    fn attempt(&self, base: f64) -> Resource<f64> {
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        if !(base.is_finite() && base > 0.0) {
            let error = Error::request_failed(format!("invalid base price {base}"));
            let outcome = Err(error.clone());
            announce(&self.inner.bus, &outcome);
            return Resource::rejected(error);
        }
        // read once per attempt; later changes only affect later attempts
        let logged = self.inner.flags.is_set(&self.inner.config.login_flag);
        let request = self.inner.source.fetch(PriceQuery { base, logged });
        let computation = deadline(self.inner.config.timeout(), async move {
            let body = request.await?;
            PriceQuote::from_body(&body).map(|quote| quote.price)
        });
        let bus = self.inner.bus.clone();
        let latest = self.inner.generation.clone();
        Resource::new_with(computation, move |outcome| {
            if latest.load(Ordering::Acquire) == generation {
                announce(&bus, outcome);
            } else {
                leptos::logging::log!("price: attempt {generation} was superseded, not announced");
            }
        })
    }
}

/// Publish the outcome of an attempt, isolating the coordinator from
/// misbehaving subscribers.
fn announce(bus: &EventBus, outcome: &Result<f64>) {
    let published = match outcome {
        Ok(price) => {
            leptos::logging::log!("price: replace complete with {price}");
            bus.publish(&PRICE_UPDATE, price)
        }
        Err(error) => {
            leptos::logging::warn!("price: replace failed: {error}");
            let message = error
                .fallback_message()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            bus.publish(&PRICE_ERROR, &message)
        }
    };
    if let Err(fault) = published {
        leptos::logging::error!("price: {fault}");
    }
}

mod debug {
    use super::*;
    use std::fmt;

    impl fmt::Debug for PriceCoordinator {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("PriceCoordinator")
                .field("config", &self.inner.config)
                .field("current", &self.inner.cache.current())
                .finish()
        }
    }
}

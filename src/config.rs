use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables of the runtime.
///
/// Every field has a default, so a partial JSON document (or none at
/// all) is enough:
///
/// ```
/// use leptos_promo::config::RuntimeConfig;
///
/// let config = RuntimeConfig::from_json(r#"{ "pricing": { "timeout_ms": 500 } }"#).unwrap();
/// assert_eq!(config.pricing.timeout_ms, 500);
/// assert_eq!(config.pricing.login_flag, "logged");
/// assert_eq!(config.countdown.tick_ms, 1000);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub pricing: PricingConfig,
    pub countdown: CountdownConfig,
    pub keep_alive: KeepAliveConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Deadline of a single pricing attempt.
    pub timeout_ms: u64,
    /// Key of the client-side flag marking a logged in user.
    pub login_flag: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountdownConfig {
    pub tick_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepAliveConfig {
    /// `id` of the hidden element holding released slots.
    pub root_id: String,
}

impl RuntimeConfig {
    pub fn from_json(source: &str) -> serde_json::Result<Self> {
        serde_json::from_str(source)
    }
}

impl PricingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl CountdownConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            login_flag: "logged".to_string(),
        }
    }
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self { tick_ms: 1000 }
    }
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            root_id: "__keepalive__".to_string(),
        }
    }
}

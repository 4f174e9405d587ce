//! The promotion state and its handoff from server to client.
//!
//! The server computes the [`PromoState`] and renders it into the page,
//! both visibly and as `data-*` attributes on the page root.  The client,
//! when not handed the state directly, reads those attributes back, so
//! the very same baseline is used for hydration.
use serde::{Deserialize, Serialize};

use crate::{
    countdown::CountdownState,
    error::{Error, Result},
};

/// Marks the element carrying the promotion attributes.
pub const PROMO_MARKER: &str = "data-promo";
pub const PRODUCT_ID_ATTR: &str = "data-product-id";
pub const TITLE_ATTR: &str = "data-title";
pub const BASE_PRICE_ATTR: &str = "data-base-price";
pub const END_AT_ATTR: &str = "data-end-at";

const PROMOTION_LENGTH_MS: u64 = 10 * 60 * 1000;
const FALLBACK_LENGTH_MS: u64 = 60 * 1000;

/// What is on promotion, at which baseline price, and until when.
///
/// `end_at` is in milliseconds since the Unix epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoState {
    pub product_id: String,
    pub title: String,
    pub base_price: f64,
    pub end_at: u64,
}

impl PromoState {
    pub fn new(
        product_id: impl Into<String>,
        title: impl Into<String>,
        base_price: f64,
        end_at: u64,
    ) -> Result<Self> {
        if !(base_price.is_finite() && base_price > 0.0) {
            return Err(Error::Handoff {
                field: BASE_PRICE_ATTR,
                value: base_price.to_string(),
            });
        }
        Ok(Self {
            product_id: product_id.into(),
            title: title.into(),
            base_price,
            end_at,
        })
    }

    /// The promotion as computed by the server: ten minutes from `now_ms`.
    pub fn demo(now_ms: u64) -> Self {
        Self {
            product_id: "SKU-001".to_string(),
            title: "Flash sale · Bluetooth earbuds".to_string(),
            base_price: 199.0,
            end_at: now_ms + PROMOTION_LENGTH_MS,
        }
    }

    /// Used by the client when the page carries no usable state.
    pub fn fallback(now_ms: u64) -> Self {
        Self {
            product_id: "SKU".to_string(),
            title: "Demo".to_string(),
            base_price: 99.0,
            end_at: now_ms + FALLBACK_LENGTH_MS,
        }
    }

    /// Read the state back from the attributes of the page root, `get`
    /// returning the value of the named attribute.
    pub fn from_attributes(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |field: &'static str| {
            get(field).ok_or(Error::Handoff {
                field,
                value: String::new(),
            })
        };
        let product_id = required(PRODUCT_ID_ATTR)?;
        let title = required(TITLE_ATTR)?;
        let base_price = required(BASE_PRICE_ATTR)?;
        let base_price = base_price
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::Handoff {
                field: BASE_PRICE_ATTR,
                value: base_price.clone(),
            })?;
        let end_at = required(END_AT_ATTR)?;
        let end_at = parse_timestamp(&end_at).ok_or_else(|| Error::Handoff {
            field: END_AT_ATTR,
            value: end_at.clone(),
        })?;
        Self::new(product_id, title, base_price, end_at)
    }

    /// The attributes to render on the page root.
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            (PROMO_MARKER, String::new()),
            (PRODUCT_ID_ATTR, self.product_id.clone()),
            (TITLE_ATTR, self.title.clone()),
            (BASE_PRICE_ATTR, self.base_price.to_string()),
            (END_AT_ATTR, self.end_at.to_string()),
        ]
    }

    /// Use `supplied` if there is one, otherwise `read` it from the page,
    /// falling back to [`fallback`](PromoState::fallback).
    pub fn resolve(
        supplied: Option<PromoState>,
        read: impl FnOnce() -> Result<PromoState>,
        now_ms: u64,
    ) -> Self {
        if let Some(state) = supplied {
            return state;
        }
        read().unwrap_or_else(|error| {
            leptos::logging::warn!("promo state unavailable ({error}), using fallback");
            Self::fallback(now_ms)
        })
    }

    pub fn countdown_state(&self, now_ms: u64) -> CountdownState {
        CountdownState::at(self.end_at, now_ms)
    }
}

fn parse_timestamp(value: &str) -> Option<u64> {
    let value = value.trim();
    value.parse::<u64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .map(|ms| ms as u64)
    })
}

/// Format a price for display.
pub fn format_price(price: f64) -> String {
    format!("¥{price}")
}

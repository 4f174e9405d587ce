//! The pricing collaborator.
//!
//! From the point of view of the runtime the pricing service is opaque:
//! it is asked for a price given the baseline price and whether the user
//! is logged in, and answers with a JSON body of the shape
//! `{ "price": number, "logged": bool }`.  Anything but a finite number
//! in `price` is a failed request.
//!
//! [`SimulatedPricing`] is the reference behaviour of that service:
//! members get a fixed discount, never going below a floor, and the
//! answer takes a while to arrive.
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{Error, Result},
    time::sleep,
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceQuery {
    pub base: f64,
    pub logged: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    pub logged: bool,
}

impl PriceQuote {
    /// Interpret a response body.
    pub fn from_body(body: &Value) -> Result<Self> {
        let price = body
            .get("price")
            .and_then(Value::as_f64)
            .filter(|price| price.is_finite())
            .ok_or_else(|| Error::request_failed("price is not a number"))?;
        let logged = body.get("logged").and_then(Value::as_bool).unwrap_or(false);
        Ok(Self { price, logged })
    }

    pub fn to_body(&self) -> Value {
        json!({ "price": self.price, "logged": self.logged })
    }
}

/// Something able to answer a [`PriceQuery`] with a response body.
///
/// Implementations report transport failures as
/// [`Error::RequestFailed`]; the body itself is validated by the caller.
pub trait PriceSource: Send + Sync + 'static {
    fn fetch(&self, query: PriceQuery) -> BoxFuture<'static, Result<Value>>;
}

impl<F> PriceSource for F
where
    F: Fn(PriceQuery) -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static,
{
    fn fetch(&self, query: PriceQuery) -> BoxFuture<'static, Result<Value>> {
        self(query)
    }
}

/// The reference pricing service.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedPricing {
    pub latency: Duration,
    pub member_discount: f64,
    pub floor: f64,
}

impl Default for SimulatedPricing {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(400),
            member_discount: 20.0,
            floor: 1.0,
        }
    }
}

impl SimulatedPricing {
    pub fn price(&self, query: &PriceQuery) -> f64 {
        if query.logged {
            (query.base - self.member_discount).max(self.floor)
        } else {
            query.base
        }
    }
}

impl PriceSource for SimulatedPricing {
    fn fetch(&self, query: PriceQuery) -> BoxFuture<'static, Result<Value>> {
        let latency = self.latency;
        let quote = PriceQuote {
            price: self.price(&query),
            logged: query.logged,
        };
        Box::pin(async move {
            sleep(latency).await;
            Ok(quote.to_body())
        })
    }
}

#[cfg(any(feature = "ssr", feature = "hydrate"))]
mod server {
    use leptos::prelude::*;

    // the body only exists on the server
    #[cfg(feature = "ssr")]
    use super::{PriceQuery, PriceSource, SimulatedPricing};

    /// The pricing service exposed as a server function.
    #[server(prefix = "/api", endpoint = "price")]
    pub async fn fetch_price(base: f64, logged: bool) -> Result<serde_json::Value, ServerFnError> {
        SimulatedPricing::default()
            .fetch(PriceQuery { base, logged })
            .await
            .map_err(|error| ServerFnError::new(error))
    }
}

#[cfg(any(feature = "ssr", feature = "hydrate"))]
pub use server::fetch_price;

/// Prices through the [`fetch_price`] server function.
#[cfg(any(feature = "ssr", feature = "hydrate"))]
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerPricing;

#[cfg(any(feature = "ssr", feature = "hydrate"))]
impl PriceSource for ServerPricing {
    fn fetch(&self, query: PriceQuery) -> BoxFuture<'static, Result<Value>> {
        Box::pin(async move {
            fetch_price(query.base, query.logged)
                .await
                .map_err(|error| Error::request_failed(error.to_string()))
        })
    }
}

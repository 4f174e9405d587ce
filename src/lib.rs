//! This crate provides the runtime of a progressively hydrated promotion
//! page for the Leptos framework.  The server renders a complete page
//! that is correct for anyone: the product, its baseline price, and the
//! time left until the promotion ends.  Once hydrated in the browser, the
//! page personalizes itself: the countdown starts ticking, the price
//! specific to the user is fetched and swapped in, and the call to action
//! survives being moved around the view tree.
//!
//! ## Moving parts
//!
//! Every part of the page that changes after hydration is driven by one
//! of a handful of small primitives, each usable (and tested) on its own
//! outside of any view tree:
//!
//! - The [`EventBus`](bus::EventBus) is a typed publish/subscribe hub,
//!   letting fragments of the page that share no parent react to each
//!   other.
//! - A [`Resource`](resource::Resource) wraps a single asynchronous
//!   computation; reading it either yields the value, the error, or a
//!   [`Suspension`](resource::Suspension) to await before rendering
//!   again.
//! - The [`KeepAlive`](keepalive::KeepAlive) cache keeps rendered DOM
//!   subtrees alive in a hidden container, so that they can be moved
//!   between hosts without being rebuilt.
//! - The [`Countdown`](countdown::Countdown) state machine announces the
//!   end of the promotion exactly once.
//! - The [`PriceCoordinator`](coordinator::PriceCoordinator) fetches the
//!   personalized price under a deadline and announces the outcome.
//!
//! The [`component`] module wires these into Leptos components, while
//! the `browser` module (behind the `hydrate` feature) provides the
//! `web-sys` backed implementations of the host interfaces.
//!
//! # Example
//!
//! Personalizing the price of a logged in user, outside of any view
//! tree:
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use leptos_promo::{
//!     bus::{handler, EventBus, PRICE_UPDATE},
//!     config::PricingConfig,
//!     coordinator::{MemoryFlags, PriceCoordinator},
//!     pricing::SimulatedPricing,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! # let _ = any_spawner::Executor::init_tokio();
//! let bus = EventBus::new();
//! let shown = Arc::new(Mutex::new(199.0));
//! let _subscription = bus.subscribe(&PRICE_UPDATE, {
//!     let shown = shown.clone();
//!     handler(move |price: &f64| *shown.lock().unwrap() = *price)
//! });
//!
//! let flags = MemoryFlags::new();
//! flags.set("logged", "1");
//! let coordinator = PriceCoordinator::new(
//!     bus,
//!     SimulatedPricing::default(),
//!     flags,
//!     PricingConfig::default(),
//! );
//!
//! let price = coordinator.resource_for(199.0).await?;
//! assert_eq!(price, 179.0);
//! assert_eq!(*shown.lock().unwrap(), 179.0);
//! # Ok(())
//! # }
//! ```
//!
//! Rendering the page is a matter of placing the
//! [`PromoPage`](component::PromoPage) inside a
//! [`PromoRuntime`](component::PromoRuntime); on the server without a
//! coordinator, so the personalized price renders as a skeleton, and in
//! the browser with one.
//!
//! # Feature Flags
#![cfg_attr(
    feature = "document-features",
    cfg_attr(doc, doc = ::document_features::document_features!())
)]

#[cfg(feature = "hydrate")]
pub mod browser;
pub mod bus;
pub mod component;
pub mod config;
pub mod coordinator;
pub mod countdown;
pub mod dom;
pub mod error;
pub mod keepalive;
pub mod pricing;
pub mod registry;
pub mod resource;
pub mod state;
pub mod time;


pub use error::{Error, Result};

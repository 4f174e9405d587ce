//! The promotion page as Leptos components.
//!
//! The server renders the whole page from a [`PromoState`], with the
//! baseline price, the countdown as of render time, and a skeleton in
//! place of the personalized price.  After hydration the countdown
//! starts ticking, the personalized price is fetched through the
//! [`PriceCoordinator`] found in context, and the components react to
//! each other purely through the [`EventBus`].
use any_spawner::Executor;
use leptos::prelude::*;

use crate::{
    bus::{handler, EventBus, COUNTDOWN_DONE, PRICE_UPDATE},
    config::RuntimeConfig,
    coordinator::PriceCoordinator,
    countdown::CountdownState,
    registry::DEFAULT_CTA_LABEL,
    resource::{Read, Resource},
    state::{format_price, PromoState},
    time::{Clock, SystemClock},
};

#[cfg(feature = "hydrate")]
use crate::countdown::{Countdown, CountdownDriver};

/// Slot of the call to action in the keep-alive cache.
pub const CTA_SLOT: &str = "cta";

/// Provides the runtime to its children.
///
/// The bus is the one of `coordinator` unless given explicitly, so that
/// price announcements reach the components.  Without a coordinator the
/// personalized price stays a skeleton, which is what the server renders.
#[component]
pub fn PromoRuntime(
    #[prop(optional)] bus: Option<EventBus>,
    #[prop(optional)] coordinator: Option<PriceCoordinator>,
    #[prop(optional)] config: Option<RuntimeConfig>,
    children: Children,
) -> impl IntoView {
    let bus = bus
        .or_else(|| coordinator.as_ref().map(|coordinator| coordinator.bus().clone()))
        .unwrap_or_default();
    provide_context(bus);
    provide_context(config.unwrap_or_default());
    if let Some(coordinator) = coordinator {
        provide_context(coordinator);
    }
    children()
}

/// The baseline price, replaced by the personalized one once announced.
#[component]
pub fn PriceTag(base: f64) -> impl IntoView {
    let price = ArcRwSignal::new(base);
    if let Some(bus) = use_context::<EventBus>() {
        let subscription = bus.subscribe(&PRICE_UPDATE, {
            let price = price.clone();
            handler(move |value: &f64| price.set(*value))
        });
        on_cleanup(move || subscription.cancel());
    }
    view! {
        <div class="price" id="price-ssr">{move || format_price(price.get())}</div>
    }
}

fn skeleton() -> impl IntoView {
    view! { <span class="skeleton" aria-hidden="true"></span> }
}

/// How to see the member price while trying the page out.
fn login_hint(flag: &str) -> impl IntoView {
    let command = format!("localStorage.setItem('{flag}','1')");
    view! {
        <div class="hint">
            "Tip: run " <code>{command}</code>
            " in the browser console and reload to see the member price."
        </div>
    }
}

/// The personalized price, suspended on the coordinator's resource.
#[component]
pub fn PersonalizedPrice(base: f64) -> impl IntoView {
    let resource = use_context::<PriceCoordinator>().map(|coordinator| coordinator.resource_for(base));
    let flag = use_context::<RuntimeConfig>()
        .unwrap_or_default()
        .pricing
        .login_flag;
    let refresh = ArcRwSignal::new(0usize);
    let render = move || {
        refresh.track();
        match resource.as_ref().map(Resource::read) {
            Some(Read::Ready(price)) => view! {
                <span class="price-personal">{format_price(price)}</span>
            }
            .into_any(),
            Some(Read::Failed(error)) => (
                view! {
                    <span class="price-error">{error.fallback_message().unwrap_or_default()}</span>
                },
                login_hint(&flag),
            )
                .into_any(),
            Some(Read::Suspended(suspension)) => {
                let refresh = refresh.clone();
                Executor::spawn(async move {
                    suspension.wait().await;
                    refresh.update(|n| *n += 1);
                });
                (skeleton(), login_hint(&flag)).into_any()
            }
            None => (skeleton(), login_hint(&flag)).into_any(),
        }
    };
    view! {
        <div class="personalized">
            <strong>"Personalized price: "</strong>
            {render}
        </div>
    }
}

/// `HH:MM:SS` until `end_at`, ticking once hydrated.
#[component]
pub fn CountdownView(end_at: u64) -> impl IntoView {
    let state = ArcRwSignal::new(CountdownState::at(end_at, SystemClock.now_ms()));
    #[cfg(feature = "hydrate")]
    {
        let bus = use_context::<EventBus>().unwrap_or_default();
        let interval = use_context::<RuntimeConfig>()
            .unwrap_or_default()
            .countdown
            .tick();
        let state = state.clone();
        Effect::new(move |_| {
            let countdown = Countdown::new(end_at, SystemClock.now_ms(), bus.clone());
            let handle = CountdownDriver::spawn(countdown, SystemClock, interval, {
                let state = state.clone();
                move |next| state.set(next)
            });
            on_cleanup(move || handle.stop());
        });
    }
    view! {
        <span class="countdown">{move || state.get().to_string()}</span>
    }
}

/// Host of the keep-alive call to action, disabled once the promotion
/// has ended.
#[component]
pub fn CallToAction(#[prop(into, optional)] label: Option<String>) -> impl IntoView {
    let label = label.unwrap_or_else(|| DEFAULT_CTA_LABEL.to_string());
    let ended = ArcRwSignal::new(false);
    if let Some(bus) = use_context::<EventBus>() {
        let subscription = bus.subscribe(&COUNTDOWN_DONE, {
            let ended = ended.clone();
            handler(move |_: &()| ended.set(true))
        });
        on_cleanup(move || subscription.cancel());
    }
    let host = NodeRef::<leptos::html::Span>::new();
    #[cfg(feature = "hydrate")]
    crate::browser::bind_call_to_action(CTA_SLOT, label.clone(), host);
    view! {
        <span
            class="cta-host"
            node_ref=host
            data-cta=label
            aria-disabled=move || ended.get().to_string()
        ></span>
    }
}

/// The whole promotion page, carrying `state` on its root for the client.
#[component]
pub fn PromoPage(state: PromoState) -> impl IntoView {
    let PromoState {
        product_id,
        title,
        base_price,
        end_at,
    } = state;
    let heading = title.clone();
    view! {
        <div
            class="promo"
            data-promo=""
            data-product-id=product_id
            data-title=title
            data-base-price=base_price.to_string()
            data-end-at=end_at.to_string()
        >
            <h1>{heading}</h1>
            <PriceTag base=base_price/>
            <section class="countdown-row">
                <strong>"Ends in: "</strong>
                <CountdownView end_at=end_at/>
            </section>
            <section>
                <CallToAction/>
            </section>
            <section>
                <PersonalizedPrice base=base_price/>
            </section>
        </div>
    }
}

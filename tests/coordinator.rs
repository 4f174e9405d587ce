use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use any_spawner::Executor;
use futures::future::BoxFuture;
use leptos_promo::{
    bus::{handler, EventBus, Handler, PRICE_ERROR, PRICE_UPDATE},
    config::PricingConfig,
    coordinator::{FlagStore, MemoryFlags, PriceCoordinator},
    error::HandlerFault,
    pricing::{PriceQuery, SimulatedPricing},
    resource::ResourceState,
    Error, Result,
};
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct Announcements {
    updates: Arc<Mutex<Vec<f64>>>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl Announcements {
    fn listen(bus: &EventBus) -> Self {
        let announcements = Self::default();
        bus.subscribe(&PRICE_UPDATE, {
            let updates = announcements.updates.clone();
            handler(move |price: &f64| updates.lock().unwrap().push(*price))
        });
        bus.subscribe(&PRICE_ERROR, {
            let errors = announcements.errors.clone();
            handler(move |message: &String| errors.lock().unwrap().push(message.clone()))
        });
        announcements
    }

    fn updates(&self) -> Vec<f64> {
        self.updates.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

fn coordinator(flags: &MemoryFlags, source: SimulatedPricing) -> (PriceCoordinator, Announcements) {
    let bus = EventBus::new();
    let announcements = Announcements::listen(&bus);
    let coordinator = PriceCoordinator::new(bus, source, flags.clone(), PricingConfig::default());
    (coordinator, announcements)
}

fn answering(body: Value) -> impl Fn(PriceQuery) -> BoxFuture<'static, Result<Value>> {
    move |_: PriceQuery| {
        let body = body.clone();
        Box::pin(async move { Ok(body) })
    }
}

#[tokio::test(start_paused = true)]
async fn anonymous_user_keeps_base_price() -> anyhow::Result<()> {
    let _ = Executor::init_tokio();
    let flags = MemoryFlags::new();
    let (coordinator, announced) = coordinator(&flags, SimulatedPricing::default());

    let resource = coordinator.resource_for(199.0);
    assert_eq!(resource.state(), ResourceState::Pending);
    assert_eq!(resource.await?, 199.0);
    assert_eq!(announced.updates(), vec![199.0]);
    assert!(announced.errors().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn member_gets_discount() -> anyhow::Result<()> {
    let _ = Executor::init_tokio();
    let flags = MemoryFlags::new();
    flags.set("logged", "1");
    let (coordinator, announced) = coordinator(&flags, SimulatedPricing::default());

    assert_eq!(coordinator.resource_for(199.0).await?, 179.0);
    assert_eq!(announced.updates(), vec![179.0]);

    // never below the floor
    assert_eq!(coordinator.resource_for(15.0).await?, 1.0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn only_one_marks_a_member() -> anyhow::Result<()> {
    let _ = Executor::init_tokio();
    let flags = MemoryFlags::new();
    flags.set("logged", "true");
    assert!(!flags.is_set("logged"));
    let (coordinator, _) = coordinator(&flags, SimulatedPricing::default());
    assert_eq!(coordinator.resource_for(199.0).await?, 199.0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn slow_service_times_out() {
    let _ = Executor::init_tokio();
    let flags = MemoryFlags::new();
    flags.set("logged", "1");
    let slow = SimulatedPricing {
        latency: Duration::from_secs(5),
        ..Default::default()
    };
    let (coordinator, announced) = coordinator(&flags, slow);

    let resource = coordinator.resource_for(199.0);
    assert_eq!(resource.settled().await, Err(Error::Timeout));
    assert!(announced.updates().is_empty());
    assert_eq!(
        announced.errors(),
        vec!["Request timed out, showing the standard price instead."]
    );

    // the abandoned request never announces anything
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(announced.updates().is_empty());
    assert_eq!(announced.errors().len(), 1);
}

#[tokio::test]
async fn malformed_body_fails_the_request() {
    let _ = Executor::init_tokio();
    let bus = EventBus::new();
    let announced = Announcements::listen(&bus);
    let coordinator = PriceCoordinator::new(
        bus,
        answering(json!({ "price": "cheap", "logged": false })),
        MemoryFlags::new(),
        PricingConfig::default(),
    );

    let outcome = coordinator.resource_for(199.0).settled().await;
    assert!(matches!(outcome, Err(Error::RequestFailed { .. })));
    assert!(announced.updates().is_empty());
    assert_eq!(
        announced.errors(),
        vec!["Request failed, showing the standard price instead."]
    );
}

#[tokio::test]
async fn transport_failure_is_announced() {
    let _ = Executor::init_tokio();
    let bus = EventBus::new();
    let announced = Announcements::listen(&bus);
    let failing = |_: PriceQuery| -> BoxFuture<'static, Result<Value>> {
        Box::pin(async { Err(Error::request_failed("HTTP 502")) })
    };
    let coordinator =
        PriceCoordinator::new(bus, failing, MemoryFlags::new(), PricingConfig::default());

    assert_eq!(
        coordinator.resource_for(199.0).settled().await,
        Err(Error::request_failed("HTTP 502"))
    );
    assert_eq!(announced.errors().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn login_state_is_read_once_per_attempt() -> anyhow::Result<()> {
    let _ = Executor::init_tokio();
    let flags = MemoryFlags::new();
    flags.set("logged", "1");
    let (coordinator, _) = coordinator(&flags, SimulatedPricing::default());

    let resource = coordinator.resource_for(199.0);
    flags.remove("logged");
    assert_eq!(resource.await?, 179.0);

    // still the same attempt for the same price
    assert_eq!(coordinator.resource_for(199.0).await?, 179.0);
    assert_eq!(coordinator.refresh(199.0).await?, 199.0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn one_resource_per_base_price() -> anyhow::Result<()> {
    let _ = Executor::init_tokio();
    let flags = MemoryFlags::new();
    let (coordinator, announced) = coordinator(&flags, SimulatedPricing::default());

    let first = coordinator.resource_for(199.0);
    let again = coordinator.resource_for(199.0);
    assert!(first.ptr_eq(&again));
    first.settled().await?;
    assert_eq!(announced.updates().len(), 1);

    let other = coordinator.resource_for(99.0);
    assert!(!other.ptr_eq(&first));
    assert_eq!(other.await?, 99.0);

    let refreshed = coordinator.refresh(99.0);
    assert!(refreshed.ptr_eq(&coordinator.resource_for(99.0)));
    refreshed.settled().await?;
    assert_eq!(announced.updates(), vec![199.0, 99.0, 99.0]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn superseded_attempt_stays_quiet() -> anyhow::Result<()> {
    let _ = Executor::init_tokio();
    let bus = EventBus::new();
    let announced = Announcements::listen(&bus);
    // the first request is much slower than the one replacing it
    let uneven = |query: PriceQuery| -> BoxFuture<'static, Result<Value>> {
        let latency = if query.base == 199.0 { 2000 } else { 100 };
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(latency)).await;
            Ok(json!({ "price": query.base, "logged": query.logged }))
        })
    };
    let coordinator =
        PriceCoordinator::new(bus, uneven, MemoryFlags::new(), PricingConfig::default());

    let stale = coordinator.resource_for(199.0);
    let current = coordinator.resource_for(99.0);
    assert_eq!(current.await?, 99.0);
    // the stale attempt still resolves for whoever holds it
    assert_eq!(stale.await?, 199.0);
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(announced.updates(), vec![99.0]);
    assert!(announced.errors().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn refresh_silences_the_attempt_in_flight() -> anyhow::Result<()> {
    let _ = Executor::init_tokio();
    let flags = MemoryFlags::new();
    let (coordinator, announced) = coordinator(&flags, SimulatedPricing::default());

    let first = coordinator.resource_for(199.0);
    flags.set("logged", "1");
    let second = coordinator.refresh(199.0);
    assert_eq!(second.await?, 179.0);
    assert_eq!(first.await?, 199.0);
    assert_eq!(announced.updates(), vec![179.0]);
    Ok(())
}

#[tokio::test]
async fn invalid_base_rejects_immediately() {
    let _ = Executor::init_tokio();
    let flags = MemoryFlags::new();
    let (coordinator, announced) = coordinator(&flags, SimulatedPricing::default());

    for base in [0.0, -5.0, f64::NAN] {
        let resource = coordinator.resource_for(base);
        assert_eq!(resource.state(), ResourceState::Rejected);
    }
    assert_eq!(announced.errors().len(), 3);
    assert!(announced.updates().is_empty());
}

#[tokio::test(start_paused = true)]
async fn faulty_subscriber_does_not_break_pricing() -> anyhow::Result<()> {
    let _ = Executor::init_tokio();
    let flags = MemoryFlags::new();
    flags.set("logged", "1");
    let bus = EventBus::new();
    let failing: Handler<f64> = Arc::new(|_: &f64| Err(HandlerFault::new("detached")));
    bus.subscribe(&PRICE_UPDATE, failing);
    let coordinator = PriceCoordinator::new(
        bus,
        SimulatedPricing::default(),
        flags,
        PricingConfig::default(),
    );

    assert_eq!(coordinator.resource_for(199.0).await?, 179.0);
    Ok(())
}

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use any_spawner::Executor;
use leptos_promo::{
    resource::{Read, Resource, ResourceCache, ResourceState},
    time::sleep,
    Error,
};
use tokio::sync::oneshot;

#[tokio::test]
async fn suspended_readers_resume_with_value() -> anyhow::Result<()> {
    let _ = Executor::init_tokio();
    let (sender, receiver) = oneshot::channel::<u32>();
    let resource = Resource::new(async move {
        receiver
            .await
            .map_err(|_| Error::request_failed("sender dropped"))
    });

    let Read::Suspended(first) = resource.read() else {
        panic!("resource should be pending");
    };
    let Read::Suspended(second) = resource.read() else {
        panic!("resource should be pending");
    };
    assert_eq!(resource.state(), ResourceState::Pending);

    sender.send(7).expect("receiver alive");
    first.wait().await;
    second.wait().await;

    assert!(matches!(resource.read(), Read::Ready(7)));
    assert_eq!(resource.clone().await?, 7);
    Ok(())
}

#[tokio::test]
async fn rejection_is_final() {
    let _ = Executor::init_tokio();
    let runs = Arc::new(AtomicUsize::new(0));
    let resource = Resource::<u32>::new({
        let runs = runs.clone();
        async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Err(Error::request_failed("503"))
        }
    });

    assert_eq!(resource.settled().await, Err(Error::request_failed("503")));
    for _ in 0..3 {
        assert!(matches!(resource.read(), Read::Failed(Error::RequestFailed { .. })));
    }
    assert_eq!(resource.state(), ResourceState::Rejected);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn deadline_rejects_with_timeout() {
    let _ = Executor::init_tokio();
    let resource = Resource::<u32>::with_timeout(
        Duration::from_millis(3000),
        futures::future::pending(),
    );
    assert!(resource.read().is_suspended());
    assert_eq!(resource.settled().await, Err(Error::Timeout));
    assert_eq!(resource.state(), ResourceState::Rejected);
}

#[tokio::test(start_paused = true)]
async fn deadline_lets_fast_computation_through() -> anyhow::Result<()> {
    let _ = Executor::init_tokio();
    let resource = Resource::with_timeout(Duration::from_millis(3000), async {
        sleep(Duration::from_millis(400)).await;
        Ok("done")
    });
    assert_eq!(resource.await?, "done");
    Ok(())
}

#[tokio::test]
async fn settle_callback_runs_before_readers_resume() -> anyhow::Result<()> {
    let _ = Executor::init_tokio();
    let announced = Arc::new(AtomicUsize::new(0));
    let resource = Resource::new_with(async { Ok(1u32) }, {
        let announced = announced.clone();
        move |outcome| {
            assert_eq!(outcome, &Ok(1));
            announced.fetch_add(1, Ordering::SeqCst);
        }
    });
    assert_eq!(resource.settled().await?, 1);
    assert_eq!(announced.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn cache_keeps_latest_input() -> anyhow::Result<()> {
    let _ = Executor::init_tokio();
    let cache = ResourceCache::<&str, u32>::new();
    let created = Arc::new(AtomicUsize::new(0));
    let create = |value: u32| {
        let created = created.clone();
        move || {
            created.fetch_add(1, Ordering::SeqCst);
            Resource::resolved(value)
        }
    };

    let first = cache.get_or_create("a", create(1));
    let again = cache.get_or_create("a", create(2));
    assert!(first.ptr_eq(&again));
    assert_eq!(created.load(Ordering::SeqCst), 1);

    let other = cache.get_or_create("b", create(3));
    assert!(!other.ptr_eq(&first));
    assert_eq!(other.await?, 3);

    // the previous input is not remembered
    let back = cache.get_or_create("a", create(4));
    assert_eq!(back.await?, 4);
    assert_eq!(created.load(Ordering::SeqCst), 3);

    let replaced = cache.replace("a", Resource::resolved(5));
    assert!(cache.current().is_some_and(|current| current.ptr_eq(&replaced)));
    Ok(())
}

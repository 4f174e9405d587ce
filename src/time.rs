//! Timers and clocks that work both natively and in the browser.
//!
//! Natively these are backed by `tokio::time`; under the `hydrate`
//! feature the timer is a `setTimeout` and the clock is `Date.now()`, as
//! there is no tokio runtime driving time inside the browser.
use std::{
    future::Future,
    pin::pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::future::{select, Either};

use crate::error::{Error, Result};

/// Wait for `duration`.
#[cfg(not(feature = "hydrate"))]
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await
}

/// Wait for `duration`.
#[cfg(feature = "hydrate")]
pub async fn sleep(duration: Duration) {
    let (sender, receiver) = tokio::sync::oneshot::channel::<()>();
    leptos::prelude::set_timeout(
        move || {
            let _ = sender.send(());
        },
        duration,
    );
    let _ = receiver.await;
}

/// Run `computation` until it settles or `timeout` elapses.
///
/// On expiry the computation is dropped, which cancels whatever request
/// it had in flight, and [`Error::Timeout`] is returned.  A computation
/// that settles first is returned as is.
pub async fn deadline<T, F>(timeout: Duration, computation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let computation = pin!(computation);
    let timer = pin!(sleep(timeout));
    match select(computation, timer).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => Err(Error::Timeout),
    }
}

/// Wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[cfg(not(feature = "hydrate"))]
    fn now_ms(&self) -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }

    #[cfg(feature = "hydrate")]
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}

/// A clock that only moves when told to.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(now_ms)),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

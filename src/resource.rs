//! Suspending asynchronous resources.
//!
//! A [`Resource`] wraps exactly one asynchronous computation, started
//! the moment the resource is created.  A rendering pass calls
//! [`read`](Resource::read) and gets one of three answers:
//!
//! - [`Read::Ready`] with the value,
//! - [`Read::Failed`] with the error the computation rejected with,
//! - [`Read::Suspended`] carrying a [`Suspension`], an awaitable that
//!   completes once the computation settles.  The enclosing suspension
//!   boundary is expected to await it and then run the render again.
//!
//! The transition out of pending is one-way: a settled resource never
//! changes again, and a rejected one is never retried.  A new attempt,
//! or a new input, requires a new resource; [`ResourceCache`] keeps the
//! resource for the latest input and replaces it when the input changes.
//!
//! Settlement is broadcast through a `tokio::sync::watch` channel, so any
//! number of suspended readers are woken by the single transition.
use std::{
    future::{Future, IntoFuture},
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Duration,
};

use any_spawner::Executor;
use futures::future::BoxFuture;
use tokio::sync::watch::{channel, Receiver, Sender};

use crate::{
    error::{Error, Result},
    time::deadline,
};

/// A handle to a single asynchronous computation; clones share it.
pub struct Resource<T> {
    pub(crate) inner: Arc<ResourceInner<T>>,
}

pub(crate) struct ResourceInner<T> {
    state: RwLock<Settlement<T>>,
    settled: Sender<bool>,
}

pub(crate) enum Settlement<T> {
    Pending,
    Resolved(T),
    Rejected(Error),
}

/// The status of a [`Resource`], without its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceState {
    Pending,
    Resolved,
    Rejected,
}

/// The outcome of [`Resource::read`].
#[derive(Debug)]
pub enum Read<T> {
    Ready(T),
    Suspended(Suspension),
    Failed(Error),
}

/// The "not ready yet" signal of a pending [`Resource`].
pub struct Suspension {
    receiver: Receiver<bool>,
}

impl Suspension {
    /// Wait until the resource this came from has settled.
    ///
    /// Returns immediately if that already happened between the read
    /// and this call.
    pub async fn wait(mut self) {
        let _ = self.receiver.wait_for(|settled| *settled).await;
    }
}

impl<T> Read<T> {
    pub fn is_suspended(&self) -> bool {
        matches!(self, Read::Suspended(_))
    }

    /// The settled outcome, or `None` while suspended.
    pub fn settled(self) -> Option<Result<T>> {
        match self {
            Read::Ready(value) => Some(Ok(value)),
            Read::Failed(error) => Some(Err(error)),
            Read::Suspended(_) => None,
        }
    }
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> ResourceInner<T> {
    pub(crate) fn with_state(state: Settlement<T>) -> Self {
        let (settled, _) = channel(!matches!(state, Settlement::Pending));
        Self {
            state: RwLock::new(state),
            settled,
        }
    }

    /// Record the outcome; only the first one counts.
    pub(crate) fn settle(&self, result: Result<T>) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !matches!(*state, Settlement::Pending) {
            return false;
        }
        *state = match result {
            Ok(value) => Settlement::Resolved(value),
            Err(error) => Settlement::Rejected(error),
        };
        true
    }

    /// Wake every suspended reader.
    pub(crate) fn notify(&self) {
        // `send` would not store the value without a live receiver.
        self.settled.send_replace(true);
    }
}

impl<T: Clone> ResourceInner<T> {
    fn outcome(&self) -> Option<Result<T>> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            Settlement::Pending => None,
            Settlement::Resolved(value) => Some(Ok(value.clone())),
            Settlement::Rejected(error) => Some(Err(error.clone())),
        }
    }
}

impl<T> Resource<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start `computation` on the ambient executor and return its handle.
    pub fn new<F>(computation: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self::new_with(computation, |_| ())
    }

    /// As [`new`](Resource::new), additionally calling `on_settle` with
    /// the outcome right after the resource settled, before any suspended
    /// reader gets to run.
    pub fn new_with<F, O>(computation: F, on_settle: O) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
        O: FnOnce(&Result<T>) + Send + 'static,
    {
        let inner = Arc::new(ResourceInner::with_state(Settlement::Pending));
        let task = {
            let inner = inner.clone();
            async move {
                let result = computation.await;
                if inner.settle(result) {
                    if let Some(outcome) = inner.outcome() {
                        on_settle(&outcome);
                    }
                }
                inner.notify();
            }
        };
        Executor::spawn(task);
        Self { inner }
    }

    /// As [`new`](Resource::new), but reject with [`Error::Timeout`] if
    /// `computation` has not settled within `timeout`.
    pub fn with_timeout<F>(timeout: Duration, computation: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self::new(deadline(timeout, computation))
    }

    pub fn resolved(value: T) -> Self {
        Self {
            inner: Arc::new(ResourceInner::with_state(Settlement::Resolved(value))),
        }
    }

    pub fn rejected(error: Error) -> Self {
        Self {
            inner: Arc::new(ResourceInner::with_state(Settlement::Rejected(error))),
        }
    }

    pub fn read(&self) -> Read<T> {
        let state = self.inner.state.read().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            // subscribed under the read lock, so settlement cannot slip in
            // between the check and the subscription
            Settlement::Pending => Read::Suspended(Suspension {
                receiver: self.inner.settled.subscribe(),
            }),
            Settlement::Resolved(value) => Read::Ready(value.clone()),
            Settlement::Rejected(error) => Read::Failed(error.clone()),
        }
    }

    /// Wait for the computation and return its outcome.
    pub async fn settled(&self) -> Result<T> {
        loop {
            match self.read() {
                Read::Ready(value) => return Ok(value),
                Read::Failed(error) => return Err(error),
                Read::Suspended(suspension) => suspension.wait().await,
            }
        }
    }
}

impl<T> Resource<T> {
    pub fn state(&self) -> ResourceState {
        match &*self.inner.state.read().unwrap_or_else(PoisonError::into_inner) {
            Settlement::Pending => ResourceState::Pending,
            Settlement::Resolved(_) => ResourceState::Resolved,
            Settlement::Rejected(_) => ResourceState::Rejected,
        }
    }

    /// Whether both handles refer to the same computation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> IntoFuture for Resource<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Result<T>;
    type IntoFuture = BoxFuture<'static, Result<T>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.settled().await })
    }
}

/// Keeps the resource of the most recent input key.
///
/// Asking for the same key again hands back the same resource; asking
/// for a different key creates a new one and lets the old one go.
pub struct ResourceCache<K, T> {
    current: Mutex<Option<(K, Resource<T>)>>,
}

impl<K, T> Default for ResourceCache<K, T> {
    fn default() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }
}

impl<K, T> ResourceCache<K, T>
where
    K: PartialEq,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, key: K, create: impl FnOnce() -> Resource<T>) -> Resource<T> {
        {
            let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some((cached, resource)) = &*current {
                if *cached == key {
                    return resource.clone();
                }
            }
        }
        // created without holding the lock, as creating may well call back
        // into whoever owns this cache
        self.replace(key, create())
    }

    /// Replace whatever is cached with a fresh resource for `key`.
    pub fn replace(&self, key: K, resource: Resource<T>) -> Resource<T> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = Some((key, resource.clone()));
        resource
    }

    pub fn current(&self) -> Option<Resource<T>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, resource)| resource.clone())
    }
}

mod debug {
    use super::*;
    use std::fmt;

    impl<T> fmt::Debug for Resource<T> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Resource")
                .field("state", &self.state())
                .field("readers", &self.inner.settled.receiver_count())
                .finish()
        }
    }

    impl fmt::Debug for Suspension {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Suspension")
                .field("settled", &*self.receiver.borrow())
                .finish()
        }
    }
}

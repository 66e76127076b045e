//! Pending results of storage operations.
//!
//! Every operation returns a [`Request`]. It is a future, and it can also
//! hand its outcome to a callback registered with [`Request::on_settled`].
//! Both channels observe the same single settlement.

use crate::error::{ForageError, ForageResult};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

type Callback<T> = Box<dyn FnOnce(&ForageResult<T>) + Send>;

struct Shared<T> {
    result: Option<ForageResult<T>>,
    settled: bool,
    waker: Option<Waker>,
    callback: Option<Callback<T>>,
}

/// The pending result of a storage operation.
///
/// Await it, register a callback with [`Request::on_settled`], or both.
///
/// # Example
///
/// ```no_run
/// # async fn demo(forage: forage_core::LocalForage) {
/// let value = forage
///     .get_item("greeting")
///     .on_settled(|result| println!("settled: {result:?}"))
///     .await;
/// # }
/// ```
#[must_use = "a request does nothing visible unless awaited or given a callback"]
pub struct Request<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

/// The settling half of a [`Request`].
///
/// Dropping it without settling settles the request with
/// [`ForageError::Dropped`].
pub(crate) struct Resolver<T> {
    shared: Option<Arc<Mutex<Shared<T>>>>,
}

/// Creates a connected resolver and request.
pub(crate) fn channel<T>() -> (Resolver<T>, Request<T>) {
    let shared = Arc::new(Mutex::new(Shared {
        result: None,
        settled: false,
        waker: None,
        callback: None,
    }));
    (
        Resolver {
            shared: Some(Arc::clone(&shared)),
        },
        Request { shared },
    )
}

impl<T> Request<T> {
    /// Creates a request that is already settled.
    pub fn settled(result: ForageResult<T>) -> Self {
        let (resolver, request) = channel();
        resolver.settle(result);
        request
    }

    /// Registers a callback that receives the outcome exactly once.
    ///
    /// If the request has already settled the callback runs immediately.
    /// Registering a second callback replaces the first if it has not run.
    pub fn on_settled<F>(self, callback: F) -> Self
    where
        F: FnOnce(&ForageResult<T>) + Send + 'static,
    {
        let mut shared = self.shared.lock();
        match shared.result.take() {
            Some(result) => {
                drop(shared);
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(&result)));
                self.shared.lock().result = Some(result);
                if let Err(payload) = outcome {
                    panic::resume_unwind(payload);
                }
            }
            None if !shared.settled => {
                shared.callback = Some(Box::new(callback));
                drop(shared);
            }
            // Already settled and consumed by a poll.
            None => drop(shared),
        }
        self
    }

    /// Returns true once the operation has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.shared.lock().settled
    }
}

impl<T> Future for Request<T> {
    type Output = ForageResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.shared.lock();
        match shared.result.take() {
            Some(result) => Poll::Ready(result),
            None if shared.settled => Poll::Ready(Err(ForageError::Dropped)),
            None => {
                shared.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl<T> Resolver<T> {
    /// Settles the request. Only the first settlement has any effect.
    pub(crate) fn settle(mut self, result: ForageResult<T>) {
        self.complete(result);
    }

    fn complete(&mut self, result: ForageResult<T>) {
        let Some(shared) = self.shared.take() else {
            return;
        };

        // Callbacks run without the lock held. One registered while an
        // earlier one runs is picked up on the next pass.
        let mut callback = shared.lock().callback.take();
        let mut failure = None;
        loop {
            if let Some(callback) = callback.take() {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(&result))) {
                    failure.get_or_insert(payload);
                }
            }
            let mut guard = shared.lock();
            callback = guard.callback.take();
            if callback.is_none() {
                guard.result = Some(result);
                guard.settled = true;
                let waker = guard.waker.take();
                drop(guard);
                if let Some(waker) = waker {
                    waker.wake();
                }
                break;
            }
        }

        if let Some(payload) = failure {
            panic::resume_unwind(payload);
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        self.complete(Err(ForageError::Dropped));
    }
}

//! Ready gate.
//!
//! Defers operations until a driver has been selected and initialized,
//! then runs them in submission order.
//!
//! ```text
//!  Init ──first submission──► Resolving ──queue drained──► Ready
//!                               │    ▲                       │
//!                               │    └──────set_driver───────┘
//!                               └──selection failed──► Failed (terminal)
//! ```
//!
//! The queue holds two kinds of task: a selection (run the selector over a
//! candidate list, then the chosen driver's init hook) and an operation.
//! A single pump task drains it, in every state, so operations reach the
//! driver in submission order. Each runs to completion before the next
//! starts. The pump exits when the queue is empty and is restarted by the
//! next submission.
//!
//! A panic in an operation or an init hook is caught by the pump. The
//! panicking request settles with [`ForageError::Dropped`] and the queue
//! keeps draining.

use crate::config::{Config, ConfigPatch};
use crate::driver::{DriverContext, Storage};
use crate::error::{ForageError, ForageResult};
use crate::registry::DriverRegistry;
use crate::request::Resolver;
use crate::selector::select_driver;
use forage_host::HostEnvironment;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;
use uuid::Uuid;

/// Lifecycle state of a storage instance.
#[derive(Debug, Clone, PartialEq)]
pub enum GateState {
    /// Nothing has been submitted yet; configuration may still change.
    Init,
    /// A driver is being selected or initialized; operations queue.
    Resolving,
    /// A driver is active; operations run immediately.
    Ready,
    /// Selection failed; every operation fails with this error.
    Failed(ForageError),
}

impl GateState {
    /// Returns true once the gate has started resolving a driver.
    #[must_use]
    pub fn is_started(&self) -> bool {
        !matches!(self, GateState::Init)
    }
}

/// The public operation a pending operation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// `getItem`
    GetItem,
    /// `setItem`
    SetItem,
    /// `removeItem`
    RemoveItem,
    /// `clear`
    Clear,
    /// `length`
    Length,
    /// `key`
    Key,
    /// `keys`
    Keys,
    /// `iterate`
    Iterate,
    /// `dropInstance`
    DropInstance,
    /// `ready`
    Ready,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::GetItem => "getItem",
            OperationKind::SetItem => "setItem",
            OperationKind::RemoveItem => "removeItem",
            OperationKind::Clear => "clear",
            OperationKind::Length => "length",
            OperationKind::Key => "key",
            OperationKind::Keys => "keys",
            OperationKind::Iterate => "iterate",
            OperationKind::DropInstance => "dropInstance",
            OperationKind::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// An operation waiting for a driver.
///
/// Exactly one of `run` or `reject` is called.
pub(crate) trait PendingOperation: Send {
    fn kind(&self) -> OperationKind;

    fn run(self: Box<Self>, storage: Arc<dyn Storage>) -> BoxFuture<'static, ()>;

    fn reject(self: Box<Self>, err: ForageError);
}

enum Task {
    Select {
        candidates: Vec<String>,
        completion: Option<Resolver<()>>,
    },
    Run(Box<dyn PendingOperation>),
}

struct ActiveDriver {
    name: String,
    storage: Arc<dyn Storage>,
}

struct GateInner {
    state: GateState,
    config: Config,
    active: Option<ActiveDriver>,
    queue: VecDeque<Task>,
    pumping: bool,
}

/// The per-instance state machine and operation queue.
pub(crate) struct ReadyGate {
    id: Uuid,
    registry: Arc<DriverRegistry>,
    env: HostEnvironment,
    inner: Mutex<GateInner>,
}

impl ReadyGate {
    pub(crate) fn new(
        id: Uuid,
        registry: Arc<DriverRegistry>,
        env: HostEnvironment,
        config: Config,
    ) -> Self {
        Self {
            id,
            registry,
            env,
            inner: Mutex::new(GateInner {
                state: GateState::Init,
                config,
                active: None,
                queue: VecDeque::new(),
                pumping: false,
            }),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn registry(&self) -> &Arc<DriverRegistry> {
        &self.registry
    }

    pub(crate) fn env(&self) -> &HostEnvironment {
        &self.env
    }

    pub(crate) fn state(&self) -> GateState {
        self.inner.lock().state.clone()
    }

    pub(crate) fn config(&self) -> Config {
        self.inner.lock().config.clone()
    }

    /// Merges `patch` into the configuration while nothing has started.
    pub(crate) fn configure(&self, patch: &ConfigPatch) -> ForageResult<()> {
        let mut inner = self.inner.lock();
        if inner.state.is_started() {
            return Err(ForageError::ConfigLocked);
        }
        let mut config = inner.config.clone();
        config.apply(patch);
        inner.config = config.normalized()?;
        Ok(())
    }

    pub(crate) fn driver_name(&self) -> Option<String> {
        self.inner.lock().active.as_ref().map(|a| a.name.clone())
    }

    /// Routes an operation according to the current state.
    pub(crate) fn submit(self: &Arc<Self>, op: Box<dyn PendingOperation>) {
        let Ok(handle) = Handle::try_current() else {
            op.reject(ForageError::NoRuntime);
            return;
        };

        let mut inner = self.inner.lock();
        match &inner.state {
            GateState::Failed(err) => {
                let err = err.clone();
                drop(inner);
                op.reject(err);
            }
            GateState::Ready => {
                tracing::trace!(instance = %self.id, op = %op.kind(), "dispatching");
                inner.queue.push_back(Task::Run(op));
                self.ensure_pump(&mut inner, &handle);
            }
            GateState::Resolving => {
                tracing::trace!(instance = %self.id, op = %op.kind(), "queued");
                inner.queue.push_back(Task::Run(op));
            }
            GateState::Init => {
                let candidates = inner
                    .config
                    .driver_order
                    .clone()
                    .unwrap_or_else(|| self.registry.default_order().to_vec());
                inner.queue.push_back(Task::Select {
                    candidates,
                    completion: None,
                });
                tracing::trace!(instance = %self.id, op = %op.kind(), "queued");
                inner.queue.push_back(Task::Run(op));
                self.start(&mut inner, &handle);
            }
        }
    }

    /// Queues a switch to the first supported driver among `candidates`.
    pub(crate) fn set_driver(self: &Arc<Self>, candidates: Vec<String>, completion: Resolver<()>) {
        let Ok(handle) = Handle::try_current() else {
            completion.settle(Err(ForageError::NoRuntime));
            return;
        };

        let mut inner = self.inner.lock();
        if let GateState::Failed(err) = &inner.state {
            let err = err.clone();
            drop(inner);
            completion.settle(Err(err));
            return;
        }

        tracing::debug!(instance = %self.id, ?candidates, "driver change requested");
        inner.queue.push_back(Task::Select {
            candidates,
            completion: Some(completion),
        });
        if inner.state != GateState::Resolving {
            self.start(&mut inner, &handle);
        }
    }

    fn start(self: &Arc<Self>, inner: &mut GateInner, handle: &Handle) {
        inner.state = GateState::Resolving;
        tracing::debug!(instance = %self.id, "resolving driver");
        self.ensure_pump(inner, handle);
    }

    fn ensure_pump(self: &Arc<Self>, inner: &mut GateInner, handle: &Handle) {
        if !inner.pumping {
            inner.pumping = true;
            handle.spawn(Arc::clone(self).pump());
        }
    }

    async fn pump(self: Arc<Self>) {
        loop {
            let task = {
                let mut inner = self.inner.lock();
                match inner.queue.pop_front() {
                    Some(task) => task,
                    None => {
                        inner.pumping = false;
                        if inner.state == GateState::Resolving {
                            inner.state = if inner.active.is_some() {
                                GateState::Ready
                            } else {
                                GateState::Failed(ForageError::NoAvailableDriver)
                            };
                            tracing::debug!(instance = %self.id, state = ?inner.state, "queue drained");
                        }
                        return;
                    }
                }
            };

            match AssertUnwindSafe(self.step(task)).catch_unwind().await {
                Ok(true) => {}
                Ok(false) => return,
                Err(payload) => {
                    tracing::error!(
                        instance = %self.id,
                        panic = %panic_message(payload.as_ref()),
                        "operation panicked"
                    );
                }
            }
        }
    }

    /// Runs one task. Returns false once the gate has failed for good.
    async fn step(&self, task: Task) -> bool {
        match task {
            Task::Run(op) => {
                let storage = self
                    .inner
                    .lock()
                    .active
                    .as_ref()
                    .map(|active| Arc::clone(&active.storage));
                match storage {
                    Some(storage) => op.run(storage).await,
                    None => op.reject(ForageError::NoAvailableDriver),
                }
                true
            }
            Task::Select {
                candidates,
                completion,
            } => match self.resolve(&candidates).await {
                Ok(active) => {
                    tracing::debug!(instance = %self.id, driver = %active.name, "driver ready");
                    self.inner.lock().active = Some(active);
                    if let Some(completion) = completion {
                        completion.settle(Ok(()));
                    }
                    true
                }
                Err(err) => self.fail(err, completion),
            },
        }
    }

    /// Settles everything queued behind a failed selection.
    ///
    /// Operations up to the next queued selection fail with `err`. Returns
    /// true if such a selection exists and the pump should go on; otherwise
    /// the gate enters the terminal failed state.
    fn fail(&self, err: ForageError, completion: Option<Resolver<()>>) -> bool {
        tracing::warn!(instance = %self.id, error = %err, "driver selection failed");

        let (rejected, more) = {
            let mut inner = self.inner.lock();
            inner.active = None;
            inner.state = GateState::Resolving;
            let mut rejected = Vec::new();
            while let Some(Task::Run(_)) = inner.queue.front() {
                if let Some(Task::Run(op)) = inner.queue.pop_front() {
                    rejected.push(op);
                }
            }
            let more = !inner.queue.is_empty();
            if !more {
                inner.state = GateState::Failed(err.clone());
                inner.pumping = false;
            }
            (rejected, more)
        };

        if let Some(completion) = completion {
            completion.settle(Err(err.clone()));
        }
        for op in rejected {
            op.reject(err.clone());
        }
        more
    }

    async fn resolve(&self, candidates: &[String]) -> ForageResult<ActiveDriver> {
        let driver = select_driver(&self.registry, &self.env, candidates)?;
        let ctx = DriverContext {
            config: self.config(),
            env: self.env.clone(),
        };
        let storage = AssertUnwindSafe(driver.init_storage(&ctx))
            .catch_unwind()
            .await
            .map_err(|payload| {
                ForageError::driver(format!(
                    "{} init panicked: {}",
                    driver.name(),
                    panic_message(payload.as_ref())
                ))
            })??;
        Ok(ActiveDriver {
            name: driver.name().to_string(),
            storage,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

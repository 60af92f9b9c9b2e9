//! Bounded request queue
//!
//! Admission control for outbound geocoding requests. Tasks start in FIFO
//! order, with at most `concurrency` running at once and at most
//! `interval_cap` started per fixed `interval` window. The queue never
//! changes a task's output; it only decides when the task starts.
//!
//! Nominatim allows one request per second, which is what
//! [`RateLimitOptions::default`] encodes.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::RateLimitOptions;
use crate::error::GeocodingError;

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// FIFO queue enforcing concurrency and per-interval start caps
///
/// Cloning yields another handle to the same queue. Each geocoding client
/// owns its own queue; there is no process-wide instance.
///
/// Tasks are spawned onto the ambient Tokio runtime, so [`enqueue`] must be
/// called from within one.
///
/// [`enqueue`]: RequestQueue::enqueue
#[derive(Clone)]
pub struct RequestQueue {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    idle: Notify,
}

struct State {
    queued: VecDeque<Job>,
    running: usize,
    concurrency: usize,
    interval_cap: usize,
    interval: Duration,
    carryover: bool,
    window_start: Option<Instant>,
    window_count: usize,
    timer_armed: bool,
}

impl State {
    /// Start a new window if the current one has elapsed
    fn roll_window(&mut self, now: Instant) {
        let expired = self
            .window_start
            .is_none_or(|start| now >= start + self.interval);
        if expired {
            self.window_start = Some(now);
            self.window_count = if self.carryover { self.running } else { 0 };
        }
    }

    fn is_idle(&self) -> bool {
        self.running == 0 && self.queued.is_empty()
    }
}

impl RequestQueue {
    /// Create a queue with the given limits
    ///
    /// # Errors
    ///
    /// Returns a validation error if any limit is zero.
    pub fn new(limits: &RateLimitOptions) -> Result<Self, GeocodingError> {
        limits.validate().map_err(GeocodingError::validation)?;

        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    queued: VecDeque::new(),
                    running: 0,
                    concurrency: limits.concurrency,
                    interval_cap: limits.interval_cap,
                    interval: limits.interval(),
                    carryover: limits.carryover,
                    window_start: None,
                    window_count: 0,
                    timer_armed: false,
                }),
                idle: Notify::new(),
            }),
        })
    }

    /// Admit a task
    ///
    /// The returned handle resolves to the task's own output once the task
    /// has been started and has finished. Dropping the handle does not
    /// cancel the task.
    pub fn enqueue<F, Fut, T>(&self, task: F) -> QueueHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            Box::pin(async move {
                let output = task().await;
                // Receiver gone means the caller stopped waiting.
                let _ = tx.send(output);
            })
        });

        {
            let mut state = self.inner.state.lock();
            state.queued.push_back(job);
            trace!(queued = state.queued.len(), "Task admitted to queue");
        }

        Inner::drain(&self.inner);
        QueueHandle { rx }
    }

    /// Number of tasks waiting to start
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.state.lock().queued.len()
    }

    /// Number of tasks currently executing
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().running
    }

    /// Current in-flight cap
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.inner.state.lock().concurrency
    }

    /// Discard every task that has not started yet, returning how many were
    /// dropped
    ///
    /// Running tasks are unaffected. Handles of discarded tasks never
    /// resolve: a caller awaiting one is abandoned and must apply its own
    /// timeout if it needs to make progress.
    pub fn clear(&self) -> usize {
        let (dropped, idle) = {
            let mut state = self.inner.state.lock();
            let dropped = std::mem::take(&mut state.queued);
            (dropped, state.is_idle())
        };

        let count = dropped.len();
        drop(dropped);
        debug!(cleared = count, "Cleared geocoding queue");

        if idle {
            self.inner.idle.notify_waiters();
        }
        count
    }

    /// Change the in-flight cap for tasks that have not started yet
    ///
    /// Running tasks are never preempted; lowering the cap only delays
    /// further starts until enough of them finish.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `concurrency` is zero.
    pub fn set_concurrency(&self, concurrency: usize) -> Result<(), GeocodingError> {
        if concurrency == 0 {
            return Err(GeocodingError::validation(
                "concurrency must be greater than 0",
            ));
        }

        self.inner.state.lock().concurrency = concurrency;
        debug!(concurrency, "Updated queue concurrency");
        Inner::drain(&self.inner);
        Ok(())
    }

    /// Wait until no task is queued or running
    pub async fn on_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.state.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RequestQueue")
            .field("queued", &state.queued.len())
            .field("running", &state.running)
            .field("concurrency", &state.concurrency)
            .field("interval_cap", &state.interval_cap)
            .field("interval", &state.interval)
            .field("carryover", &state.carryover)
            .finish()
    }
}

impl Inner {
    /// Start as many queued tasks as the limits allow
    ///
    /// When only the interval cap blocks progress, arms a single timer that
    /// retries at the end of the current window.
    ///
    /// Tasks are spawned after the state lock is released: during runtime
    /// shutdown `tokio::spawn` drops the future in place, and the dropped
    /// [`RunningGuard`] re-enters [`Inner::finish`].
    fn drain(this: &Arc<Self>) {
        let mut admitted = Vec::new();
        let mut wake_at = None;

        {
            let mut state = this.state.lock();

            while !state.queued.is_empty() && state.running < state.concurrency {
                state.roll_window(Instant::now());

                if state.window_count >= state.interval_cap {
                    if !state.timer_armed {
                        if let Some(start) = state.window_start {
                            state.timer_armed = true;
                            wake_at = Some(start + state.interval);
                        }
                    }
                    break;
                }

                let Some(job) = state.queued.pop_front() else {
                    break;
                };
                state.running += 1;
                state.window_count += 1;
                admitted.push(job);
            }
        }

        if let Some(deadline) = wake_at {
            trace!(wait = ?deadline.saturating_duration_since(Instant::now()), "Interval cap reached");
            let inner = Arc::clone(this);
            tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                inner.state.lock().timer_armed = false;
                Self::drain(&inner);
            });
        }

        for job in admitted {
            let guard = RunningGuard(Arc::clone(this));
            tokio::spawn(async move {
                let _guard = guard;
                job().await;
            });
        }
    }

    /// Bookkeeping after a task finished (or panicked)
    fn finish(this: &Arc<Self>) {
        let idle = {
            let mut state = this.state.lock();
            state.running = state.running.saturating_sub(1);
            state.is_idle()
        };

        if idle {
            this.idle.notify_waiters();
        } else {
            Self::drain(this);
        }
    }
}

/// Releases a running slot when the task ends, even by panic
struct RunningGuard(Arc<Inner>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        Inner::finish(&self.0);
    }
}

/// Future resolving to the output of an enqueued task
///
/// Stays pending forever if the task was discarded by
/// [`RequestQueue::clear`] before it started, or if it panicked.
#[must_use = "a queue handle does nothing unless awaited"]
#[derive(Debug)]
pub struct QueueHandle<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for QueueHandle<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(output)) => Poll::Ready(output),
            // Sender dropped without a value: cleared or panicked.
            Poll::Ready(Err(_)) | Poll::Pending => Poll::Pending,
        }
    }
}

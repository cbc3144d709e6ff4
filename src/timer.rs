//! Timer driver abstraction: one-shot and periodic callbacks on top of the
//! host async runtime, matching the retry-with-timeout style
//! `elvis-core`'s ARP session uses `tokio::time::timeout`/`tokio::spawn` for.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub type TimerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Schedules one-shot callbacks after a delay. Implementations must allow a
/// scheduled callback to be cancelled before it fires.
pub trait TimerDriver: Send + Sync + 'static {
    /// Runs `task` after `delay` elapses. Returns a handle that cancels the
    /// callback if dropped or explicitly cancelled before it fires.
    fn schedule(&self, delay: Duration, task: TimerFuture) -> OneShotHandle;
}

/// A cancellable handle to a scheduled one-shot callback.
#[derive(Debug)]
pub struct OneShotHandle {
    join: JoinHandle<()>,
}

impl OneShotHandle {
    pub fn cancel(&self) {
        self.join.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.join.is_finished()
    }
}

impl TimerDriver for Arc<dyn TimerDriver> {
    fn schedule(&self, delay: Duration, task: TimerFuture) -> OneShotHandle {
        (**self).schedule(delay, task)
    }
}

/// The default [`TimerDriver`], backed by the Tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTimerDriver;

impl TimerDriver for TokioTimerDriver {
    fn schedule(&self, delay: Duration, task: TimerFuture) -> OneShotHandle {
        let join = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task.await;
        });
        OneShotHandle { join }
    }
}

/// A periodic "looping" driver: a task that reschedules itself on completion
/// until stopped. Represented, per the design note on timer-activity checks
/// being unreliable, as an explicit `running` flag plus a cancellable handle
/// rather than inferring liveness from the handle alone.
pub struct PeriodicTask {
    running: Arc<AtomicBool>,
    handle: std::sync::Mutex<Option<OneShotHandle>>,
}

impl PeriodicTask {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            handle: std::sync::Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the loop with the given period, calling `tick` (which returns
    /// the next period to wait, or `None` to stop) on every firing. A no-op
    /// if already running.
    pub fn start<D, F, Fut>(&self, driver: &D, period: Duration, mut tick: F)
    where
        D: TimerDriver + Clone + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Option<Duration>> + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let running = self.running.clone();
        let driver = driver.clone();
        let task: TimerFuture = Box::pin(async move {
            run_loop(driver, running, period, tick).await;
        });
        // The outer schedule delay is the initial period; `run_loop` handles
        // subsequent reschedules itself.
        let handle = TokioTimerDriverShim.schedule(Duration::ZERO, task);
        *self.handle.lock().unwrap() = Some(handle);

        async fn run_loop<D, F, Fut>(
            driver: D,
            running: Arc<AtomicBool>,
            mut period: Duration,
            mut tick: F,
        ) where
            D: TimerDriver + Clone + 'static,
            F: FnMut() -> Fut + Send + 'static,
            Fut: Future<Output = Option<Duration>> + Send + 'static,
        {
            loop {
                if !period.is_zero() {
                    tokio::time::sleep(period).await;
                }
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                match tick().await {
                    Some(next_period) => period = next_period,
                    None => {
                        running.store(false, Ordering::SeqCst);
                        return;
                    }
                }
            }
        }
    }

    /// Idempotent: stopping an already-stopped task is a no-op.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            if let Some(handle) = self.handle.lock().unwrap().take() {
                handle.cancel();
            }
        }
    }
}

impl Default for PeriodicTask {
    fn default() -> Self {
        Self::new()
    }
}

/// Thin helper used only to obtain a cancellable handle for the outer loop
/// task spawned by [`PeriodicTask::start`]; the loop body itself reschedules
/// with plain `tokio::time::sleep` so its period can change between ticks
/// (e.g. the bare-ack driver alternating between `BARE_ACK_TIMEOUT` and
/// `KEEP_ALIVE_TIMEOUT`).
#[derive(Clone, Copy)]
struct TokioTimerDriverShim;

impl TimerDriver for TokioTimerDriverShim {
    fn schedule(&self, delay: Duration, task: TimerFuture) -> OneShotHandle {
        TokioTimerDriver.schedule(delay, task)
    }
}

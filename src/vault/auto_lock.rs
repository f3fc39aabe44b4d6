//! Idle auto-lock
//!
//! `IdleTimer` tracks the last authenticated activity against a monotonic
//! clock. `AutoLockWatcher` runs a background thread that periodically asks
//! the context to check for expiry; it stops when told to or when dropped.

use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error};

/// Monotonic time source
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real monotonic clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Idle timer reset on every authenticated activity
pub struct IdleTimer {
    clock: Arc<dyn Clock>,
    timeout: Option<Duration>,
    last_activity: Instant,
}

impl IdleTimer {
    /// A timer that expires after `minutes` of idleness; 0 never expires
    pub fn new(clock: Arc<dyn Clock>, minutes: u32) -> Self {
        let last_activity = clock.now();
        Self {
            clock,
            timeout: timeout_for(minutes),
            last_activity,
        }
    }

    pub fn set_timeout_minutes(&mut self, minutes: u32) {
        self.timeout = timeout_for(minutes);
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Record activity now
    pub fn touch(&mut self) {
        self.last_activity = self.clock.now();
    }

    pub fn idle_for(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.last_activity)
    }

    pub fn is_expired(&self) -> bool {
        match self.timeout {
            Some(timeout) => self.idle_for() >= timeout,
            None => false,
        }
    }

    /// Time left before expiry, if auto-lock is on
    pub fn remaining(&self) -> Option<Duration> {
        self.timeout
            .map(|timeout| timeout.saturating_sub(self.idle_for()))
    }
}

fn timeout_for(minutes: u32) -> Option<Duration> {
    if minutes == 0 {
        None
    } else {
        Some(Duration::from_secs(u64::from(minutes) * 60))
    }
}

/// Something the watcher can ask to lock itself when idle
pub trait AutoLockTarget: Send {
    /// Lock if the idle timer has expired; returns whether a lock happened
    fn check_idle(&mut self) -> crate::error::HearthResult<bool>;
}

/// Background thread polling an [`AutoLockTarget`]
pub struct AutoLockWatcher {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl AutoLockWatcher {
    /// Start polling `target` every `interval`
    pub fn spawn<T>(target: Arc<Mutex<T>>, interval: Duration) -> Self
    where
        T: AutoLockTarget + 'static,
    {
        let (stop, stop_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    let mut guard = match target.lock() {
                        Ok(guard) => guard,
                        Err(_) => {
                            error!("Auto-lock target poisoned; stopping watcher");
                            return;
                        }
                    };
                    match guard.check_idle() {
                        Ok(true) => debug!("Auto-lock fired"),
                        Ok(false) => {}
                        Err(e) => error!(error = %e, "Auto-lock failed"),
                    }
                }
                // Stop requested or the watcher handle was dropped
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => return,
            }
        });

        Self {
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    /// Stop the thread and wait for it to exit
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for AutoLockWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Timer thread: periodic aggregate flush and wall-avoidance check.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::{debug, info};

use crate::config::MargaConfig;
use crate::navigation::NavigationUpdate;

use super::SharedNavigator;

/// Sleep granularity between deadline checks
const TICK: Duration = Duration::from_millis(20);

/// Timer thread state and logic.
pub struct TimerThread {
    navigator: SharedNavigator,
    updates: Sender<NavigationUpdate>,
    shutdown: Arc<AtomicBool>,
    flush_interval: Duration,
    correction_interval: Option<Duration>,
    last_flush: Instant,
    last_correction: Instant,
}

impl TimerThread {
    pub fn new(
        config: &MargaConfig,
        navigator: SharedNavigator,
        updates: Sender<NavigationUpdate>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let now = Instant::now();
        Self {
            navigator,
            updates,
            shutdown,
            flush_interval: config.fusion.flush_interval(),
            correction_interval: config
                .correction
                .enabled
                .then(|| config.correction.interval()),
            last_flush: now,
            last_correction: now,
        }
    }

    /// Run until shutdown.
    pub fn run(&mut self) {
        info!(
            "Timer thread started (flush every {:?}, correction every {:?})",
            self.flush_interval, self.correction_interval
        );

        while !self.shutdown.load(Ordering::SeqCst) {
            std::thread::sleep(TICK);

            if self.last_flush.elapsed() >= self.flush_interval {
                self.last_flush = Instant::now();
                self.navigator.lock().flush();
            }

            let correction_due = self
                .correction_interval
                .is_some_and(|interval| self.last_correction.elapsed() >= interval);
            if correction_due {
                self.last_correction = Instant::now();
                let updates = self.navigator.lock().wall_check();
                for update in updates {
                    if self.updates.send(update).is_err() {
                        debug!("No update listener");
                        break;
                    }
                }
            }
        }

        info!("Timer thread shutting down");
    }
}

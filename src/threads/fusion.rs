//! Fusion thread: applies producer events to the navigator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::navigation::{NavigationUpdate, SensorEvent};

use super::SharedNavigator;

/// How long to block on the event channel before re-checking shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Fusion thread state and logic.
pub struct FusionThread {
    navigator: SharedNavigator,
    events: Receiver<SensorEvent>,
    updates: Sender<NavigationUpdate>,
    shutdown: Arc<AtomicBool>,
    events_handled: u64,
}

impl FusionThread {
    pub fn new(
        navigator: SharedNavigator,
        events: Receiver<SensorEvent>,
        updates: Sender<NavigationUpdate>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            navigator,
            events,
            updates,
            shutdown,
            events_handled: 0,
        }
    }

    /// Run until shutdown or until every producer has hung up.
    pub fn run(&mut self) {
        info!("Fusion thread started");

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                // Drain what producers already queued
                while let Ok(event) = self.events.try_recv() {
                    self.dispatch(event);
                }
                info!("Fusion thread shutting down");
                break;
            }

            match self.events.recv_timeout(POLL_INTERVAL) {
                Ok(event) => self.dispatch(event),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Event channel closed, fusion thread exiting");
                    break;
                }
            }
        }

        info!("Fusion thread handled {} events", self.events_handled);
    }

    fn dispatch(&mut self, event: SensorEvent) {
        self.events_handled += 1;

        let result = self.navigator.lock().handle(event);
        match result {
            Ok(updates) => self.publish(updates),
            Err(e) => warn!("Event rejected: {}", e),
        }
    }

    fn publish(&self, updates: Vec<NavigationUpdate>) {
        for update in updates {
            if self.updates.send(update).is_err() {
                debug!("No update listener");
                return;
            }
        }
    }
}

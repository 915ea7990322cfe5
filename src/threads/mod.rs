//! Runtime threads around the navigation core.
//!
//! Two threads share one [`Navigator`] behind a mutex:
//! - Fusion thread: drains the producer event channel and publishes updates
//! - Timer thread: flushes the observation aggregate and runs the
//!   wall-avoidance check on their own periods
//!
//! Every state change happens under the navigator lock, so a locate-and-fuse
//! cycle never interleaves with a prediction or a correction.

mod fusion;
mod timer;

pub use fusion::FusionThread;
pub use timer::TimerThread;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::error;

use crate::config::MargaConfig;
use crate::error::{MargaError, Result};
use crate::navigation::{NavigationUpdate, Navigator, SensorEvent};

/// Navigator shared between the runtime threads
pub type SharedNavigator = Arc<Mutex<Navigator>>;

/// Bound on queued producer events
const EVENT_QUEUE_DEPTH: usize = 256;

/// Thread handles and channel endpoints of a running system.
pub struct RuntimeHandles {
    pub fusion: JoinHandle<()>,
    pub timer: JoinHandle<()>,
    /// Producer side of the event channel
    pub events: Sender<SensorEvent>,
    /// Published navigation updates
    pub updates: Receiver<NavigationUpdate>,
    /// Direct access for status queries
    pub navigator: SharedNavigator,
    shutdown: Arc<AtomicBool>,
}

impl RuntimeHandles {
    /// Ask both threads to stop. Queued events are still processed.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Signal shutdown and wait for both threads.
    pub fn join(self) -> Result<()> {
        self.shutdown();
        drop(self.events);

        let mut failed = Vec::new();
        if self.fusion.join().is_err() {
            error!("Fusion thread panicked");
            failed.push("fusion");
        }
        if self.timer.join().is_err() {
            error!("Timer thread panicked");
            failed.push("timer");
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(MargaError::Thread(format!("{} panicked", failed.join(", "))))
        }
    }
}

/// Spawn the runtime threads around `navigator`.
///
/// `shutdown` is shared with the caller (e.g. a Ctrl-C handler).
pub fn spawn_runtime(
    config: &MargaConfig,
    navigator: Navigator,
    shutdown: Arc<AtomicBool>,
) -> Result<RuntimeHandles> {
    // Bounded so a stalled core applies back-pressure to producers
    let (event_tx, event_rx) = crossbeam_channel::bounded::<SensorEvent>(EVENT_QUEUE_DEPTH);
    let (update_tx, update_rx) = crossbeam_channel::unbounded::<NavigationUpdate>();

    let navigator: SharedNavigator = Arc::new(Mutex::new(navigator));

    let fusion_navigator = Arc::clone(&navigator);
    let fusion_shutdown = Arc::clone(&shutdown);
    let fusion_updates = update_tx.clone();
    let fusion = thread::Builder::new()
        .name("fusion".into())
        .spawn(move || {
            let mut fusion_thread =
                FusionThread::new(fusion_navigator, event_rx, fusion_updates, fusion_shutdown);
            fusion_thread.run();
        })
        .map_err(|e| MargaError::Thread(format!("failed to spawn fusion thread: {}", e)))?;

    let timer_navigator = Arc::clone(&navigator);
    let timer_shutdown = Arc::clone(&shutdown);
    let timer_config = config.clone();
    let timer = thread::Builder::new()
        .name("timer".into())
        .spawn(move || {
            let mut timer_thread =
                TimerThread::new(&timer_config, timer_navigator, update_tx, timer_shutdown);
            timer_thread.run();
        })
        .map_err(|e| MargaError::Thread(format!("failed to spawn timer thread: {}", e)))?;

    Ok(RuntimeHandles {
        fusion,
        timer,
        events: event_tx,
        updates: update_rx,
        navigator,
        shutdown,
    })
}

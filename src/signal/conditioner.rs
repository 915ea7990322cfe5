//! Per-beacon adaptive RSSI filter.
//!
//! Each beacon runs a scalar Kalman filter whose measurement noise is raised
//! for a single step when the new reading jumps sharply out of an otherwise
//! quiet history (a multipath spike), followed by a short moving average.

use crate::config::SignalConfig;
use crate::fingerprint::BeaconId;
use std::collections::{HashMap, VecDeque};
use tracing::trace;

/// Filter state for one beacon.
#[derive(Clone, Debug)]
pub struct BeaconFilter {
    /// Smoothed Kalman estimate, `None` until the first reading
    predicted: Option<f32>,
    /// Running error covariance
    error_cov: f32,
    /// Previous raw reading
    previous: f32,
    /// Recent absolute deltas between consecutive raw readings
    deltas: VecDeque<f32>,
    /// Recent Kalman outputs for the moving average
    window: VecDeque<f32>,
}

impl BeaconFilter {
    /// Covariance the filter is seeded with
    const INITIAL_COVARIANCE: f32 = 1.0;

    pub fn new(config: &SignalConfig) -> Self {
        Self {
            predicted: None,
            error_cov: 0.0,
            previous: 0.0,
            deltas: VecDeque::with_capacity(config.delta_window),
            window: VecDeque::with_capacity(config.average_window),
        }
    }

    /// Feed one raw reading and return the smoothed value.
    pub fn filter(&mut self, config: &SignalConfig, raw: f32) -> f32 {
        let (prior, prior_cov, noise) = match self.predicted {
            None => {
                self.previous = raw;
                (raw, Self::INITIAL_COVARIANCE, config.baseline_noise)
            }
            Some(predicted) => {
                let prior_cov = self.error_cov + config.process_noise;

                let delta = (raw - self.previous).abs();
                if self.deltas.len() == config.delta_window {
                    self.deltas.pop_front();
                }
                self.deltas.push_back(delta);
                let delta_mean = self.deltas.iter().sum::<f32>() / self.deltas.len() as f32;

                let spike = delta > config.spike_threshold && delta_mean < config.quiet_threshold;
                if spike {
                    trace!(
                        "[Signal] spike: delta={:.1} mean={:.2} raw={:.1}",
                        delta, delta_mean, raw
                    );
                }
                self.previous = raw;

                let noise = if spike {
                    config.spike_noise
                } else {
                    config.baseline_noise
                };
                (predicted, prior_cov, noise)
            }
        };

        let gain = prior_cov / (prior_cov + noise);
        let predicted = prior + gain * (raw - prior);
        self.error_cov = (1.0 - gain) * prior_cov;
        self.predicted = Some(predicted);

        if self.window.len() == config.average_window {
            self.window.pop_front();
        }
        self.window.push_back(predicted);
        self.window.iter().sum::<f32>() / self.window.len() as f32
    }

    /// Current error covariance
    pub fn error_covariance(&self) -> f32 {
        self.error_cov
    }
}

/// Independent adaptive filters keyed by beacon id.
#[derive(Clone, Debug)]
pub struct SignalConditioner {
    config: SignalConfig,
    filters: HashMap<BeaconId, BeaconFilter>,
}

impl SignalConditioner {
    /// Create a conditioner with no pre-registered beacons.
    pub fn new(config: SignalConfig) -> Self {
        Self {
            config,
            filters: HashMap::new(),
        }
    }

    /// Create a conditioner with a filter for every beacon in the roster.
    pub fn with_roster<'a>(config: SignalConfig, roster: impl IntoIterator<Item = &'a BeaconId>) -> Self {
        let filters = roster
            .into_iter()
            .map(|id| (id.clone(), BeaconFilter::new(&config)))
            .collect();
        Self { config, filters }
    }

    /// Filter one raw reading. Unknown ids get a fresh filter.
    pub fn filter(&mut self, id: &BeaconId, raw: f32) -> f32 {
        let config = &self.config;
        let filter = self
            .filters
            .entry(id.clone())
            .or_insert_with(|| BeaconFilter::new(config));
        filter.filter(config, raw)
    }

    /// Number of beacons with filter state
    pub fn beacon_count(&self) -> usize {
        self.filters.len()
    }

    /// Filter state of one beacon
    pub fn get(&self, id: &BeaconId) -> Option<&BeaconFilter> {
        self.filters.get(id)
    }
}

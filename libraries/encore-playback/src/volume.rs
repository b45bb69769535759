//! Session volume with click-free ramping
//!
//! Volume is a 0-200 percentage. Changes ramp the sink gain linearly over a
//! fixed number of discrete steps on a timer instead of jumping instantly;
//! a ramp in progress is cancelled and replaced by a new request.

use crate::error::{PlayerError, Result};
use crate::sink::{percent_to_gain, AudioSink};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// Maximum accepted volume percentage
pub const MAX_VOLUME: u16 = 200;

/// Volume state for one session
pub struct VolumeControl {
    level: Mutex<u16>,
    ramp: Mutex<Option<JoinHandle<()>>>,
    steps: u32,
    interval: Duration,
}

impl VolumeControl {
    /// Create a control at `initial` percent
    ///
    /// Out-of-range initial values are clamped rather than rejected so a
    /// misconfigured default cannot prevent session creation.
    pub fn new(initial: u16, steps: u32, interval: Duration) -> Self {
        Self {
            level: Mutex::new(initial.min(MAX_VOLUME)),
            ramp: Mutex::new(None),
            steps: steps.max(1),
            interval,
        }
    }

    /// Current volume percentage
    pub fn level(&self) -> u16 {
        *self.level.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Linear gain for the current level
    pub fn gain(&self) -> f32 {
        percent_to_gain(self.level())
    }

    /// Ramp the sink towards `target` percent
    ///
    /// Rejects values above [`MAX_VOLUME`] leaving the current volume
    /// unchanged. Returns the previous level on success. The stored level
    /// updates immediately; only the audible gain ramps.
    pub fn set(&self, target: u16, sink: Arc<dyn AudioSink>) -> Result<u16> {
        if target > MAX_VOLUME {
            return Err(PlayerError::InvalidVolume(target));
        }

        let previous = {
            let mut level = self.level.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *level, target)
        };

        let from = percent_to_gain(previous);
        let to = percent_to_gain(target);
        let steps = self.steps;
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it so each step
            // lands one interval apart
            ticker.tick().await;

            for step in 1..=steps {
                ticker.tick().await;
                let fraction = step as f32 / steps as f32;
                let gain = from + (to - from) * fraction;
                trace!(gain, "volume ramp step");
                sink.set_gain(gain);
            }
        });

        let mut ramp = self.ramp.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = ramp.replace(handle) {
            old.abort();
        }

        Ok(previous)
    }

    /// Cancel any in-flight ramp
    pub fn cancel(&self) {
        let mut ramp = self.ramp.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = ramp.take() {
            old.abort();
        }
    }
}

impl Drop for VolumeControl {
    fn drop(&mut self) {
        self.cancel();
    }
}

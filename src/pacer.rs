// Copyright 2024 the phosphene-stream contributors
// SPDX-License-Identifier: MPL-2.0

use std::time::{Duration, Instant};

use crate::{Result, StreamError};

/// Time between frames at `fps`. Fails unless `fps` is positive, finite and
/// slow enough to still fit a [`Duration`].
pub fn frame_interval(fps: f64) -> Result<Duration> {
    if !(fps.is_finite() && fps > 0.0) {
        return Err(StreamError::InvalidParams(format!(
            "fps must be positive, got {fps}"
        )));
    }
    return Duration::try_from_secs_f64(1.0 / fps).map_err(|_| {
        StreamError::InvalidParams(format!("fps {fps} gives a frame interval that is too long"))
    });
}

/// Gate that opens at most once per frame interval, measured from the
/// last time it opened. It never blocks; the caller decides how to idle.
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Pacer {
        return Pacer {
            interval: interval,
            last: None,
        };
    }

    pub fn from_fps(fps: f64) -> Result<Pacer> {
        return Ok(Pacer::new(frame_interval(fps)?));
    }

    pub fn interval(&self) -> Duration {
        return self.interval;
    }

    /// Opens immediately the first time, then once `interval` has passed
    /// since it last opened. Opening restarts the interval from `now`.
    pub fn ready_at(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last = Some(now);
        return true;
    }

    pub fn ready(&mut self) -> bool {
        return self.ready_at(Instant::now());
    }

    /// Time left until the gate opens, zero if it would open now.
    pub fn remaining_at(&self, now: Instant) -> Duration {
        return match self.last {
            None => Duration::ZERO,
            Some(last) => self
                .interval
                .saturating_sub(now.saturating_duration_since(last)),
        };
    }
}

// Copyright 2024 the phosphene-stream contributors
// SPDX-License-Identifier: MPL-2.0

use std::fmt;
use std::str::FromStr;

use crate::pacer;
use crate::{Result, StreamError, CHUNK_SIZE};

/// Largest payload a single UDP dgram can carry over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65507;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Resolution {
        return Resolution {
            width: width,
            height: height,
        };
    }

    /// Bytes in one grayscale frame at this resolution.
    pub fn frame_len(&self) -> usize {
        return self.width as usize * self.height as usize;
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}x{}", self.width, self.height);
    }
}

impl FromStr for Resolution {
    type Err = StreamError;

    /// Parses `WIDTHxHEIGHT`, e.g. `256x256`.
    fn from_str(s: &str) -> Result<Resolution> {
        let bad = || StreamError::InvalidParams(format!("{s:?} is not WIDTHxHEIGHT"));
        let (width, height) = s.split_once(['x', 'X']).ok_or_else(bad)?;
        let width = width.trim().parse().map_err(|_| bad())?;
        let height = height.trim().parse().map_err(|_| bad())?;
        return Ok(Resolution::new(width, height));
    }
}

/// Knobs for the built-in Gaussian phosphene simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorParams {
    /// Roughly how many phosphenes to lay out. The grid is square-ish, so
    /// the actual count can differ slightly.
    pub phosphenes: u32,
    /// Phosphene spread in processing-resolution pixels.
    pub sigma: f32,
    /// Stimulation below this (after rescaling) leaves a phosphene dark.
    pub threshold: f32,
    /// Scale stimulation so the strongest phosphene is at 1.0.
    pub rescale: bool,
}

impl Default for SimulatorParams {
    fn default() -> SimulatorParams {
        return SimulatorParams {
            phosphenes: 1024,
            sigma: 2.0,
            threshold: 0.2,
            rescale: true,
        };
    }
}

/// Everything the pipeline needs, fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineParams {
    /// Size of frames on the wire, both directions.
    pub frame: Resolution,
    /// Size the filter and simulator work at.
    pub processing: Resolution,
    pub fps: f64,
    pub chunk_size: usize,
    pub filter: String,
    pub simulator: SimulatorParams,
}

impl PipelineParams {
    pub fn new(frame: Resolution) -> PipelineParams {
        return PipelineParams {
            frame: frame,
            processing: Resolution::new(256, 256),
            fps: 30.0,
            chunk_size: CHUNK_SIZE,
            filter: "canny-200".to_string(),
            simulator: SimulatorParams::default(),
        };
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame.frame_len() == 0 {
            return Err(StreamError::InvalidParams(format!(
                "frame resolution {} is empty",
                self.frame
            )));
        }
        if self.processing.frame_len() == 0 {
            return Err(StreamError::InvalidParams(format!(
                "processing resolution {} is empty",
                self.processing
            )));
        }
        pacer::frame_interval(self.fps)?;
        if self.chunk_size == 0 || self.chunk_size > MAX_DATAGRAM_SIZE {
            return Err(StreamError::InvalidParams(format!(
                "chunk size must be between 1 and {MAX_DATAGRAM_SIZE}, got {}",
                self.chunk_size
            )));
        }
        if self.simulator.phosphenes == 0 || !(self.simulator.sigma > 0.0) {
            return Err(StreamError::InvalidParams(
                "simulator needs at least one phosphene and a positive sigma".to_string(),
            ));
        }
        if self.simulator.phosphenes as usize > self.processing.frame_len() {
            return Err(StreamError::InvalidParams(format!(
                "{} phosphenes don't fit in {} pixels at {}",
                self.simulator.phosphenes,
                self.processing.frame_len(),
                self.processing
            )));
        }
        return Ok(());
    }
}

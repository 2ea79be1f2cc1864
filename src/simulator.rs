// Copyright 2024 the phosphene-stream contributors
// SPDX-License-Identifier: MPL-2.0

//! Phosphene simulation. The pipeline only relies on the [`Simulator`]
//! trait; [`GaussianSimulator`] is a small stand-in so the service runs
//! without a cortex model behind it.

use image::{GrayImage, Luma};

use crate::params::{Resolution, SimulatorParams};
use crate::{Result, StreamError};

/// Per-phosphene stimulation, each in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct StimulationPattern(pub Vec<f32>);

impl StimulationPattern {
    pub fn active(&self) -> usize {
        return self.0.iter().filter(|s| **s > 0.0).count();
    }
}

pub trait Simulator: Send {
    /// Turns a filtered frame into a stimulation pattern.
    fn sample(&self, processed: &GrayImage) -> Result<StimulationPattern>;

    /// Renders a stimulation pattern into an 8-bit image.
    fn render(&self, stimulation: &StimulationPattern) -> Result<GrayImage>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Phosphene {
    x: f32,
    y: f32,
}

/// Phosphenes on a regular grid, each drawn as a Gaussian blob.
pub struct GaussianSimulator {
    resolution: Resolution,
    params: SimulatorParams,
    phosphenes: Vec<Phosphene>,
}

impl GaussianSimulator {
    pub fn new(resolution: Resolution, params: SimulatorParams) -> Result<GaussianSimulator> {
        let bad = || {
            StreamError::InvalidParams(format!(
                "can't simulate {} phosphenes at {resolution} with sigma {}",
                params.phosphenes, params.sigma
            ))
        };
        if resolution.frame_len() == 0
            || params.phosphenes == 0
            || params.phosphenes as usize > resolution.frame_len()
            || !(params.sigma > 0.0)
        {
            return Err(bad());
        }

        // Keep the grid roughly as square as the image.
        let aspect = resolution.width as f32 / resolution.height as f32;
        let columns = ((params.phosphenes as f32 * aspect).sqrt().round() as usize).max(1);
        let rows = ((params.phosphenes as f32 / columns as f32).round() as usize).max(1);
        let count = columns.checked_mul(rows).ok_or_else(bad)?;
        let step_x = resolution.width as f32 / columns as f32;
        let step_y = resolution.height as f32 / rows as f32;

        let mut phosphenes = Vec::with_capacity(count);
        for row in 0..rows {
            for column in 0..columns {
                phosphenes.push(Phosphene {
                    x: (column as f32 + 0.5) * step_x,
                    y: (row as f32 + 0.5) * step_y,
                });
            }
        }

        return Ok(GaussianSimulator {
            resolution: resolution,
            params: params,
            phosphenes: phosphenes,
        });
    }

    pub fn phosphene_count(&self) -> usize {
        return self.phosphenes.len();
    }

    /// Half-width of the square each phosphene reads from and draws into.
    fn radius(&self) -> i64 {
        return (self.params.sigma * 3.0).ceil() as i64;
    }

    fn footprint(&self, phosphene: &Phosphene) -> (u32, u32, u32, u32) {
        let r = self.radius();
        let (cx, cy) = (phosphene.x as i64, phosphene.y as i64);
        let clamp_x = |v: i64| v.clamp(0, self.resolution.width as i64 - 1) as u32;
        let clamp_y = |v: i64| v.clamp(0, self.resolution.height as i64 - 1) as u32;
        return (clamp_x(cx - r), clamp_y(cy - r), clamp_x(cx + r), clamp_y(cy + r));
    }
}

impl Simulator for GaussianSimulator {
    fn sample(&self, processed: &GrayImage) -> Result<StimulationPattern> {
        if processed.width() != self.resolution.width
            || processed.height() != self.resolution.height
        {
            return Err(StreamError::Simulator(format!(
                "expected a {} image, got {}x{}",
                self.resolution,
                processed.width(),
                processed.height()
            )));
        }

        let mut stimulation: Vec<f32> = self
            .phosphenes
            .iter()
            .map(|phosphene| {
                let (x0, y0, x1, y1) = self.footprint(phosphene);
                let mut sum = 0f32;
                let mut count = 0u32;
                for y in y0..=y1 {
                    for x in x0..=x1 {
                        sum += processed.get_pixel(x, y).0[0] as f32;
                        count += 1;
                    }
                }
                sum / (count as f32 * 255.0)
            })
            .collect();

        if self.params.rescale {
            let peak = stimulation.iter().cloned().fold(0f32, f32::max);
            if peak > 0.0 {
                stimulation.iter_mut().for_each(|s| *s /= peak);
            }
        }
        for s in stimulation.iter_mut() {
            if *s < self.params.threshold {
                *s = 0.0;
            }
        }
        return Ok(StimulationPattern(stimulation));
    }

    fn render(&self, stimulation: &StimulationPattern) -> Result<GrayImage> {
        if stimulation.0.len() != self.phosphenes.len() {
            return Err(StreamError::Simulator(format!(
                "stimulation has {} entries for {} phosphenes",
                stimulation.0.len(),
                self.phosphenes.len()
            )));
        }

        let (width, height) = (self.resolution.width, self.resolution.height);
        let mut intensity = vec![0f32; self.resolution.frame_len()];
        let two_sigma_sq = 2.0 * self.params.sigma * self.params.sigma;
        for (phosphene, strength) in self.phosphenes.iter().zip(&stimulation.0) {
            if *strength <= 0.0 {
                continue;
            }
            let (x0, y0, x1, y1) = self.footprint(phosphene);
            for y in y0..=y1 {
                for x in x0..=x1 {
                    let dx = x as f32 + 0.5 - phosphene.x;
                    let dy = y as f32 + 0.5 - phosphene.y;
                    intensity[(y * width + x) as usize] +=
                        strength * (-(dx * dx + dy * dy) / two_sigma_sq).exp();
                }
            }
        }

        return Ok(GrayImage::from_fn(width, height, |x, y| {
            let value = intensity[(y * width + x) as usize].clamp(0.0, 1.0);
            Luma([(value * 255.0).round() as u8])
        }));
    }
}

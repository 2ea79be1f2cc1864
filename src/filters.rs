// Copyright 2024 the phosphene-stream contributors
// SPDX-License-Identifier: MPL-2.0

//! Image filters applied before phosphene sampling, picked by name at
//! startup.

use image::{imageops, GrayImage, Luma};
use log::trace;

use crate::params::PipelineParams;
use crate::{Result, StreamError};

/// Sigma OpenCV derives for a 3x3 Gaussian kernel.
const PRE_BLUR_SIGMA: f32 = 0.8;

pub trait Filter: Send {
    fn name(&self) -> &'static str;

    /// Takes a grayscale frame at processing resolution and returns one of
    /// the same size.
    fn process(&self, frame: &GrayImage, params: &PipelineParams) -> Result<GrayImage>;
}

struct Entry {
    name: &'static str,
    build: fn() -> Box<dyn Filter>,
}

fn passthrough() -> Box<dyn Filter> {
    return Box::new(Passthrough);
}

fn sobel() -> Box<dyn Filter> {
    return Box::new(Sobel);
}

fn canny_100() -> Box<dyn Filter> {
    return Box::new(Canny::new("canny-100", 100.0));
}

fn canny_200() -> Box<dyn Filter> {
    return Box::new(Canny::new("canny-200", 200.0));
}

const REGISTRY: &[Entry] = &[
    Entry {
        name: "none",
        build: passthrough,
    },
    Entry {
        name: "sobel",
        build: sobel,
    },
    Entry {
        name: "canny-100",
        build: canny_100,
    },
    Entry {
        name: "canny-200",
        build: canny_200,
    },
];

pub fn names() -> Vec<&'static str> {
    return REGISTRY.iter().map(|entry| entry.name).collect();
}

pub fn lookup(name: &str) -> Result<Box<dyn Filter>> {
    return match REGISTRY.iter().find(|entry| entry.name == name) {
        Some(entry) => Ok((entry.build)()),
        None => Err(StreamError::UnknownFilter {
            name: name.to_string(),
            known: names().join(", "),
        }),
    };
}

fn pre_blur(filter: &'static str, frame: &GrayImage) -> Result<GrayImage> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(StreamError::Filter {
            filter: filter,
            reason: "empty frame".to_string(),
        });
    }
    return Ok(imageops::blur(frame, PRE_BLUR_SIGMA));
}

/// Blur only.
pub struct Passthrough;

impl Filter for Passthrough {
    fn name(&self) -> &'static str {
        return "none";
    }

    fn process(&self, frame: &GrayImage, _params: &PipelineParams) -> Result<GrayImage> {
        return pre_blur(self.name(), frame);
    }
}

/// Horizontal and vertical 3x3 Sobel responses, edges replicated.
fn sobel_gradients(img: &GrayImage) -> (Vec<f32>, Vec<f32>) {
    let (width, height) = (img.width() as i64, img.height() as i64);
    let px = |x: i64, y: i64| -> f32 {
        let x = x.clamp(0, width - 1) as u32;
        let y = y.clamp(0, height - 1) as u32;
        img.get_pixel(x, y).0[0] as f32
    };

    let mut gx = Vec::with_capacity((width * height) as usize);
    let mut gy = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let dx = (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x - 1, y) + px(x - 1, y + 1));
            let dy = (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x, y - 1) + px(x + 1, y - 1));
            gx.push(dx);
            gy.push(dy);
        }
    }
    return (gx, gy);
}

/// Blurred Sobel gradient magnitude, clamped to 8 bits.
pub struct Sobel;

impl Filter for Sobel {
    fn name(&self) -> &'static str {
        return "sobel";
    }

    fn process(&self, frame: &GrayImage, _params: &PipelineParams) -> Result<GrayImage> {
        let blurred = pre_blur(self.name(), frame)?;
        let (gx, gy) = sobel_gradients(&blurred);
        let width = blurred.width();
        return Ok(GrayImage::from_fn(width, blurred.height(), |x, y| {
            let i = (y * width + x) as usize;
            let magnitude = (gx[i] * gx[i] + gy[i] * gy[i]).sqrt();
            Luma([magnitude.min(255.0) as u8])
        }));
    }
}

/// Canny edge detector: Sobel gradients with L1 magnitude, non-maximum
/// suppression, then hysteresis between `high / 2` and `high`. Edges come
/// out as 255, everything else as 0.
pub struct Canny {
    name: &'static str,
    high: f32,
}

impl Canny {
    pub fn new(name: &'static str, high: f32) -> Canny {
        return Canny {
            name: name,
            high: high,
        };
    }

    fn suppress(&self, gx: &[f32], gy: &[f32], width: usize, height: usize) -> Vec<f32> {
        let magnitude: Vec<f32> = gx.iter().zip(gy).map(|(x, y)| x.abs() + y.abs()).collect();
        let mut thin = vec![0f32; magnitude.len()];

        for y in 1..height.saturating_sub(1) {
            for x in 1..width.saturating_sub(1) {
                let i = y * width + x;
                let m = magnitude[i];
                if m == 0.0 {
                    continue;
                }
                // Quantize the gradient direction to one of four axes and
                // compare against the two neighbours along it.
                let angle = gy[i].atan2(gx[i]).to_degrees().rem_euclid(180.0);
                let (a, b) = if !(22.5..157.5).contains(&angle) {
                    (i - 1, i + 1)
                } else if angle < 67.5 {
                    (i - width - 1, i + width + 1)
                } else if angle < 112.5 {
                    (i - width, i + width)
                } else {
                    (i - width + 1, i + width - 1)
                };
                if m >= magnitude[a] && m >= magnitude[b] {
                    thin[i] = m;
                }
            }
        }
        return thin;
    }

    fn hysteresis(&self, thin: &[f32], width: usize, height: usize) -> Vec<u8> {
        let low = self.high / 2.0;
        let mut edges = vec![0u8; thin.len()];
        let mut stack: Vec<usize> = thin
            .iter()
            .enumerate()
            .filter(|(_, m)| **m >= self.high)
            .map(|(i, _)| i)
            .collect();
        for &i in &stack {
            edges[i] = 255;
        }

        while let Some(i) = stack.pop() {
            let (x, y) = ((i % width) as i64, (i / width) as i64);
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let (nx, ny) = (x + dx, y + dy);
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }
                    let n = ny as usize * width + nx as usize;
                    if edges[n] == 0 && thin[n] >= low {
                        edges[n] = 255;
                        stack.push(n);
                    }
                }
            }
        }
        return edges;
    }
}

impl Filter for Canny {
    fn name(&self) -> &'static str {
        return self.name;
    }

    fn process(&self, frame: &GrayImage, _params: &PipelineParams) -> Result<GrayImage> {
        let blurred = pre_blur(self.name, frame)?;
        let (width, height) = (blurred.width() as usize, blurred.height() as usize);
        let (gx, gy) = sobel_gradients(&blurred);
        let thin = self.suppress(&gx, &gy, width, height);
        let edges = self.hysteresis(&thin, width, height);
        trace!(
            "{}: {} edge pixels",
            self.name,
            edges.iter().filter(|p| **p != 0).count()
        );
        return GrayImage::from_raw(blurred.width(), blurred.height(), edges).ok_or(
            StreamError::Filter {
                filter: self.name,
                reason: "edge map has the wrong size".to_string(),
            },
        );
    }
}

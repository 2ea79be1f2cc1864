// Copyright 2024 the phosphene-stream contributors
// SPDX-License-Identifier: MPL-2.0

use std::thread;
use std::time::{Duration, Instant};

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma};
use log::{debug, error, info, warn};

use crate::double_buffer::FrameReader;
use crate::filters::Filter;
use crate::pacer::Pacer;
use crate::params::PipelineParams;
use crate::sender::ChunkedSender;
use crate::shutdown::{ReadyLatch, ShutdownSignal};
use crate::simulator::Simulator;
use crate::sockets::DatagramSink;
use crate::{Result, StreamError};

/// Longest the main loop naps while the pacer is closed.
const MAX_IDLE: Duration = Duration::from_millis(1);

/// How often the main loop looks at shutdown while waiting for the first
/// frame.
const READY_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames processed and sent.
    pub processed: u64,
    /// Frames the filter or simulator rejected.
    pub skipped: u64,
    pub processing_time: Duration,
    pub send_time: Duration,
}

impl PipelineStats {
    pub fn mean_processing_time(&self) -> Duration {
        return mean(self.processing_time, self.processed + self.skipped);
    }

    pub fn mean_send_time(&self) -> Duration {
        return mean(self.send_time, self.processed);
    }
}

fn mean(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    return total / count.min(u32::MAX as u64) as u32;
}

/// Foreground half of the service: latest frame in, phosphene frame out,
/// no faster than the pacer allows.
pub struct Pipeline<W> {
    params: PipelineParams,
    filter: Box<dyn Filter>,
    simulator: Box<dyn Simulator>,
    sender: ChunkedSender<W>,
    stats: PipelineStats,
}

impl<W: DatagramSink> Pipeline<W> {
    pub fn new(
        params: PipelineParams,
        filter: Box<dyn Filter>,
        simulator: Box<dyn Simulator>,
        sender: ChunkedSender<W>,
    ) -> Pipeline<W> {
        return Pipeline {
            params: params,
            filter: filter,
            simulator: simulator,
            sender: sender,
            stats: PipelineStats::default(),
        };
    }

    pub fn stats(&self) -> PipelineStats {
        return self.stats;
    }

    pub fn sender(&self) -> &ChunkedSender<W> {
        return &self.sender;
    }

    /// Reads the latest frame and turns it into an outbound phosphene
    /// frame at the wire resolution. The read is released as soon as the
    /// frame has been resampled, so the receive loop can keep swapping
    /// while the filter and simulator run.
    pub fn process_frame(&mut self, reader: &mut FrameReader) -> Result<Vec<u8>> {
        let (width, height) = (reader.width(), reader.height());
        let processing = self.params.processing;

        let handle = reader.acquire_read();
        let view = ImageBuffer::<Luma<u8>, &[u8]>::from_raw(width, height, &handle[..]).ok_or(
            StreamError::FrameSize {
                expected: width as usize * height as usize,
                got: handle.len(),
            },
        )?;
        let small: GrayImage = imageops::resize(
            &view,
            processing.width,
            processing.height,
            FilterType::Triangle,
        );
        handle.release_read();

        let filtered = self.filter.process(&small, &self.params)?;
        let stimulation = self.simulator.sample(&filtered)?;
        let rendered = self.simulator.render(&stimulation)?;
        debug!("{} phosphenes active", stimulation.active());

        let frame = self.params.frame;
        let out = imageops::resize(&rendered, frame.width, frame.height, FilterType::Triangle);
        return Ok(out.into_raw());
    }

    /// One paced iteration. A frame the filter or simulator can't handle
    /// is skipped; only a failed send is returned as an error.
    pub fn step(&mut self, reader: &mut FrameReader) -> Result<()> {
        let started = Instant::now();
        let out = match self.process_frame(reader) {
            Ok(out) => out,
            Err(e) => {
                warn!("Skipping frame: {e}");
                self.stats.skipped += 1;
                self.stats.processing_time += started.elapsed();
                return Ok(());
            }
        };
        let processed_at = Instant::now();
        self.stats.processing_time += processed_at - started;

        let chunks = self.sender.send(&out)?;
        self.stats.send_time += processed_at.elapsed();
        self.stats.processed += 1;
        debug!("Sent frame {} in {chunks} chunks", self.stats.processed);
        return Ok(());
    }

    /// Waits for the first frame, then processes frames at the pacer's
    /// rate until shutdown is requested or sending fails.
    pub fn run(
        &mut self,
        reader: &mut FrameReader,
        pacer: &mut Pacer,
        shutdown: &ShutdownSignal,
        ready: &ReadyLatch,
    ) -> PipelineStats {
        let mut state = LoopState::Idle;
        loop {
            state = match state {
                LoopState::Idle => {
                    if ready.wait_until_ready(shutdown, READY_POLL) {
                        info!("Processing at up to {:.1} fps", self.params.fps);
                        LoopState::Running
                    } else {
                        LoopState::Stopped
                    }
                }
                LoopState::Running => self.tick(reader, pacer, shutdown),
                LoopState::Stopped => break,
            };
        }
        info!("Main loop stopped after {} frames", self.stats.processed);
        return self.stats;
    }

    fn tick(
        &mut self,
        reader: &mut FrameReader,
        pacer: &mut Pacer,
        shutdown: &ShutdownSignal,
    ) -> LoopState {
        if shutdown.is_requested() {
            return LoopState::Stopped;
        }

        let now = Instant::now();
        if !pacer.ready_at(now) {
            thread::sleep(pacer.remaining_at(now).min(MAX_IDLE));
            return LoopState::Running;
        }

        if let Err(e) = self.step(reader) {
            error!("Could not send frame: {e}");
            shutdown.raise();
            return LoopState::Stopped;
        }
        return LoopState::Running;
    }
}

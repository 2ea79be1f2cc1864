// Copyright 2024 the phosphene-stream contributors
// SPDX-License-Identifier: MPL-2.0

use log::{debug, trace};

use crate::{EXIT_TOKEN, FRAME_DELIMITER};

/// What happened after feeding one chunk to a [`FrameAssembler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// A delimiter closed a frame with enough data. Holds exactly
    /// `frame_len` bytes.
    FrameReady(Vec<u8>),
    Incomplete,
    /// The host sent the exit token.
    Exit,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerStats {
    pub frames_assembled: u64,
    /// Frames closed by a delimiter before enough data arrived.
    pub frames_discarded: u64,
    /// Accumulations thrown away because no delimiter showed up in time.
    pub overflows: u64,
}

/// Rebuilds raw grayscale frames from inbound chunks. The host sends a
/// frame as a run of data chunks followed by a [`FRAME_DELIMITER`] dgram.
///
/// There is no sequence numbering on the wire, so chunks are assumed to
/// arrive in order. A lost chunk yields a short frame, which is dropped
/// at the next delimiter.
pub struct FrameAssembler {
    frame_len: usize,
    overflow_limit: Option<usize>,
    accumulator: Vec<u8>,
    stats: AssemblerStats,
}

impl FrameAssembler {
    pub fn new(width: u32, height: u32) -> FrameAssembler {
        return FrameAssembler::with_frame_len(width as usize * height as usize);
    }

    pub fn with_frame_len(frame_len: usize) -> FrameAssembler {
        return FrameAssembler {
            frame_len: frame_len,
            overflow_limit: None,
            accumulator: Vec::with_capacity(frame_len),
            stats: AssemblerStats::default(),
        };
    }

    /// Throw the accumulation away once it grows past `limit` bytes
    /// without seeing a delimiter. Unlimited by default.
    pub fn with_overflow_limit(mut self, limit: usize) -> FrameAssembler {
        self.overflow_limit = Some(limit.max(self.frame_len));
        return self;
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Feed {
        if chunk == EXIT_TOKEN {
            if !self.accumulator.is_empty() {
                debug!(
                    "Exit token arrived with {} bytes pending, dropping them",
                    self.accumulator.len()
                );
            }
            self.accumulator.clear();
            return Feed::Exit;
        }

        if chunk == FRAME_DELIMITER {
            let have = self.accumulator.len();
            if have >= self.frame_len {
                self.accumulator.truncate(self.frame_len);
                let frame = std::mem::replace(
                    &mut self.accumulator,
                    Vec::with_capacity(self.frame_len),
                );
                self.stats.frames_assembled += 1;
                trace!("Frame complete after {have} bytes");
                return Feed::FrameReady(frame);
            }

            if have > 0 {
                debug!("Have {} bytes want {}, dropping frame", have, self.frame_len);
                self.stats.frames_discarded += 1;
            }
            self.accumulator.clear();
            return Feed::Incomplete;
        }

        if let Some(limit) = self.overflow_limit {
            if self.accumulator.len() + chunk.len() > limit {
                debug!(
                    "No delimiter after {} bytes, starting over",
                    self.accumulator.len()
                );
                self.accumulator.clear();
                self.stats.overflows += 1;
            }
        }
        self.accumulator.extend_from_slice(chunk);
        return Feed::Incomplete;
    }

    /// Bytes collected for the frame in progress.
    pub fn accumulated(&self) -> usize {
        return self.accumulator.len();
    }

    pub fn frame_len(&self) -> usize {
        return self.frame_len;
    }

    pub fn stats(&self) -> AssemblerStats {
        return self.stats;
    }
}

/// Host-side counterpart of [`crate::sender::ChunkedSender`]. Outbound
/// frames lead with the delimiter, so here a delimiter starts a frame and
/// the frame is done once `expected_len` bytes have come in.
pub struct PeerAssembler {
    expected_len: usize,
    started: bool,
    received: Vec<u8>,
}

impl PeerAssembler {
    pub fn new(expected_len: usize) -> PeerAssembler {
        return PeerAssembler {
            expected_len: expected_len,
            started: false,
            received: Vec::with_capacity(expected_len),
        };
    }

    /// Returns a frame once enough data has followed a delimiter. Data seen
    /// before the first delimiter is ignored, and a delimiter in the middle
    /// of a frame throws the partial frame away.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        if chunk == FRAME_DELIMITER {
            if self.started && !self.received.is_empty() {
                debug!(
                    "New frame started with {} of {} bytes pending",
                    self.received.len(),
                    self.expected_len
                );
            }
            self.started = true;
            self.received.clear();
            return None;
        }

        if !self.started {
            trace!("Ignoring {} bytes before the first delimiter", chunk.len());
            return None;
        }

        self.received.extend_from_slice(chunk);
        if self.received.len() < self.expected_len {
            return None;
        }

        self.started = false;
        self.received.truncate(self.expected_len);
        return Some(std::mem::replace(
            &mut self.received,
            Vec::with_capacity(self.expected_len),
        ));
    }
}

// Copyright 2024 the phosphene-stream contributors
// SPDX-License-Identifier: MPL-2.0

//! Two-slot frame store shared by the receive loop (one writer) and the
//! main loop (one reader).
//!
//! The writer always fills the slot that is not the read slot. When a
//! frame is complete the roles swap, unless the reader is holding the read
//! slot right now; then the new frame stays in the write slot and gets
//! overwritten by the next one. The reader never sees a torn frame and the
//! writer never waits on the reader.
//!
//! [`double_buffer`] hands out exactly one [`FrameWriter`] and one
//! [`FrameReader`], and both take `&mut self`, so the single-writer,
//! single-reader rule is enforced by the borrow checker.

use std::ops::Deref;
use std::sync::Arc;

use log::trace;
use parking_lot::{Mutex, MutexGuard};

use crate::{Result, StreamError};

struct Roles {
    write_index: usize,
    read_index: usize,
    reader_active: bool,
}

struct Shared {
    width: u32,
    height: u32,
    slots: [Mutex<Vec<u8>>; 2],
    roles: Mutex<Roles>,
}

impl Shared {
    fn frame_len(&self) -> usize {
        return self.width as usize * self.height as usize;
    }
}

/// Whether a published frame became the read frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    Published,
    /// The reader was busy. The frame was written but will be overwritten
    /// by the next publish.
    Dropped,
}

/// Allocates both slots, zero-filled, for `width` x `height` grayscale
/// frames.
pub fn double_buffer(width: u32, height: u32) -> (FrameWriter, FrameReader) {
    let frame_len = width as usize * height as usize;
    let shared = Arc::new(Shared {
        width: width,
        height: height,
        slots: [Mutex::new(vec![0u8; frame_len]), Mutex::new(vec![0u8; frame_len])],
        roles: Mutex::new(Roles {
            write_index: 1,
            read_index: 0,
            reader_active: false,
        }),
    });
    let writer = FrameWriter {
        shared: shared.clone(),
        published: 0,
        dropped: 0,
    };
    let reader = FrameReader { shared: shared };
    return (writer, reader);
}

pub struct FrameWriter {
    shared: Arc<Shared>,
    published: u64,
    dropped: u64,
}

impl FrameWriter {
    /// Copies `frame` into the write slot and swaps roles if the reader is
    /// idle. `frame` must be exactly `width * height` bytes.
    pub fn publish(&mut self, frame: &[u8]) -> Result<Publish> {
        let expected = self.shared.frame_len();
        if frame.len() != expected {
            return Err(StreamError::FrameSize {
                expected: expected,
                got: frame.len(),
            });
        }

        // Only publish() changes write_index, so it can't move under us.
        let write_index = self.shared.roles.lock().write_index;
        self.shared.slots[write_index].lock().copy_from_slice(frame);

        let mut roles = self.shared.roles.lock();
        if roles.reader_active {
            self.dropped += 1;
            trace!("Reader busy, slot {write_index} stays the write slot");
            return Ok(Publish::Dropped);
        }
        roles.read_index = write_index;
        roles.write_index = 1 - write_index;
        self.published += 1;
        return Ok(Publish::Published);
    }

    pub fn published(&self) -> u64 {
        return self.published;
    }

    pub fn dropped(&self) -> u64 {
        return self.dropped;
    }
}

pub struct FrameReader {
    shared: Arc<Shared>,
}

impl FrameReader {
    /// Marks the reader active and borrows the most recently completed
    /// frame. The frame stays put until the handle is released or dropped.
    pub fn acquire_read(&mut self) -> ReadHandle<'_> {
        let index = {
            let mut roles = self.shared.roles.lock();
            roles.reader_active = true;
            roles.read_index
        };
        return ReadHandle {
            shared: &self.shared,
            index: index,
            frame: self.shared.slots[index].lock(),
        };
    }

    pub fn width(&self) -> u32 {
        return self.shared.width;
    }

    pub fn height(&self) -> u32 {
        return self.shared.height;
    }
}

/// Borrowed read slot. Dropping it releases the read.
pub struct ReadHandle<'a> {
    shared: &'a Shared,
    index: usize,
    frame: MutexGuard<'a, Vec<u8>>,
}

impl ReadHandle<'_> {
    /// Ends the read. Same as dropping the handle.
    pub fn release_read(self) {
        drop(self);
    }

    /// Which of the two slots this handle borrows.
    pub fn slot(&self) -> usize {
        return self.index;
    }
}

impl Deref for ReadHandle<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        return &self.frame;
    }
}

impl Drop for ReadHandle<'_> {
    fn drop(&mut self) {
        self.shared.roles.lock().reader_active = false;
    }
}

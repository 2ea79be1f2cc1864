// Copyright 2024 the phosphene-stream contributors
// SPDX-License-Identifier: MPL-2.0

use std::io;

use log::trace;

use crate::sockets::DatagramSink;
use crate::{CHUNK_SIZE, FRAME_DELIMITER};

/// Splits outbound frames into dgrams. Each frame goes out as a lone
/// [`FRAME_DELIMITER`] followed by the data in order, `chunk_size` bytes at
/// a time. Nothing is acknowledged or resent.
pub struct ChunkedSender<W> {
    sink: W,
    chunk_size: usize,
}

impl<W: DatagramSink> ChunkedSender<W> {
    pub fn new(sink: W) -> ChunkedSender<W> {
        return ChunkedSender::with_chunk_size(sink, CHUNK_SIZE);
    }

    /// `chunk_size` of zero is treated as one.
    pub fn with_chunk_size(sink: W, chunk_size: usize) -> ChunkedSender<W> {
        return ChunkedSender {
            sink: sink,
            chunk_size: chunk_size.max(1),
        };
    }

    /// Sends one frame and returns how many data dgrams followed the
    /// delimiter, which is `ceil(buffer.len() / chunk_size)`. Stops at the
    /// first failed send.
    pub fn send(&mut self, buffer: &[u8]) -> io::Result<usize> {
        self.sink.send_datagram(FRAME_DELIMITER)?;

        let mut sent = 0;
        for chunk in buffer.chunks(self.chunk_size) {
            self.sink.send_datagram(chunk)?;
            sent += 1;
        }
        trace!("Sent {} bytes in {sent} chunks", buffer.len());
        return Ok(sent);
    }

    pub fn chunk_size(&self) -> usize {
        return self.chunk_size;
    }

    pub fn sink(&self) -> &W {
        return &self.sink;
    }

    pub fn into_sink(self) -> W {
        return self.sink;
    }
}

// Copyright 2024 the phosphene-stream contributors
// SPDX-License-Identifier: MPL-2.0

use std::io;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, trace};

use crate::double_buffer::{FrameWriter, Publish};
use crate::frame_assembler::{AssemblerStats, Feed, FrameAssembler};
use crate::shutdown::{ReadyLatch, ShutdownSignal};
use crate::sockets::{is_timeout, DatagramSource};
use crate::CHUNK_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveExit {
    ExitToken,
    Shutdown,
    SocketError(io::ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveReport {
    pub exit: ReceiveExit,
    pub chunks: u64,
    pub assembler: AssemblerStats,
    pub published: u64,
    /// Complete frames that arrived while the main loop was reading.
    pub dropped: u64,
}

/// Background half of the service: dgrams in, frames into the double
/// buffer.
pub struct ReceiveLoop<S> {
    source: S,
    assembler: FrameAssembler,
    writer: FrameWriter,
    shutdown: ShutdownSignal,
    ready: ReadyLatch,
    max_chunk: usize,
}

impl<S: DatagramSource> ReceiveLoop<S> {
    pub fn new(
        source: S,
        assembler: FrameAssembler,
        writer: FrameWriter,
        shutdown: ShutdownSignal,
        ready: ReadyLatch,
    ) -> ReceiveLoop<S> {
        return ReceiveLoop {
            source: source,
            assembler: assembler,
            writer: writer,
            shutdown: shutdown,
            ready: ready,
            max_chunk: CHUNK_SIZE,
        };
    }

    /// Size of the receive buffer. Longer dgrams get truncated by the OS.
    pub fn with_max_chunk(mut self, max_chunk: usize) -> ReceiveLoop<S> {
        self.max_chunk = max_chunk;
        return self;
    }

    /// Runs until the exit token, a shutdown request, or a socket error.
    /// The exit token and socket errors raise the shutdown signal so the
    /// main loop winds down as well.
    pub fn run(mut self) -> ReceiveReport {
        let mut buf = vec![0u8; self.max_chunk];
        let mut chunks = 0u64;

        let exit = loop {
            if self.shutdown.is_requested() {
                info!("Receive loop: shutdown requested, stopping");
                break ReceiveExit::Shutdown;
            }

            let amt = match self.source.recv_datagram(&mut buf) {
                Ok(amt) => amt,
                Err(e) if is_timeout(&e) || e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("Receive loop: socket error: {e}");
                    self.shutdown.raise();
                    break ReceiveExit::SocketError(e.kind());
                }
            };
            chunks += 1;
            trace!("Got a {amt} byte chunk");

            match self.assembler.feed(&buf[..amt]) {
                Feed::Incomplete => {}
                Feed::Exit => {
                    info!("Receive loop: exit token received, stopping");
                    self.shutdown.raise();
                    break ReceiveExit::ExitToken;
                }
                Feed::FrameReady(frame) => match self.writer.publish(&frame) {
                    Ok(Publish::Published) => {
                        debug!("Frame complete");
                        if !self.ready.is_tripped() {
                            info!("First frame received");
                            self.ready.trip();
                        }
                    }
                    Ok(Publish::Dropped) => {}
                    Err(e) => error!("Could not publish frame: {e}"),
                },
            }
        };

        return ReceiveReport {
            exit: exit,
            chunks: chunks,
            assembler: self.assembler.stats(),
            published: self.writer.published(),
            dropped: self.writer.dropped(),
        };
    }
}

impl<S: DatagramSource + Send + 'static> ReceiveLoop<S> {
    pub fn spawn(self) -> io::Result<JoinHandle<ReceiveReport>> {
        return thread::Builder::new()
            .name("receive".to_string())
            .spawn(move || self.run());
    }
}

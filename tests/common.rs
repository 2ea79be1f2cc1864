#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::time::Instant;

use phosphene_stream_lib::shutdown::ShutdownSignal;
use phosphene_stream_lib::sockets::{DatagramSink, DatagramSource};
use phosphene_stream_lib::FRAME_DELIMITER;

/// Keeps every dgram it is given.
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Vec<Vec<u8>>,
}

impl DatagramSink for RecordingSink {
    fn send_datagram(&mut self, payload: &[u8]) -> io::Result<usize> {
        self.sent.push(payload.to_vec());
        return Ok(payload.len());
    }
}

/// Fails once it has accepted `accept` dgrams.
pub struct FailingSink {
    pub accept: usize,
    pub sent: usize,
}

impl DatagramSink for FailingSink {
    fn send_datagram(&mut self, payload: &[u8]) -> io::Result<usize> {
        if self.sent == self.accept {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
        }
        self.sent += 1;
        return Ok(payload.len());
    }
}

/// Records dgrams and raises `shutdown` once `frames` frames have started.
pub struct StopAfter {
    pub shutdown: ShutdownSignal,
    pub frames: usize,
    pub sent: Vec<Vec<u8>>,
    pub frame_starts: Vec<Instant>,
}

impl StopAfter {
    pub fn new(shutdown: ShutdownSignal, frames: usize) -> StopAfter {
        return StopAfter {
            shutdown: shutdown,
            frames: frames,
            sent: Vec::new(),
            frame_starts: Vec::new(),
        };
    }
}

impl DatagramSink for StopAfter {
    fn send_datagram(&mut self, payload: &[u8]) -> io::Result<usize> {
        if payload == FRAME_DELIMITER {
            self.frame_starts.push(Instant::now());
            if self.frame_starts.len() >= self.frames {
                self.shutdown.raise();
            }
        }
        self.sent.push(payload.to_vec());
        return Ok(payload.len());
    }
}

/// Hands out scripted dgrams, then reports a receive timeout forever.
pub struct ScriptedSource {
    pub script: VecDeque<io::Result<Vec<u8>>>,
}

impl ScriptedSource {
    pub fn new(chunks: Vec<Vec<u8>>) -> ScriptedSource {
        return ScriptedSource {
            script: chunks.into_iter().map(Ok).collect(),
        };
    }

    pub fn then_fail(mut self, kind: io::ErrorKind) -> ScriptedSource {
        self.script.push_back(Err(io::Error::new(kind, "scripted failure")));
        return self;
    }
}

impl DatagramSource for ScriptedSource {
    fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.script.pop_front() {
            Some(Ok(chunk)) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            Some(Err(e)) => Err(e),
            None => Err(io::Error::new(io::ErrorKind::WouldBlock, "nothing scripted")),
        }
    }
}

/// A frame the way the host sends it: data chunks, then the delimiter.
pub fn host_chunks(frame: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    let mut chunks: Vec<Vec<u8>> = frame.chunks(chunk_size).map(|c| c.to_vec()).collect();
    chunks.push(FRAME_DELIMITER.to_vec());
    return chunks;
}

pub fn filled(len: usize, value: u8) -> Vec<u8> {
    return vec![value; len];
}

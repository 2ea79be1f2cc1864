// Copyright 2024 the phosphene-stream contributors
// SPDX-License-Identifier: MPL-2.0

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    #[error("unknown filter {name:?}, expected one of {known}")]
    UnknownFilter { name: String, known: String },
    #[error("frame is {got} bytes, expected {expected}")]
    FrameSize { expected: usize, got: usize },
    #[error("filter {filter} failed: {reason}")]
    Filter { filter: &'static str, reason: String },
    #[error("simulator failed: {0}")]
    Simulator(String),
}

pub type Result<T> = std::result::Result<T, StreamError>;

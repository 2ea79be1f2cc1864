// Copyright 2024 the phosphene-stream contributors
// SPDX-License-Identifier: MPL-2.0

// Plays the host's part: streams grayscale frames at phosphene-stream the
// way the simulator does, then sends the exit token. Frames come from a
// file of raw WIDTHxHEIGHT frames back to back, or from a generated
// moving pattern if no file is given.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use log::{debug, info};

use phosphene_stream_lib::pacer::Pacer;
use phosphene_stream_lib::params::Resolution;
use phosphene_stream_lib::sockets::{self, DatagramSink, UdpSink};
use phosphene_stream_lib::{CHUNK_SIZE, EXIT_TOKEN, FRAME_DELIMITER};

#[derive(Parser)]
#[command(name = "replay_frames")]
#[command(about = "Streams camera frames to phosphene-stream like the simulator does")]
struct Args {
    width: u32,

    height: u32,

    #[arg(short, long, help = "Raw frames back to back; a test pattern if omitted")]
    input: Option<PathBuf>,

    #[arg(short, long, default_value = sockets::DEFAULT_BIND_ADDR)]
    dest: SocketAddr,

    #[arg(short, long, default_value_t = 30.0)]
    fps: f64,

    #[arg(short = 'n', long, default_value_t = 300)]
    frames: u32,
}

/// A bright disc sweeping left to right over a dark background.
fn test_pattern(width: u32, height: u32, n: u32) -> Vec<u8> {
    let radius = (width.min(height) / 6).max(1) as i64;
    let cx = (n as i64 * 4) % width as i64;
    let cy = height as i64 / 2;
    let mut frame = vec![16u8; width as usize * height as usize];
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            if (x - cx).pow(2) + (y - cy).pow(2) <= radius * radius {
                frame[(y * width as i64 + x) as usize] = 240;
            }
        }
    }
    return frame;
}

/// The host sends data first and the delimiter last.
fn send_host_frame(sink: &mut UdpSink, frame: &[u8]) -> std::io::Result<()> {
    for chunk in frame.chunks(CHUNK_SIZE) {
        sink.send_datagram(chunk)?;
    }
    sink.send_datagram(FRAME_DELIMITER)?;
    return Ok(());
}

fn main() -> Result<()> {
    simple_logger::init_with_env()?;
    let args = Args::parse();

    let resolution = Resolution::new(args.width, args.height);
    if resolution.frame_len() == 0 {
        bail!("frame resolution {resolution} is empty");
    }
    let mut pacer = Pacer::from_fps(args.fps)?;

    let frame_len = resolution.frame_len();
    let mut file_reader = match &args.input {
        Some(path) => Some(BufReader::new(File::open(path)?)),
        None => None,
    };
    let mut sink = UdpSink::new(sockets::get_phosphene_socket(args.dest)?, args.dest);

    let mut frame = vec![0u8; frame_len];
    let mut sent = 0;
    while sent < args.frames {
        if !pacer.ready() {
            thread::sleep(Duration::from_millis(1));
            continue;
        }

        match &mut file_reader {
            Some(reader) => match reader.read_exact(&mut frame) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    info!("Ran out of frames in the input file");
                    break;
                }
                Err(e) => return Err(e.into()),
            },
            None => frame = test_pattern(args.width, args.height, sent),
        }

        send_host_frame(&mut sink, &frame)?;
        sent += 1;
        debug!("Sent frame {sent}");
    }

    sink.send_datagram(EXIT_TOKEN)?;
    info!("Sent {sent} frames to {}, then the exit token", sink.dest());
    Ok(())
}

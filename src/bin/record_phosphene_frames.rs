// Copyright 2024 the phosphene-stream contributors
// SPDX-License-Identifier: MPL-2.0

// This program listens where the simulator would, reassembles the
// phosphene frames phosphene-stream sends back, and writes them raw to a
// file called phosphene_frames in your current directory. The last frame
// can also be saved as a PNG.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::{SocketAddr, UdpSocket};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use image::GrayImage;
use log::{debug, info};

use phosphene_stream_lib::frame_assembler::PeerAssembler;
use phosphene_stream_lib::params::MAX_DATAGRAM_SIZE;
use phosphene_stream_lib::sockets;

#[derive(Parser)]
#[command(name = "record_phosphene_frames")]
#[command(about = "Records phosphene frames sent back by phosphene-stream")]
struct Args {
    width: u32,

    height: u32,

    #[arg(short, long, default_value = sockets::DEFAULT_DEST_ADDR)]
    bind: SocketAddr,

    #[arg(short = 'n', long, default_value_t = 100)]
    frames: u32,

    #[arg(short, long, default_value = "phosphene_frames")]
    output: PathBuf,

    #[arg(long, help = "Also save the last frame as a PNG")]
    png: Option<PathBuf>,
}

fn main() -> Result<()> {
    simple_logger::init_with_env()?;
    let args = Args::parse();

    let socket = UdpSocket::bind(args.bind)?;
    let mut file_writer = BufWriter::new(
        File::create_new(&args.output)
            .with_context(|| format!("creating {}", args.output.display()))?,
    );
    let mut assembler = PeerAssembler::new(args.width as usize * args.height as usize);

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut last = None;
    for n in 1..=args.frames {
        let frame = loop {
            let (amt, _src) = socket.recv_from(&mut buf)?;
            if let Some(frame) = assembler.feed(&buf[..amt]) {
                break frame;
            }
        };
        file_writer.write_all(&frame)?;
        debug!("Recorded frame {n}");
        last = Some(frame);
    }
    file_writer.flush()?;
    info!("Recorded {} frames to {}", args.frames, args.output.display());

    if let (Some(path), Some(frame)) = (&args.png, last) {
        let image = GrayImage::from_raw(args.width, args.height, frame)
            .context("frame does not match the given size")?;
        image.save(path)?;
        info!("Saved the last frame to {}", path.display());
    }
    Ok(())
}

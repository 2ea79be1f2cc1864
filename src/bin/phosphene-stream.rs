// Copyright 2024 the phosphene-stream contributors
// SPDX-License-Identifier: MPL-2.0

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};

use phosphene_stream_lib::double_buffer::double_buffer;
use phosphene_stream_lib::filters;
use phosphene_stream_lib::frame_assembler::FrameAssembler;
use phosphene_stream_lib::pacer::Pacer;
use phosphene_stream_lib::params::{PipelineParams, Resolution, SimulatorParams};
use phosphene_stream_lib::pipeline::Pipeline;
use phosphene_stream_lib::receiver::ReceiveLoop;
use phosphene_stream_lib::sender::ChunkedSender;
use phosphene_stream_lib::shutdown::{ReadyLatch, ShutdownSignal};
use phosphene_stream_lib::simulator::GaussianSimulator;
use phosphene_stream_lib::sockets::{self, UdpSink};
use phosphene_stream_lib::CHUNK_SIZE;

/// Frames this many times the expected size without a delimiter get
/// thrown away.
const OVERFLOW_FRAMES: usize = 4;

#[derive(Parser)]
#[command(name = "phosphene-stream")]
#[command(about = "Turns camera frames from the simulator into phosphene frames")]
struct Args {
    /// Shut down once this file exists
    shutdown_file: PathBuf,

    /// Width of the frames on the wire, both directions
    width: u32,

    /// Height of the frames on the wire, both directions
    height: u32,

    #[arg(short, long, default_value = sockets::DEFAULT_BIND_ADDR)]
    bind: SocketAddr,

    #[arg(short, long, default_value = sockets::DEFAULT_DEST_ADDR)]
    dest: SocketAddr,

    #[arg(short, long, default_value_t = 30.0)]
    fps: f64,

    #[arg(short, long, default_value = "256x256", help = "Processing resolution, WIDTHxHEIGHT")]
    resolution: Resolution,

    #[arg(long, default_value = "canny-200", help = "One of: none, sobel, canny-100, canny-200")]
    filter: String,

    #[arg(long, default_value_t = CHUNK_SIZE)]
    chunk_size: usize,

    #[arg(long, default_value_t = 1024)]
    phosphenes: u32,

    #[arg(long, default_value_t = 2.0)]
    sigma: f32,

    #[arg(long, default_value_t = 0.2)]
    threshold: f32,
}

fn main() -> Result<()> {
    simple_logger::init_with_env()?;
    let args = Args::parse();

    let frame = Resolution::new(args.width, args.height);
    let params = PipelineParams {
        frame: frame,
        processing: args.resolution,
        fps: args.fps,
        chunk_size: args.chunk_size,
        filter: args.filter,
        simulator: SimulatorParams {
            phosphenes: args.phosphenes,
            sigma: args.sigma,
            threshold: args.threshold,
            rescale: true,
        },
    };
    params.validate()?;

    let filter = filters::lookup(&params.filter)?;
    let simulator = GaussianSimulator::new(params.processing, params.simulator.clone())?;
    info!(
        "Using filter {} with {} phosphenes at {}",
        filter.name(),
        simulator.phosphene_count(),
        params.processing
    );

    let shutdown = ShutdownSignal::with_marker(&args.shutdown_file);
    if let Some(marker) = shutdown.marker().filter(|marker| marker.exists()) {
        warn!(
            "Shutdown file {} already exists, exiting right away",
            marker.display()
        );
    }
    let interrupt = shutdown.clone();
    ctrlc::set_handler(move || interrupt.raise()).context("installing Ctrl-C handler")?;
    let ready = ReadyLatch::new();

    let (writer, mut reader) = double_buffer(frame.width, frame.height);

    let camera_socket = sockets::get_camera_socket(args.bind)
        .with_context(|| format!("binding camera socket to {}", args.bind))?;
    info!("Camera socket (in) listening on {}", args.bind);
    let phosphene_socket = sockets::get_phosphene_socket(args.dest)?;
    info!("Phosphene socket (out) sending to {}", args.dest);

    let assembler = FrameAssembler::new(frame.width, frame.height)
        .with_overflow_limit(OVERFLOW_FRAMES * frame.frame_len());
    let receive = ReceiveLoop::new(
        camera_socket,
        assembler,
        writer,
        shutdown.clone(),
        ready.clone(),
    )
    .with_max_chunk(params.chunk_size.max(CHUNK_SIZE))
    .spawn()?;

    let sender =
        ChunkedSender::with_chunk_size(UdpSink::new(phosphene_socket, args.dest), params.chunk_size);
    let mut pacer = Pacer::from_fps(params.fps)?;
    let mut pipeline = Pipeline::new(params, filter, Box::new(simulator), sender);
    let stats = pipeline.run(&mut reader, &mut pacer, &shutdown, &ready);

    // The main loop can stop on its own (send failure), make sure the
    // receive loop follows.
    shutdown.raise();
    match receive.join() {
        Ok(report) => info!(
            "Receive loop stopped ({:?}): {} chunks, {} frames assembled, {} short, {} overflowed, {} published, {} dropped while reading",
            report.exit,
            report.chunks,
            report.assembler.frames_assembled,
            report.assembler.frames_discarded,
            report.assembler.overflows,
            report.published,
            report.dropped
        ),
        Err(_) => error!("Receive thread panicked"),
    }
    info!(
        "Processed {} frames, skipped {}, mean processing {:?}, mean send {:?}",
        stats.processed,
        stats.skipped,
        stats.mean_processing_time(),
        stats.mean_send_time()
    );
    info!("Done");
    Ok(())
}

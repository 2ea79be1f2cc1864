use std::io;
use std::net::UdpSocket;
use std::thread;
use std::time::Duration;

use assert_matches::assert_matches;
use phosphene_stream_lib::double_buffer::double_buffer;
use phosphene_stream_lib::frame_assembler::FrameAssembler;
use phosphene_stream_lib::receiver::{ReceiveExit, ReceiveLoop};
use phosphene_stream_lib::shutdown::{ReadyLatch, ShutdownSignal};
use phosphene_stream_lib::sockets;
use phosphene_stream_lib::{EXIT_TOKEN, FRAME_DELIMITER};

mod common;

#[test]
fn test_frames_then_exit() {
    let mut script = common::host_chunks(&common::filled(16, 1), 5);
    script.extend(common::host_chunks(&common::filled(16, 2), 5));
    script.push(EXIT_TOKEN.to_vec());

    let (writer, mut reader) = double_buffer(4, 4);
    let shutdown = ShutdownSignal::manual();
    let ready = ReadyLatch::new();
    let report = ReceiveLoop::new(
        common::ScriptedSource::new(script),
        FrameAssembler::new(4, 4),
        writer,
        shutdown.clone(),
        ready.clone(),
    )
    .run();

    assert_eq!(report.exit, ReceiveExit::ExitToken);
    assert_eq!(report.chunks, 11);
    assert_eq!(report.published, 2);
    assert_eq!(report.assembler.frames_assembled, 2);
    assert!(ready.is_tripped());
    assert!(shutdown.is_requested());
    assert_eq!(&reader.acquire_read()[..], &[2u8; 16]);
}

#[test]
fn test_short_frame_does_not_trip_ready() {
    let script = vec![b"abc".to_vec(), FRAME_DELIMITER.to_vec(), EXIT_TOKEN.to_vec()];
    let (writer, _reader) = double_buffer(4, 4);
    let ready = ReadyLatch::new();
    let report = ReceiveLoop::new(
        common::ScriptedSource::new(script),
        FrameAssembler::new(4, 4),
        writer,
        ShutdownSignal::manual(),
        ready.clone(),
    )
    .run();

    assert_eq!(report.assembler.frames_discarded, 1);
    assert_eq!(report.published, 0);
    assert!(!ready.is_tripped());
}

#[test]
fn test_shutdown_before_anything() {
    let (writer, _reader) = double_buffer(2, 2);
    let shutdown = ShutdownSignal::manual();
    shutdown.raise();
    let report = ReceiveLoop::new(
        common::ScriptedSource::new(vec![b"data".to_vec()]),
        FrameAssembler::new(2, 2),
        writer,
        shutdown,
        ReadyLatch::new(),
    )
    .run();

    assert_eq!(report.exit, ReceiveExit::Shutdown);
    assert_eq!(report.chunks, 0);
}

#[test]
fn test_socket_error_stops_the_loop() {
    let (writer, _reader) = double_buffer(2, 2);
    let shutdown = ShutdownSignal::manual();
    let source = common::ScriptedSource::new(vec![b"ab".to_vec()])
        .then_fail(io::ErrorKind::ConnectionReset);
    let report = ReceiveLoop::new(
        source,
        FrameAssembler::new(2, 2),
        writer,
        shutdown.clone(),
        ReadyLatch::new(),
    )
    .run();

    assert_matches!(report.exit, ReceiveExit::SocketError(io::ErrorKind::ConnectionReset));
    assert_eq!(report.chunks, 1);
    assert!(shutdown.is_requested());
}

#[test]
fn test_timeouts_keep_polling_shutdown() {
    let (writer, _reader) = double_buffer(2, 2);
    let shutdown = ShutdownSignal::manual();
    let handle = ReceiveLoop::new(
        common::ScriptedSource::new(Vec::new()),
        FrameAssembler::new(2, 2),
        writer,
        shutdown.clone(),
        ReadyLatch::new(),
    )
    .spawn()
    .unwrap();

    thread::sleep(Duration::from_millis(20));
    assert!(!handle.is_finished());
    shutdown.raise();
    assert_eq!(handle.join().unwrap().exit, ReceiveExit::Shutdown);
}

#[test]
fn test_marker_file_stops_the_loop() {
    let marker = std::env::temp_dir().join(format!("phosphene-stream-{}", std::process::id()));
    let _ = std::fs::remove_file(&marker);

    let (writer, _reader) = double_buffer(2, 2);
    let shutdown = ShutdownSignal::with_marker(&marker);
    let handle = ReceiveLoop::new(
        common::ScriptedSource::new(Vec::new()),
        FrameAssembler::new(2, 2),
        writer,
        shutdown,
        ReadyLatch::new(),
    )
    .spawn()
    .unwrap();

    std::fs::write(&marker, "shutdown").unwrap();
    let report = handle.join().unwrap();
    std::fs::remove_file(&marker).unwrap();
    assert_eq!(report.exit, ReceiveExit::Shutdown);
}

#[test]
fn test_over_loopback() {
    let socket = sockets::get_camera_socket("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = socket.local_addr().unwrap();

    let (writer, mut reader) = double_buffer(40, 30);
    let ready = ReadyLatch::new();
    let handle = ReceiveLoop::new(
        socket,
        FrameAssembler::new(40, 30),
        writer,
        ShutdownSignal::manual(),
        ready.clone(),
    )
    .spawn()
    .unwrap();

    let host = UdpSocket::bind("127.0.0.1:0").unwrap();
    let frame: Vec<u8> = (0..1200u32).map(|n| (n % 256) as u8).collect();
    for chunk in common::host_chunks(&frame, 1024) {
        host.send_to(&chunk, addr).unwrap();
    }
    assert!(ready.wait_timeout(Duration::from_secs(5)));
    host.send_to(EXIT_TOKEN, addr).unwrap();

    let report = handle.join().unwrap();
    assert_eq!(report.exit, ReceiveExit::ExitToken);
    assert_eq!(&reader.acquire_read()[..], frame.as_slice());
}

#[test]
fn test_camera_socket_gets_a_larger_queue() {
    let camera = sockets::get_camera_socket("127.0.0.1:0".parse().unwrap()).unwrap();
    let plain = UdpSocket::bind("127.0.0.1:0").unwrap();
    let granted = sockets::recv_buffer_size(&camera).unwrap();
    assert!(granted >= sockets::recv_buffer_size(&plain).unwrap());

    // A whole burst of chunks sent before anyone reads is still there.
    let addr = camera.local_addr().unwrap();
    let host = UdpSocket::bind("127.0.0.1:0").unwrap();
    for n in 0..64u8 {
        host.send_to(&[n; 1024], addr).unwrap();
    }
    let mut buf = [0u8; 1024];
    for n in 0..64u8 {
        let (amt, _) = camera.recv_from(&mut buf).unwrap();
        assert_eq!(amt, 1024);
        assert_eq!(buf[0], n);
    }
}

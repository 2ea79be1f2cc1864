use assert_matches::assert_matches;
use phosphene_stream_lib::frame_assembler::{Feed, FrameAssembler, PeerAssembler};
use phosphene_stream_lib::sender::ChunkedSender;
use phosphene_stream_lib::{EXIT_TOKEN, FRAME_DELIMITER};
use proptest::prelude::*;

mod common;

#[test]
fn test_two_chunks_make_a_frame() {
    let mut assembler = FrameAssembler::with_frame_len(8);
    assert_eq!(assembler.feed(b"AAAA"), Feed::Incomplete);
    assert_eq!(assembler.feed(b"BBBB"), Feed::Incomplete);
    assert_eq!(
        assembler.feed(FRAME_DELIMITER),
        Feed::FrameReady(b"AAAABBBB".to_vec())
    );
    assert_eq!(assembler.accumulated(), 0);
    assert_eq!(assembler.stats().frames_assembled, 1);
}

#[test]
fn test_short_frame_is_dropped() {
    let mut assembler = FrameAssembler::with_frame_len(8);
    assert_eq!(assembler.feed(b"AA"), Feed::Incomplete);
    assert_eq!(assembler.feed(FRAME_DELIMITER), Feed::Incomplete);
    assert_eq!(assembler.accumulated(), 0);
    assert_eq!(assembler.stats().frames_discarded, 1);
    assert_eq!(assembler.stats().frames_assembled, 0);
}

#[test]
fn test_long_frame_is_truncated() {
    let mut assembler = FrameAssembler::new(4, 2);
    assembler.feed(b"0123456789AB");
    assert_matches!(assembler.feed(FRAME_DELIMITER), Feed::FrameReady(frame) => {
        assert_eq!(frame, b"01234567");
    });
}

#[test]
fn test_repeated_delimiters_do_nothing() {
    let mut assembler = FrameAssembler::with_frame_len(4);
    assert_eq!(assembler.feed(FRAME_DELIMITER), Feed::Incomplete);
    assert_eq!(assembler.feed(FRAME_DELIMITER), Feed::Incomplete);
    assert_eq!(assembler.accumulated(), 0);
    assert_eq!(assembler.stats().frames_discarded, 0);

    assembler.feed(b"abcd");
    assert_eq!(assembler.feed(FRAME_DELIMITER), Feed::FrameReady(b"abcd".to_vec()));
}

#[test]
fn test_exit_mid_frame_discards() {
    let mut assembler = FrameAssembler::with_frame_len(8);
    assembler.feed(b"AAAA");
    assert_eq!(assembler.feed(EXIT_TOKEN), Feed::Exit);
    assert_eq!(assembler.accumulated(), 0);
}

#[test]
fn test_sentinels_must_match_exactly() {
    let mut assembler = FrameAssembler::with_frame_len(4);
    let mut padded = FRAME_DELIMITER.to_vec();
    padded.push(0);
    assert_eq!(assembler.feed(&padded), Feed::Incomplete);
    assert_eq!(assembler.feed(&EXIT_TOKEN[1..]), Feed::Incomplete);
    assert_eq!(assembler.accumulated(), padded.len() + EXIT_TOKEN.len() - 1);
}

#[test]
fn test_overflow_limit_starts_over() {
    let mut assembler = FrameAssembler::with_frame_len(4).with_overflow_limit(8);
    assembler.feed(b"xxxxxx");
    assembler.feed(b"abcd");
    assert_eq!(assembler.stats().overflows, 1);
    assert_eq!(assembler.accumulated(), 4);
    assert_eq!(assembler.feed(FRAME_DELIMITER), Feed::FrameReady(b"abcd".to_vec()));
}

#[test]
fn test_peer_assembler_round_trip() {
    let frame: Vec<u8> = (0..2500u32).map(|n| n as u8).collect();
    let mut sender = ChunkedSender::with_chunk_size(common::RecordingSink::default(), 1024);
    sender.send(&frame).unwrap();

    let mut peer = PeerAssembler::new(frame.len());
    let mut out = Vec::new();
    for dgram in &sender.sink().sent {
        if let Some(done) = peer.feed(dgram) {
            out.push(done);
        }
    }
    assert_eq!(out, vec![frame]);
}

#[test]
fn test_peer_assembler_waits_for_delimiter() {
    let mut peer = PeerAssembler::new(4);
    assert_eq!(peer.feed(b"zzzz"), None);
    assert_eq!(peer.feed(FRAME_DELIMITER), None);
    assert_eq!(peer.feed(b"ab"), None);
    // A new delimiter throws the half frame away.
    assert_eq!(peer.feed(FRAME_DELIMITER), None);
    assert_eq!(peer.feed(b"cd"), None);
    assert_eq!(peer.feed(b"efgh"), Some(b"cdef".to_vec()));
    // Done until the next delimiter.
    assert_eq!(peer.feed(b"ijkl"), None);
}

fn data_chunks() -> impl Strategy<Value = Vec<Vec<u8>>> {
    return prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 0..32).prop_filter(
        "chunks must not be sentinels",
        |chunks| {
            chunks
                .iter()
                .all(|c| c.as_slice() != FRAME_DELIMITER && c.as_slice() != EXIT_TOKEN)
        },
    );
}

proptest! {
    #[test]
    fn test_delimiter_emits_prefix_or_nothing(chunks in data_chunks(), frame_len in 1usize..512) {
        let mut assembler = FrameAssembler::with_frame_len(frame_len);
        for chunk in &chunks {
            prop_assert_eq!(assembler.feed(chunk), Feed::Incomplete);
        }
        let all: Vec<u8> = chunks.concat();
        let result = assembler.feed(FRAME_DELIMITER);
        if all.len() >= frame_len {
            prop_assert_eq!(result, Feed::FrameReady(all[..frame_len].to_vec()));
        } else {
            prop_assert_eq!(result, Feed::Incomplete);
        }
        prop_assert_eq!(assembler.accumulated(), 0);
    }
}

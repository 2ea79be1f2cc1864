pub mod double_buffer;
pub mod error;
pub mod filters;
pub mod frame_assembler;
pub mod pacer;
pub mod params;
pub mod pipeline;
pub mod receiver;
pub mod sender;
pub mod shutdown;
pub mod simulator;
pub mod sockets;

pub use error::{Result, StreamError};

/// The largest dgram we send or expect to receive. The host splits its
/// camera frames into pieces of this size, and we split our phosphene
/// frames the same way on the way back.
pub const CHUNK_SIZE: usize = 1024;

/// Sent as its own dgram. Inbound it ends a frame, outbound it starts one.
pub const FRAME_DELIMITER: &[u8] = b"FRAME_DEL";

/// Sent as its own dgram by the host when it stops streaming on purpose.
pub const EXIT_TOKEN: &[u8] = b"EXIT_CODE";

/// How long a blocking receive may wait before the receive loop gets
/// another chance to look at the shutdown signal.
pub const RECEIVE_POLL_INTERVAL_MS: u64 = 100;

//! The append-only write-ahead log (spec §4.1).

mod frame;
mod reader;
mod writer;

pub use frame::{Frame, FrameDecodeError, FRAME_OVERHEAD_BYTES, LOG_FORMAT_VERSION, LOG_HEADER_BYTES};
pub use reader::{truncate_to_last_good_boundary, LogIterator};
pub use writer::AppendLog;

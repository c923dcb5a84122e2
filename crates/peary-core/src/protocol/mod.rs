//! Protocol module containing the frame codec and the sequence counter.

pub mod frame;
pub mod sequence;

pub use frame::{
    decode_frame, encode_frame, Frame, FrameError, IntegrityMode, DEFAULT_BUFFER_SIZE,
    PROTOCOL_VERSION, STATUS_OK,
};
pub use sequence::SequenceCounter;

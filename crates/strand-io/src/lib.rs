//! Decoder and encoder collaborators.
//!
//! | module | role |
//! |---|---|
//! | [`y4m_source`] | YUV4MPEG2 file → [`Decoder`](strand_core::codec_traits::Decoder) |
//! | [`y4m_sink`] | [`Encoder`](strand_core::codec_traits::Encoder) → YUV4MPEG2 file |
//! | [`synthetic`] | uniform in-memory frames with optional audio/subtitle streams |
//! | [`memory_sink`] | records frames and packets for inspection |
//! | [`null_sink`] | discards everything (benchmark runs) |

pub mod memory_sink;
pub mod null_sink;
pub mod synthetic;
pub mod y4m;
pub mod y4m_sink;
pub mod y4m_source;

pub use memory_sink::{MemorySink, WrittenFrame};
pub use null_sink::NullSink;
pub use synthetic::{SyntheticSource, SyntheticSourceBuilder};
pub use y4m_sink::Y4mSink;
pub use y4m_source::Y4mSource;

//! Frame codec over async streams.
//!
//! [`FrameReader`] decodes frames from the read half of a transport and
//! [`FrameWriter`] encodes them onto the write half. Each half is owned by a
//! single task at a time.

mod framed;

pub use framed::{FrameReader, FrameWriter};

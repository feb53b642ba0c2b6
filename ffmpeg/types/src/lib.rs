/*!
    Shared types for the ffmpeg crate ecosystem.

    This crate defines the vocabulary of the ecosystem, the types that cross crate
    boundaries: raw video and audio frames, pixel/sample/channel formats, rationals,
    codec identifiers, encoded packets and the shared error type. It has no dependency
    on FFmpeg, making it lightweight and enabling consumers (and tests) to depend on it
    without pulling in FFmpeg bindings.
*/

mod codec;
mod error;
mod format;
mod frame;
mod packet;
mod rational;

pub use self::codec::{CodecId, CodecSelection};
pub use self::error::{Error, ParseError, Result};
pub use self::format::{ChannelLayout, PixelFormat, SampleFormat};
pub use self::frame::{AudioFrame, VideoFrame};
pub use self::packet::Packet;
pub use self::rational::Rational;

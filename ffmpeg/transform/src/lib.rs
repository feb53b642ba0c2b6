/*!
    Media frame transformation for the ffmpeg crate ecosystem.

    This crate converts raw frames between shapes. For video: scaling and pixel
    format conversion ([`Scaler`]). For audio: resampling, channel layout
    conversion and sample format conversion ([`Resampler`]).

    Both converters cache one conversion context keyed by the source and
    destination shape, and rebuild it only when that key changes. The actual
    pixel and sample math is delegated to an engine created by a factory
    ([`ScaleEngineFactory`], [`ResampleEngineFactory`]); the `ffmpeg` feature
    provides engines backed by libswscale and libswresample.

    # Packed 10-bit sources

    Capture sources on HDR desktops deliver `X2Rgb10le` frames. These are unpacked
    to `Rgb48le` before reaching the engine, and copied straight out when the
    destination already is `Rgb48le` at the same size.
*/

pub use ffmpeg_types::{
    AudioFrame, ChannelLayout, Error, PixelFormat, Result, SampleFormat, VideoFrame,
};

mod audio;
mod engine;
mod unpack;
mod video;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use audio::Resampler;
pub use engine::{
    AudioShape, ImageShape, ResampleEngine, ResampleEngineFactory, ScaleEngine,
    ScaleEngineFactory,
};
pub use unpack::unpack_x2rgb10;
pub use video::Scaler;

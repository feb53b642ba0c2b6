/*!
    Media encoding and muxing for the ffmpeg crate ecosystem.

    This crate turns raw frames into a finished container. A [`MediaWriter`]
    negotiates one video and one audio encoder when it is opened, converts
    every submitted frame into the shape its encoder needs, stamps it with a
    presentation timestamp, and interleaves the resulting packets into the
    output. Closing the writer drains encoder latency and writes the trailer.

    # Writing a file

    ```ignore
    use ffmpeg_encode::{FfmpegBackend, HardwareCapabilities, MediaWriter, WriterConfig};
    use ffmpeg_types::{CodecId, Rational};

    let backend = FfmpegBackend::new()?;
    let capabilities = HardwareCapabilities::detect(&backend);

    let config = WriterConfig::new(1280, 720, Rational::new(30000, 1001))
        .with_video_codec(CodecId::H264)
        .with_video_bitrate(4_000_000)
        .with_audio_codec(CodecId::Aac);

    let mut writer = MediaWriter::new(backend, config, capabilities);
    writer.open("out.mp4", None, false)?;
    for frame in video_frames {
        writer.encode_video_frame(&frame)?;
    }
    for block in audio_blocks {
        writer.encode_audio_frame(&block)?;
    }
    writer.close()?;
    ```

    # Codec selection

    Each medium takes a [`CodecSelection`]: a specific codec, `Probe` for the
    container's default, or `None` to omit the track.

    # Hardware encoding

    NVENC and Quick Sync encoders are used for H.264 and H.265 when
    [`HardwareCapabilities`] says they work and the frame is at least
    100x100. If a hardware encoder fails to open, the session retries once in
    software. Pass `force_software` to [`MediaWriter::open`] to skip hardware.

    # Backends

    Session logic is written against the traits in [`backend`]. The `ffmpeg`
    feature (on by default) provides [`FfmpegBackend`]; without it the crate
    still builds and can be driven by any other backend.
*/

pub use ffmpeg_types::{
    AudioFrame, ChannelLayout, CodecId, CodecSelection, Error, Packet, PixelFormat, Rational,
    Result, SampleFormat, VideoFrame,
};

pub mod backend;
mod config;
mod hardware;
pub mod negotiate;
mod writer;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use backend::{
    AudioEncoderSettings, AudioEncoding, Backend, CodecCatalog, Container, EncoderDescriptor,
    HardwareFrames, PacketSource, Poll, VideoEncoderSettings, VideoEncoding,
};
pub use config::{
    ASSUMED_AUDIO_INPUT, AUDIO_GUARD_SAMPLES, DEFAULT_AUDIO_BITRATE, DEFAULT_SAMPLE_RATE,
    DEFAULT_VIDEO_BITRATE, MIN_HARDWARE_DIMENSION, STREAMING_SAMPLE_RATE, VARIABLE_FRAME_SAMPLES,
    WriterConfig, target_sample_rate,
};
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::{FfmpegBackend, ScalingAlgorithm};
pub use hardware::{HardwareCapabilities, HardwareFamily};
pub use writer::MediaWriter;

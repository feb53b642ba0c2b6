/*!
    Encode session configuration.
*/

use serde::{Deserialize, Serialize};

use ffmpeg_transform::AudioShape;
use ffmpeg_types::{ChannelLayout, CodecSelection, Error, Rational, Result, SampleFormat};

/// Video bitrate used when none is configured, in bits per second.
pub const DEFAULT_VIDEO_BITRATE: u64 = 10_000_000;

/// Audio bitrate used when none is configured, in bits per second.
pub const DEFAULT_AUDIO_BITRATE: u64 = 128_000;

/// Smallest width and height hardware encoders are tried for.
pub const MIN_HARDWARE_DIMENSION: u32 = 100;

/// Extra samples that must be buffered before another encoder frame is pulled
/// in the same call. Covers the resampler's filter delay estimate.
pub const AUDIO_GUARD_SAMPLES: usize = 32;

/// Staging frame size for encoders that accept any frame size.
pub const VARIABLE_FRAME_SAMPLES: usize = 8192;

/// Target sample rate for file and generic network outputs.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Target sample rate for RTMP outputs.
pub const STREAMING_SAMPLE_RATE: u32 = 44100;

/// Shape audio input is assumed to have until a frame says otherwise.
pub const ASSUMED_AUDIO_INPUT: AudioShape =
    AudioShape::new(ChannelLayout::Stereo, SampleFormat::S16, DEFAULT_SAMPLE_RATE);

/**
    Configuration of a media writer.

    Immutable once the writer is created. A bitrate of zero selects the
    default for that medium.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Encoded frame width in pixels.
    pub width: u32,
    /// Encoded frame height in pixels.
    pub height: u32,
    /// Nominal frame rate.
    pub frame_rate: Rational,
    pub video_codec: CodecSelection,
    /// Video bitrate in bits per second (0 = default).
    pub video_bitrate: u64,
    pub audio_codec: CodecSelection,
    /// Audio bitrate in bits per second (0 = default).
    pub audio_bitrate: u64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            frame_rate: Rational::new(30, 1),
            video_codec: CodecSelection::Probe,
            video_bitrate: 0,
            audio_codec: CodecSelection::Probe,
            audio_bitrate: 0,
        }
    }
}

impl WriterConfig {
    /**
        Create a configuration for the given geometry, with container-default
        codecs and default bitrates.
    */
    pub fn new(width: u32, height: u32, frame_rate: Rational) -> Self {
        Self {
            width,
            height,
            frame_rate,
            ..Self::default()
        }
    }

    /**
        Set the video codec.
    */
    pub fn with_video_codec(mut self, codec: impl Into<CodecSelection>) -> Self {
        self.video_codec = codec.into();
        self
    }

    /**
        Set the video bitrate in bits per second.
    */
    pub fn with_video_bitrate(mut self, bitrate: u64) -> Self {
        self.video_bitrate = bitrate;
        self
    }

    /**
        Set the audio codec.
    */
    pub fn with_audio_codec(mut self, codec: impl Into<CodecSelection>) -> Self {
        self.audio_codec = codec.into();
        self
    }

    /**
        Set the audio bitrate in bits per second.
    */
    pub fn with_audio_bitrate(mut self, bitrate: u64) -> Self {
        self.audio_bitrate = bitrate;
        self
    }

    /**
        Video bitrate with the default applied.
    */
    pub fn effective_video_bitrate(&self) -> u64 {
        match self.video_bitrate {
            0 => DEFAULT_VIDEO_BITRATE,
            bitrate => bitrate,
        }
    }

    /**
        Audio bitrate with the default applied.
    */
    pub fn effective_audio_bitrate(&self) -> u64 {
        match self.audio_bitrate {
            0 => DEFAULT_AUDIO_BITRATE,
            bitrate => bitrate,
        }
    }

    /**
        Check the configuration is usable. Dimensions only matter when a
        video track is requested.
    */
    pub fn validate(&self) -> Result<()> {
        let has_video = self.video_codec != CodecSelection::None;
        if has_video && (self.width == 0 || self.height == 0) {
            return Err(Error::invalid_data(format!(
                "invalid dimensions {}x{}",
                self.width, self.height
            )));
        }
        if !self.frame_rate.is_positive() {
            return Err(Error::invalid_data(format!(
                "invalid frame rate {}",
                self.frame_rate
            )));
        }
        for (selection, video) in [(self.video_codec, true), (self.audio_codec, false)] {
            if let CodecSelection::Codec(codec) = selection {
                if codec.is_video() != video {
                    return Err(Error::invalid_data(format!(
                        "{codec} cannot be used as the {} codec",
                        if video { "video" } else { "audio" }
                    )));
                }
            }
        }
        Ok(())
    }
}

/**
    Target sample rate for a destination. RTMP ingest favors 44.1 kHz.
*/
pub fn target_sample_rate(destination: &str) -> u32 {
    if destination.contains("rtmp://") || destination.contains("rtmps://") {
        STREAMING_SAMPLE_RATE
    } else {
        DEFAULT_SAMPLE_RATE
    }
}

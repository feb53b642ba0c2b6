use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ffmpeg_encode::{
    FfmpegBackend, HardwareCapabilities, MediaWriter, ScalingAlgorithm, WriterConfig,
};
use ffmpeg_types::{CodecSelection, Rational};
use tracing::info;

use crate::pattern::TestPattern;

#[derive(Parser, Debug)]
pub struct RecordCommand {
    /// Output file or URL
    #[arg(short, long)]
    pub output: String,

    /// Container format (inferred from the output when omitted)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Writer settings as JSON; flags override individual fields
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Frame width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Frame height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Frame rate as N/D or N
    #[arg(long)]
    pub fps: Option<Rational>,

    /// Video codec name, `probe` or `none`
    #[arg(long)]
    pub video_codec: Option<CodecSelection>,

    /// Video bitrate in bits per second
    #[arg(long)]
    pub video_bitrate: Option<u64>,

    /// Audio codec name, `probe` or `none`
    #[arg(long)]
    pub audio_codec: Option<CodecSelection>,

    /// Audio bitrate in bits per second
    #[arg(long)]
    pub audio_bitrate: Option<u64>,

    /// Length of the recording in seconds
    #[arg(short = 't', long, default_value = "5")]
    pub seconds: f64,

    /// Sine tone frequency in Hz (silence when omitted)
    #[arg(long)]
    pub tone: Option<f64>,

    /// Filter used when frames need resizing or pixel format conversion
    #[arg(long, value_enum, default_value_t = Scaling::FastBilinear)]
    pub scaling: Scaling,

    /// Skip hardware encoders
    #[arg(long)]
    pub software: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scaling {
    FastBilinear,
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos,
}

impl From<Scaling> for ScalingAlgorithm {
    fn from(scaling: Scaling) -> Self {
        match scaling {
            Scaling::FastBilinear => Self::FastBilinear,
            Scaling::Nearest => Self::Nearest,
            Scaling::Bilinear => Self::Bilinear,
            Scaling::Bicubic => Self::Bicubic,
            Scaling::Lanczos => Self::Lanczos,
        }
    }
}

impl RecordCommand {
    pub fn run(self) -> Result<()> {
        let config = self.writer_config()?;
        let backend = FfmpegBackend::new()?.with_scaling(self.scaling.into());
        let capabilities = if self.software {
            HardwareCapabilities::none()
        } else {
            HardwareCapabilities::detect(&backend)
        };

        let frames = (self.seconds * config.frame_rate.to_f64()).round().max(0.0) as u64;
        let mut pattern =
            TestPattern::new(config.width, config.height, config.frame_rate, self.tone);
        let mut writer = MediaWriter::new(backend, config, capabilities);
        writer
            .open(&self.output, self.format.as_deref(), self.software)
            .with_context(|| format!("failed to open {}", self.output))?;

        let started = Instant::now();
        while pattern.frames_generated() < frames {
            let (frame, audio) = pattern.next_tick()?;
            writer.encode_video_frame(frame)?;
            writer.encode_audio_frame(&audio)?;
        }
        info!(frames, elapsed_ms = started.elapsed().as_millis() as u64, "pattern encoded");

        println!("Output:       {}", writer.destination()?);
        println!(
            "Video:        {} {}x{} @ {}, {} frames",
            writer.video_codec_name()?.unwrap_or("-"),
            writer.width()?,
            writer.height()?,
            writer.frame_rate()?,
            writer.video_frames()?
        );
        match (writer.audio_codec_name()?, writer.sample_rate()?) {
            (Some(name), Some(rate)) => println!(
                "Audio:        {name} {rate} Hz, {} samples",
                writer.audio_samples()?
            ),
            _ => println!("Audio:        -"),
        }

        writer.close()?;
        Ok(())
    }

    /**
        Start from the config file (or defaults) and apply flag overrides.
    */
    fn writer_config(&self) -> Result<WriterConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str::<WriterConfig>(&text)
                    .with_context(|| format!("invalid writer config {}", path.display()))?
            }
            None => WriterConfig::default(),
        };

        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(fps) = self.fps {
            config.frame_rate = fps;
        }
        if let Some(codec) = self.video_codec {
            config.video_codec = codec;
        }
        if let Some(bitrate) = self.video_bitrate {
            config.video_bitrate = bitrate;
        }
        if let Some(codec) = self.audio_codec {
            config.audio_codec = codec;
        }
        if let Some(bitrate) = self.audio_bitrate {
            config.audio_bitrate = bitrate;
        }
        config.validate()?;
        Ok(config)
    }
}

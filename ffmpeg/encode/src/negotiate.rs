/*!
    Encoder negotiation.

    Picks a concrete encoder implementation and the settings it is opened
    with, from the writer configuration, the codec catalog and the detected
    hardware capabilities. Pure decisions: nothing here opens anything.
*/

use ffmpeg_types::{ChannelLayout, CodecId, Error, PixelFormat, Result, SampleFormat};

use crate::backend::{
    AudioEncoderSettings, CodecCatalog, EncoderDescriptor, HardwareFrames, VideoEncoderSettings,
};
use crate::config::{MIN_HARDWARE_DIMENSION, WriterConfig, target_sample_rate};
use crate::hardware::{HardwareCapabilities, HardwareFamily};

/// Frames preallocated for Quick Sync device surfaces.
const QSV_POOL_SIZE: u32 = 32;

/**
    One round of video encoder negotiation.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attempt {
    /// Use a hardware encoder when one is usable.
    HardwarePreferred,
    /// Only consider software encoders.
    SoftwareForced,
}

impl Attempt {
    /**
        Attempts to make, in order. A hardware attempt is followed by one
        software retry.
    */
    pub fn sequence(force_software: bool) -> &'static [Attempt] {
        if force_software {
            &[Attempt::SoftwareForced]
        } else {
            &[Attempt::HardwarePreferred, Attempt::SoftwareForced]
        }
    }
}

/**
    A video encoder and the settings to open it with.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct VideoPlan {
    pub descriptor: EncoderDescriptor,
    pub settings: VideoEncoderSettings,
}

impl VideoPlan {
    /**
        Format frames are staged in before submission. Hardware encoders are
        staged in the software format of their frame pool.
    */
    pub fn staging_format(&self) -> PixelFormat {
        self.settings
            .hardware
            .map_or(self.settings.pixel_format, |hardware| hardware.software_format)
    }
}

/**
    An audio encoder and the settings to open it with.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct AudioPlan {
    pub descriptor: EncoderDescriptor,
    pub settings: AudioEncoderSettings,
}

/**
    Negotiate the video encoder for one attempt.
*/
pub fn plan_video<C: CodecCatalog + ?Sized>(
    catalog: &C,
    codec: CodecId,
    config: &WriterConfig,
    capabilities: &HardwareCapabilities,
    attempt: Attempt,
    global_header: bool,
) -> Result<VideoPlan> {
    let hardware_allowed = attempt == Attempt::HardwarePreferred
        && config.width >= MIN_HARDWARE_DIMENSION
        && config.height >= MIN_HARDWARE_DIMENSION;

    let descriptor = hardware_allowed
        .then(|| capabilities.preferred_encoder(codec))
        .flatten()
        .and_then(|name| catalog.find_encoder_by_name(name))
        .or_else(|| catalog.find_encoder(codec))
        .ok_or_else(|| Error::encoder_not_found(codec.name()))?;

    let target = match HardwareFamily::of_encoder(&descriptor.name) {
        Some(family) if hardware_allowed && codec.is_avc_family() && !descriptor.is_libx() => {
            family.input_format()
        }
        _ => PixelFormat::Yuv420p,
    };
    let pixel_format = prefer(&descriptor.pixel_formats, target);

    let hardware = pixel_format.is_hardware().then(|| HardwareFrames {
        surface: pixel_format,
        software_format: PixelFormat::Nv12,
        width: config.width,
        height: config.height,
        initial_pool_size: (pixel_format == PixelFormat::Qsv).then_some(QSV_POOL_SIZE),
    });

    let bitrate = config.effective_video_bitrate();
    let gop_cap = config.frame_rate.to_f64().round().max(1.0) as u32;
    let preset = (descriptor.is_libx() && codec.is_avc_family()).then_some("ultrafast");

    Ok(VideoPlan {
        settings: VideoEncoderSettings {
            width: config.width,
            height: config.height,
            frame_rate: config.frame_rate,
            time_base: config.frame_rate.invert(),
            pixel_format,
            bitrate,
            gop_cap,
            tolerance_cap: bitrate / 2,
            preset,
            global_header,
            hardware,
        },
        descriptor,
    })
}

/**
    Negotiate the audio encoder.

    Sample format, rate and layout start from the encoder's first declared
    option. Stereo and the destination's target rate win when the encoder
    lists them.
*/
pub fn plan_audio<C: CodecCatalog + ?Sized>(
    catalog: &C,
    codec: CodecId,
    config: &WriterConfig,
    destination: &str,
    global_header: bool,
) -> Result<AudioPlan> {
    let descriptor = catalog
        .find_encoder(codec)
        .ok_or_else(|| Error::encoder_not_found(codec.name()))?;

    let sample_format = descriptor
        .sample_formats
        .first()
        .copied()
        .unwrap_or(SampleFormat::F32p);
    let sample_rate = prefer(&descriptor.sample_rates, target_sample_rate(destination));
    let channels = prefer(&descriptor.channel_layouts, ChannelLayout::Stereo);

    Ok(AudioPlan {
        settings: AudioEncoderSettings {
            sample_format,
            sample_rate,
            channels,
            bitrate: config.effective_audio_bitrate(),
            global_header,
        },
        descriptor,
    })
}

/// First declared option, or `target` when it is declared (or nothing is).
fn prefer<T: Copy + PartialEq>(declared: &[T], target: T) -> T {
    match declared.first() {
        Some(&first) if !declared.contains(&target) => first,
        _ => target,
    }
}

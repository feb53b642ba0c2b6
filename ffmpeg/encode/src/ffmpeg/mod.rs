/*!
    Encode backend over libavcodec and libavformat.
*/

use ffmpeg_next::{
    Codec,
    codec::{self, Capabilities},
    encoder, ffi,
};
use tracing::debug;

use ffmpeg_sink::Sink;
use ffmpeg_sink::ffmpeg::{codec_id_from_ffmpeg, codec_id_to_ffmpeg};
use ffmpeg_transform::ffmpeg::{
    FfmpegResampling, FfmpegScaling, pixel_format_from_ffmpeg, sample_format_from_ffmpeg,
};
use ffmpeg_types::{ChannelLayout, CodecId, Error, Packet, PixelFormat, Result};

use crate::backend::{
    AudioEncoderSettings, Backend, CodecCatalog, EncoderDescriptor, Poll, VideoEncoderSettings,
};

mod audio;
mod container;
mod device;
mod video;

pub use audio::FfmpegAudioEncoder;
pub use ffmpeg_transform::ffmpeg::ScalingAlgorithm;
pub use device::HardwareDevice;
pub use video::FfmpegVideoEncoder;

/**
    The FFmpeg encode backend.

    Writes through [`Sink`], encodes with libavcodec and converts with
    libswscale and libswresample.
*/
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegBackend {
    scaling: FfmpegScaling,
}

impl FfmpegBackend {
    /**
        Initialize FFmpeg and create a backend.
    */
    pub fn new() -> Result<Self> {
        ffmpeg_next::init().map_err(|e| Error::codec(e.to_string()))?;
        Ok(Self::default())
    }

    /**
        Set the scaling filter used for video conversion.
    */
    pub fn with_scaling(mut self, algorithm: ScalingAlgorithm) -> Self {
        self.scaling.algorithm = algorithm;
        self
    }
}

impl CodecCatalog for FfmpegBackend {
    fn find_encoder(&self, codec: CodecId) -> Option<EncoderDescriptor> {
        let id = codec_id_to_ffmpeg(codec).ok()?;
        encoder::find(id).and_then(describe)
    }

    fn find_encoder_by_name(&self, name: &str) -> Option<EncoderDescriptor> {
        encoder::find_by_name(name).and_then(describe)
    }
}

impl Backend for FfmpegBackend {
    type VideoEncoder = FfmpegVideoEncoder;
    type AudioEncoder = FfmpegAudioEncoder;
    type Container = Sink;
    type Device = HardwareDevice;
    type Scaling = FfmpegScaling;
    type Resampling = FfmpegResampling;

    fn open_container(&self, destination: &str, format: Option<&str>) -> Result<Sink> {
        Sink::open(destination, format)
    }

    fn create_device(&self, surface: PixelFormat) -> Result<HardwareDevice> {
        HardwareDevice::create(surface)
    }

    fn open_video_encoder(
        &self,
        descriptor: &EncoderDescriptor,
        settings: &VideoEncoderSettings,
        device: Option<&HardwareDevice>,
    ) -> Result<FfmpegVideoEncoder> {
        FfmpegVideoEncoder::open(descriptor, settings, device)
    }

    fn open_audio_encoder(
        &self,
        descriptor: &EncoderDescriptor,
        settings: &AudioEncoderSettings,
    ) -> Result<FfmpegAudioEncoder> {
        FfmpegAudioEncoder::open(descriptor, settings)
    }

    fn scaling(&self) -> FfmpegScaling {
        self.scaling
    }

    fn resampling(&self) -> FfmpegResampling {
        FfmpegResampling
    }
}

/**
    Describe an encoder from what libavcodec declares about it.
*/
fn describe(codec: Codec) -> Option<EncoderDescriptor> {
    let id = codec_id_from_ffmpeg(codec.id())?;

    let mut descriptor = if let Ok(video) = codec.video() {
        let formats = video
            .formats()
            .map(|formats| formats.filter_map(pixel_format_from_ffmpeg).collect())
            .unwrap_or_default();
        EncoderDescriptor::video(codec.name(), id, formats)
    } else if let Ok(audio) = codec.audio() {
        let formats = audio
            .formats()
            .map(|formats| formats.filter_map(sample_format_from_ffmpeg).collect())
            .unwrap_or_default();
        let rates = audio
            .rates()
            .map(|rates| rates.filter_map(|rate| u32::try_from(rate).ok()).collect())
            .unwrap_or_default();
        let layouts = audio
            .ch_layouts()
            .map(|layouts| {
                layouts
                    .filter_map(|layout| {
                        let count = u16::try_from(layout.channels()).ok()?;
                        let ours = ChannelLayout::from_count(count);
                        (ours.channels() == count).then_some(ours)
                    })
                    .collect()
            })
            .unwrap_or_default();
        EncoderDescriptor::audio(codec.name(), id, formats, rates, layouts)
    } else {
        return None;
    };

    let capabilities = codec.capabilities();
    descriptor.variable_frame_size = capabilities.contains(Capabilities::VARIABLE_FRAME_SIZE);
    descriptor.small_last_frame = capabilities.contains(Capabilities::SMALL_LAST_FRAME);
    debug!(?descriptor, "found encoder");
    Some(descriptor)
}

/**
    Pull one packet out of an opened encoder.
*/
fn receive(encoder: &mut encoder::Encoder) -> Result<Poll> {
    let mut packet = ffmpeg_next::Packet::empty();
    match encoder.receive_packet(&mut packet) {
        Ok(()) => Ok(Poll::Packet(Packet {
            data: packet.data().map(<[u8]>::to_vec).unwrap_or_default(),
            pts: packet.pts(),
            dts: packet.dts(),
            duration: packet.duration(),
            stream_index: 0,
            is_keyframe: packet.is_key(),
        })),
        Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => Ok(Poll::NeedsInput),
        Err(ffmpeg_next::Error::Eof) => Ok(Poll::EndOfStream),
        Err(e) => Err(Error::codec(format!("failed to receive packet: {e}"))),
    }
}

/**
    Apply the settings shared by video and audio encoders before opening.
*/
fn apply_common(encoder: &mut encoder::Encoder, bitrate: u64, global_header: bool) {
    encoder.set_bit_rate(bitrate as usize);
    if global_header {
        encoder.set_flags(codec::Flags::GLOBAL_HEADER);
    }
}

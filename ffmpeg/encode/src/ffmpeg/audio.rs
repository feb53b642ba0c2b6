/*!
    Audio encoder over libavcodec.
*/

use ffmpeg_next::{
    Codec, Rational as FFmpegRational,
    codec::{self, encoder::Audio as AudioEncoderFFmpeg},
    encoder,
    util::frame::audio::Audio as AudioFrameFFmpeg,
};

use ffmpeg_transform::ffmpeg::{channel_layout_to_ffmpeg, sample_format_to_ffmpeg};
use ffmpeg_types::{AudioFrame, Error, Rational, Result};

use crate::backend::{AudioEncoderSettings, AudioEncoding, EncoderDescriptor, PacketSource, Poll};

use super::{apply_common, receive};

/**
    An opened libavcodec audio encoder.
*/
pub struct FfmpegAudioEncoder {
    encoder: AudioEncoderFFmpeg,
    codec: Codec,
    name: String,
    settings: AudioEncoderSettings,
}

impl FfmpegAudioEncoder {
    pub(crate) fn open(
        descriptor: &EncoderDescriptor,
        settings: &AudioEncoderSettings,
    ) -> Result<Self> {
        let codec = encoder::find_by_name(&descriptor.name)
            .ok_or_else(|| Error::encoder_not_found(descriptor.name.clone()))?;

        let mut encoder = codec::context::Context::new_with_codec(codec)
            .encoder()
            .audio()
            .map_err(|e| Error::codec(e.to_string()))?;

        encoder.set_format(sample_format_to_ffmpeg(settings.sample_format)?);
        encoder.set_rate(settings.sample_rate as i32);
        encoder.set_channel_layout(channel_layout_to_ffmpeg(settings.channels));
        encoder.set_time_base(FFmpegRational::new(1, settings.sample_rate as i32));
        encoder.compliance(codec::Compliance::Experimental);
        apply_common(&mut encoder, settings.bitrate, settings.global_header);

        let encoder = encoder
            .open()
            .map_err(|e| Error::codec(format!("failed to open {}: {e}", descriptor.name)))?;

        Ok(Self {
            encoder,
            codec,
            name: descriptor.name.clone(),
            settings: settings.clone(),
        })
    }

    pub(crate) fn codec(&self) -> Codec {
        self.codec
    }

    pub(crate) fn context(&self) -> &AudioEncoderFFmpeg {
        &self.encoder
    }
}

impl PacketSource for FfmpegAudioEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn time_base(&self) -> Rational {
        Rational::new(1, self.settings.sample_rate as i32)
    }

    fn send_eof(&mut self) -> Result<()> {
        self.encoder
            .send_eof()
            .map_err(|e| Error::codec(format!("failed to flush {}: {e}", self.name)))
    }

    fn receive_packet(&mut self) -> Result<Poll> {
        receive(&mut self.encoder)
    }
}

impl AudioEncoding for FfmpegAudioEncoder {
    fn send_frame(&mut self, frame: &AudioFrame, pts: i64) -> Result<()> {
        let mut ffmpeg_frame = AudioFrameFFmpeg::new(
            sample_format_to_ffmpeg(self.settings.sample_format)?,
            frame.samples(),
            channel_layout_to_ffmpeg(self.settings.channels),
        );
        ffmpeg_frame.set_rate(self.settings.sample_rate);

        for (index, plane) in frame.planes().into_iter().enumerate() {
            let dst = ffmpeg_frame.data_mut(index);
            if dst.len() < plane.len() {
                return Err(Error::invalid_data(format!(
                    "audio plane {index} holds {} bytes, need {}",
                    dst.len(),
                    plane.len()
                )));
            }
            dst[..plane.len()].copy_from_slice(plane);
        }
        ffmpeg_frame.set_pts(Some(pts));

        self.encoder
            .send_frame(&ffmpeg_frame)
            .map_err(|e| Error::codec(format!("failed to encode audio frame: {e}")))
    }

    fn frame_size(&self) -> Option<usize> {
        match self.encoder.frame_size() {
            0 => None,
            size => Some(size as usize),
        }
    }
}

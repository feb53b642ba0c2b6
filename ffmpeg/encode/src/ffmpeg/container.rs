use ffmpeg_sink::Sink;
use ffmpeg_types::{CodecId, Error, Packet, Rational, Result};

use crate::backend::{AudioEncoderSettings, Container, VideoEncoderSettings};

use super::{FfmpegAudioEncoder, FfmpegVideoEncoder};

impl Container for Sink {
    type VideoEncoder = FfmpegVideoEncoder;
    type AudioEncoder = FfmpegAudioEncoder;

    fn default_video_codec(&self) -> Result<Option<CodecId>> {
        Sink::default_video_codec(self)
    }

    fn default_audio_codec(&self) -> Result<Option<CodecId>> {
        Sink::default_audio_codec(self)
    }

    fn requires_global_header(&self) -> bool {
        Sink::requires_global_header(self)
    }

    fn add_video_stream(
        &mut self,
        encoder: &FfmpegVideoEncoder,
        settings: &VideoEncoderSettings,
    ) -> Result<usize> {
        self.add_stream(
            encoder.codec(),
            encoder.context(),
            settings.time_base,
            Some(settings.frame_rate),
        )
    }

    fn add_audio_stream(
        &mut self,
        encoder: &FfmpegAudioEncoder,
        settings: &AudioEncoderSettings,
    ) -> Result<usize> {
        self.add_stream(
            encoder.codec(),
            encoder.context(),
            Rational::new(1, settings.sample_rate as i32),
            None,
        )
    }

    fn write_header(&mut self) -> Result<()> {
        Sink::write_header(self)
    }

    fn stream_time_base(&self, stream: usize) -> Result<Rational> {
        Sink::stream_time_base(self, stream)
            .ok_or_else(|| Error::invalid_data(format!("no stream {stream}")))
    }

    fn write_interleaved(&mut self, packet: Packet) -> Result<()> {
        self.write(&packet)
    }

    fn write_trailer(&mut self) -> Result<()> {
        Sink::write_trailer(self)
    }
}

/*!
    Media sink implementation.
*/

use ffmpeg_next::{
    Codec, Rational as FFmpegRational, codec, codec::Parameters, format,
    format::context::Output as OutputContext,
};
use tracing::debug;

use ffmpeg_types::{CodecId, Error, Packet, Rational, Result};

use crate::catalog::FormatInfo;
use crate::ffmpeg::{codec_id_from_ffmpeg, describe};

/**
    Media sink for writing to a container.

    Takes encoded packets and writes them into a container format (MP4, MKV,
    FLV, ...). The destination may be a file path or any URL FFmpeg's I/O
    layer understands.

    The lifecycle is: [`Sink::open`], one [`Sink::add_stream`] per encoder,
    [`Sink::write_header`], any number of [`Sink::write`], then
    [`Sink::write_trailer`]. Dropping the sink closes the destination.
*/
pub struct Sink {
    output: OutputContext,
    destination: String,
    header_written: bool,
}

impl Sink {
    /**
        Open a destination for writing.

        The container format is taken from `format` when given, otherwise
        guessed from the destination name.
    */
    pub fn open(destination: &str, format: Option<&str>) -> Result<Self> {
        ffmpeg_next::init().map_err(|e| Error::io(e.to_string()))?;

        let output = match format {
            Some(format) => format::output_as(destination, format),
            None => format::output(destination),
        }
        .map_err(|e| Error::io(format!("failed to open {destination}: {e}")))?;

        debug!(destination, format = output.format().name(), "opened output");

        Ok(Self {
            output,
            destination: destination.to_owned(),
            header_written: false,
        })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /**
        Describe the container format being written.
    */
    pub fn format_info(&self) -> FormatInfo {
        // SAFETY: the output context always carries a valid muxer.
        unsafe { describe(self.output.format().as_ptr()) }
    }

    /**
        Codec the container uses for video when none is requested.

        `Ok(None)` means the container has no default. A default with no
        [`CodecId`] counterpart is an unsupported-format error.
    */
    pub fn default_video_codec(&self) -> Result<Option<CodecId>> {
        // SAFETY: the output context always carries a valid muxer.
        let id = unsafe { (*self.output.format().as_ptr()).video_codec };
        self.map_default(id.into(), "video")
    }

    /**
        Codec the container uses for audio when none is requested.
    */
    pub fn default_audio_codec(&self) -> Result<Option<CodecId>> {
        // SAFETY: the output context always carries a valid muxer.
        let id = unsafe { (*self.output.format().as_ptr()).audio_codec };
        self.map_default(id.into(), "audio")
    }

    fn map_default(&self, id: codec::Id, medium: &str) -> Result<Option<CodecId>> {
        if id == codec::Id::None {
            return Ok(None);
        }
        codec_id_from_ffmpeg(id).map(Some).ok_or_else(|| {
            Error::unsupported_format(format!(
                "default {medium} codec {id:?} of {} is not supported",
                self.destination
            ))
        })
    }

    /**
        Returns true if encoders must put codec headers in extradata instead
        of in-band.
    */
    pub fn requires_global_header(&self) -> bool {
        self.output
            .format()
            .flags()
            .contains(format::Flags::GLOBAL_HEADER)
    }

    /**
        Add a stream for an opened encoder and return its index.

        The stream copies the encoder's parameters. The time base is only a
        request; the muxer may pick another when the header is written.
    */
    pub fn add_stream<P: Into<Parameters>>(
        &mut self,
        codec: Codec,
        parameters: P,
        time_base: Rational,
        frame_rate: Option<Rational>,
    ) -> Result<usize> {
        if self.header_written {
            return Err(Error::invalid_data("cannot add streams after the header"));
        }

        let mut stream = self
            .output
            .add_stream(codec)
            .map_err(|e| Error::io(format!("failed to add stream: {}", e)))?;

        stream.set_parameters(parameters);
        stream.set_time_base(FFmpegRational::new(time_base.num, time_base.den));
        if let Some(rate) = frame_rate {
            let rate = FFmpegRational::new(rate.num, rate.den);
            stream.set_avg_frame_rate(rate);
            stream.set_rate(rate);
        }

        Ok(stream.index())
    }

    /**
        Write the container header. Stream time bases are final afterwards.
    */
    pub fn write_header(&mut self) -> Result<()> {
        self.output
            .write_header()
            .map_err(|e| Error::io(format!("failed to write header: {}", e)))?;
        self.header_written = true;

        for stream in self.output.streams() {
            debug!(
                index = stream.index(),
                time_base = %stream.time_base(),
                "stream ready"
            );
        }
        Ok(())
    }

    /**
        Time base of a stream, as chosen by the muxer.
    */
    pub fn stream_time_base(&self, index: usize) -> Option<Rational> {
        self.output.stream(index).map(|stream| {
            let tb = stream.time_base();
            Rational::new(tb.numerator(), tb.denominator())
        })
    }

    /**
        Write a packet whose timestamps are already in its stream's time base.

        Packets go through FFmpeg's interleaving queue, so audio and video
        may be submitted in any relative order.
    */
    pub fn write(&mut self, packet: &Packet) -> Result<()> {
        if !self.header_written {
            return Err(Error::invalid_data("header not written"));
        }

        // Create FFmpeg packet
        let mut ffmpeg_pkt = if packet.data.is_empty() {
            ffmpeg_next::Packet::empty()
        } else {
            ffmpeg_next::Packet::copy(&packet.data)
        };

        ffmpeg_pkt.set_stream(packet.stream_index);
        ffmpeg_pkt.set_pts(packet.pts);
        ffmpeg_pkt.set_dts(packet.dts);
        ffmpeg_pkt.set_duration(packet.duration);

        if packet.is_keyframe {
            ffmpeg_pkt.set_flags(ffmpeg_next::packet::Flags::KEY);
        }

        ffmpeg_pkt
            .write_interleaved(&mut self.output)
            .map_err(|e| Error::io(format!("failed to write packet: {}", e)))
    }

    /**
        Finish the container.

        This writes any trailing metadata (duration, seeking index). The file
        may be corrupt if this is not called.
    */
    pub fn write_trailer(&mut self) -> Result<()> {
        if !self.header_written {
            return Err(Error::invalid_data("header not written"));
        }
        self.output
            .write_trailer()
            .map_err(|e| Error::io(format!("failed to write trailer: {}", e)))
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink")
            .field("destination", &self.destination)
            .field("header_written", &self.header_written)
            .finish_non_exhaustive()
    }
}

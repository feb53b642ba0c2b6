/*!
    The encode session.

    A [`MediaWriter`] owns one output container and up to two encoders. Raw
    frames go in, get converted to whatever the encoder needs, and the packets
    coming out are interleaved into the container.
*/

use tracing::{debug, info, warn};

use ffmpeg_transform::{ImageShape, Resampler, Scaler};
use ffmpeg_types::{AudioFrame, CodecId, Error, Rational, Result, VideoFrame};

use crate::backend::{
    AudioEncoderSettings, AudioEncoding, Backend, Container, PacketSource, Poll, VideoEncoding,
};
use crate::config::{ASSUMED_AUDIO_INPUT, AUDIO_GUARD_SAMPLES, VARIABLE_FRAME_SAMPLES, WriterConfig};
use crate::hardware::HardwareCapabilities;
use crate::negotiate::{self, Attempt};

/**
    Media writer.

    Encodes raw video and audio frames into a container written to a file or
    network destination.

    The writer is closed until [`MediaWriter::open`] succeeds. Frames pushed
    while closed are ignored. [`MediaWriter::close`] flushes both encoders
    and finalizes the container; it is also run when the writer is dropped.

    A writer is not meant to be shared between threads without external
    locking.
*/
pub struct MediaWriter<B: Backend> {
    backend: B,
    config: WriterConfig,
    capabilities: HardwareCapabilities,
    session: Option<Session<B>>,
}

/// State of an open session. Tracks drop before the container.
struct Session<B: Backend> {
    destination: String,
    video: Option<VideoTrack<B>>,
    audio: Option<AudioTrack<B>>,
    container: B::Container,
}

struct VideoTrack<B: Backend> {
    encoder: B::VideoEncoder,
    /// Keeps the hardware device alive until the encoder is gone.
    _device: Option<B::Device>,
    stream: usize,
    /// Frame in the encoder's software input format.
    staging: VideoFrame,
    scaler: Scaler<B::Scaling>,
    next_pts: i64,
    frames: u64,
}

struct AudioTrack<B: Backend> {
    encoder: B::AudioEncoder,
    stream: usize,
    settings: AudioEncoderSettings,
    /// Accumulates converted samples until a whole encoder frame is ready.
    staging: AudioFrame,
    resampler: Resampler<B::Resampling>,
    next_pts: i64,
    samples: u64,
    variable_frame_size: bool,
    small_last_frame: bool,
}

impl<B: Backend> MediaWriter<B> {
    /**
        Create a closed writer.

        `capabilities` decides whether hardware encoders are tried; pass
        [`HardwareCapabilities::none`] to always encode in software.
    */
    pub fn new(backend: B, config: WriterConfig, capabilities: HardwareCapabilities) -> Self {
        Self {
            backend,
            config,
            capabilities,
            session: None,
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /**
        Open a session writing to `destination`.

        The container format is inferred from the destination unless `format`
        names one. A session that is already open is closed first. If a
        hardware video encoder fails to open, negotiation is retried once in
        software unless `force_software` is set.

        On failure the writer stays closed and every resource acquired so far
        is released.
    */
    pub fn open(
        &mut self,
        destination: &str,
        format: Option<&str>,
        force_software: bool,
    ) -> Result<()> {
        if let Err(err) = self.close() {
            warn!(%err, "failed to close previous session");
        }
        self.config.validate()?;

        let mut container = self.backend.open_container(destination, format)?;
        let global_header = container.requires_global_header();

        let video_codec = self.config.video_codec.resolve(|| container.default_video_codec())?;
        let audio_codec = self.config.audio_codec.resolve(|| container.default_audio_codec())?;

        let video = match video_codec {
            Some(codec) => {
                Some(self.open_video(&mut container, codec, global_header, force_software)?)
            }
            None => None,
        };
        let audio = match audio_codec {
            Some(codec) => {
                Some(self.open_audio(&mut container, codec, destination, global_header)?)
            }
            None => None,
        };

        container.write_header()?;

        info!(
            destination,
            video = video.as_ref().map(|track| track.encoder.name()),
            audio = audio.as_ref().map(|track| track.encoder.name()),
            "opened media writer"
        );
        self.session = Some(Session {
            destination: destination.to_owned(),
            video,
            audio,
            container,
        });
        Ok(())
    }

    fn open_video(
        &self,
        container: &mut B::Container,
        codec: CodecId,
        global_header: bool,
        force_software: bool,
    ) -> Result<VideoTrack<B>> {
        let mut attempts = Attempt::sequence(force_software).iter().copied().peekable();
        while let Some(attempt) = attempts.next() {
            let plan = match negotiate::plan_video(
                &self.backend,
                codec,
                &self.config,
                &self.capabilities,
                attempt,
                global_header,
            ) {
                Ok(plan) => plan,
                Err(err) if attempts.peek().is_some() => {
                    warn!(%err, ?attempt, "video negotiation failed, retrying in software");
                    continue;
                }
                Err(err) => return Err(err),
            };

            let opened = self.open_video_encoder(&plan);
            let (encoder, device) = match opened {
                Ok(opened) => opened,
                Err(err) if attempts.peek().is_some() => {
                    warn!(
                        %err,
                        encoder = %plan.descriptor.name,
                        "video encoder failed to open, retrying in software"
                    );
                    continue;
                }
                Err(err) => return Err(err),
            };

            let stream = container.add_video_stream(&encoder, &plan.settings)?;
            info!(
                encoder = encoder.name(),
                width = plan.settings.width,
                height = plan.settings.height,
                pixel_format = %plan.settings.pixel_format,
                frame_rate = %plan.settings.frame_rate,
                bitrate = plan.settings.bitrate,
                hardware = plan.settings.hardware.is_some(),
                "opened video encoder"
            );
            return Ok(VideoTrack {
                encoder,
                _device: device,
                stream,
                staging: VideoFrame::new(
                    plan.settings.width,
                    plan.settings.height,
                    plan.staging_format(),
                ),
                scaler: Scaler::new(self.backend.scaling()),
                next_pts: 0,
                frames: 0,
            });
        }
        Err(Error::encoder_not_found(codec.name()))
    }

    fn open_video_encoder(
        &self,
        plan: &negotiate::VideoPlan,
    ) -> Result<(B::VideoEncoder, Option<B::Device>)> {
        let device = match &plan.settings.hardware {
            Some(hardware) => Some(self.backend.create_device(hardware.surface)?),
            None => None,
        };
        let encoder =
            self.backend.open_video_encoder(&plan.descriptor, &plan.settings, device.as_ref())?;
        Ok((encoder, device))
    }

    fn open_audio(
        &self,
        container: &mut B::Container,
        codec: CodecId,
        destination: &str,
        global_header: bool,
    ) -> Result<AudioTrack<B>> {
        let plan =
            negotiate::plan_audio(&self.backend, codec, &self.config, destination, global_header)?;
        let encoder = self.backend.open_audio_encoder(&plan.descriptor, &plan.settings)?;
        let stream = container.add_audio_stream(&encoder, &plan.settings)?;

        let mut resampler = Resampler::new(self.backend.resampling());
        resampler.prepare(ASSUMED_AUDIO_INPUT, plan.settings.shape())?;

        let variable_frame_size =
            plan.descriptor.variable_frame_size || encoder.frame_size().is_none();
        let capacity = match encoder.frame_size() {
            Some(frame_size) if !variable_frame_size => frame_size,
            _ => VARIABLE_FRAME_SAMPLES,
        };
        info!(
            encoder = encoder.name(),
            sample_format = %plan.settings.sample_format,
            sample_rate = plan.settings.sample_rate,
            channels = %plan.settings.channels,
            bitrate = plan.settings.bitrate,
            frame_size = capacity,
            "opened audio encoder"
        );
        Ok(AudioTrack {
            stream,
            staging: AudioFrame::with_capacity(
                plan.settings.sample_rate,
                plan.settings.channels,
                plan.settings.sample_format,
                capacity,
            ),
            settings: plan.settings,
            resampler,
            next_pts: 0,
            samples: 0,
            variable_frame_size,
            small_last_frame: plan.descriptor.small_last_frame,
            encoder,
        })
    }

    /**
        Encode one video frame.

        The frame is converted to the encoder's geometry and format when it
        differs. A frame that cannot be converted is skipped with a warning.
        Does nothing if the writer is closed, has no video track, or the frame
        is empty.
    */
    pub fn encode_video_frame(&mut self, frame: &VideoFrame) -> Result<()> {
        let Some(Session { video: Some(track), container, .. }) = self.session.as_mut() else {
            return Ok(());
        };
        if frame.is_empty() {
            return Ok(());
        }

        let input = if ImageShape::of(frame) == ImageShape::of(&track.staging) {
            frame
        } else if track.scaler.convert_frame(frame, &mut track.staging) {
            &track.staging
        } else {
            warn!(
                width = frame.width(),
                height = frame.height(),
                format = %frame.format(),
                "skipping video frame that could not be converted"
            );
            return Ok(());
        };

        track.encoder.send_frame(input, track.next_pts)?;
        track.next_pts += 1;
        track.frames += 1;
        drain(&mut track.encoder, container, track.stream, false)
    }

    /**
        Encode a block of audio samples.

        Samples are resampled into the encoder's shape and accumulated until
        a whole encoder frame is available. One call may submit zero, one or
        several encoder frames. Does nothing if the writer is closed, has no
        audio track, or the frame is empty.
    */
    pub fn encode_audio_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        let Some(Session { audio: Some(track), container, .. }) = self.session.as_mut() else {
            return Ok(());
        };
        if frame.is_empty() {
            return Ok(());
        }

        let mut input = Some(frame);
        loop {
            let draining = input.is_none();
            let produced = track.resampler.convert_frame(input.take(), &mut track.staging)?;
            if track.frame_ready() {
                track.submit(container)?;
            }
            if draining && produced == 0 {
                return Ok(());
            }
            let wanted = track.staging.capacity() + AUDIO_GUARD_SAMPLES;
            if track.resampler.delay(track.settings.sample_rate) < wanted as i64 {
                return Ok(());
            }
        }
    }

    /**
        Flush both encoders and finalize the container.

        Closing a closed writer does nothing. Every step is attempted even if
        an earlier one fails; the first error is returned.
    */
    pub fn close(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        let mut first_error = None;
        let mut check = |step: &str, result: Result<()>| {
            if let Err(err) = result {
                warn!(%err, step, "error while closing media writer");
                first_error.get_or_insert(err);
            }
        };

        let Session {
            destination,
            video,
            audio,
            container,
        } = &mut session;

        if let Some(track) = audio {
            check("audio tail", track.flush_tail(container));
            check("audio flush", flush(&mut track.encoder, container, track.stream));
        }
        if let Some(track) = video {
            check("video flush", flush(&mut track.encoder, container, track.stream));
        }
        if video.is_some() || audio.is_some() {
            check("trailer", container.write_trailer());
        }

        info!(
            destination = destination.as_str(),
            video_frames = video.as_ref().map_or(0, |track| track.frames),
            audio_samples = audio.as_ref().map_or(0, |track| track.samples),
            "closed media writer"
        );
        drop(session);

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn session(&self) -> Result<&Session<B>> {
        self.session.as_ref().ok_or(Error::NotOpen)
    }

    pub fn destination(&self) -> Result<&str> {
        Ok(&self.session()?.destination)
    }

    /**
        Name of the negotiated video encoder, `None` without a video track.
    */
    pub fn video_codec_name(&self) -> Result<Option<&str>> {
        Ok(self.session()?.video.as_ref().map(|track| track.encoder.name()))
    }

    /**
        Name of the negotiated audio encoder, `None` without an audio track.
    */
    pub fn audio_codec_name(&self) -> Result<Option<&str>> {
        Ok(self.session()?.audio.as_ref().map(|track| track.encoder.name()))
    }

    /// Video frames submitted to the encoder so far.
    pub fn video_frames(&self) -> Result<u64> {
        Ok(self.session()?.video.as_ref().map_or(0, |track| track.frames))
    }

    /// Audio samples (per channel, at the encoder rate) submitted so far.
    pub fn audio_samples(&self) -> Result<u64> {
        Ok(self.session()?.audio.as_ref().map_or(0, |track| track.samples))
    }

    pub fn width(&self) -> Result<u32> {
        self.session()?;
        Ok(self.config.width)
    }

    pub fn height(&self) -> Result<u32> {
        self.session()?;
        Ok(self.config.height)
    }

    pub fn frame_rate(&self) -> Result<Rational> {
        self.session()?;
        Ok(self.config.frame_rate)
    }

    /**
        Negotiated audio sample rate, `None` without an audio track.
    */
    pub fn sample_rate(&self) -> Result<Option<u32>> {
        Ok(self
            .session()?
            .audio
            .as_ref()
            .map(|track| track.settings.sample_rate))
    }
}

impl<B: Backend> AudioTrack<B> {
    fn frame_ready(&self) -> bool {
        let buffered = self.staging.samples();
        if self.variable_frame_size {
            buffered > 0
        } else {
            buffered == self.staging.capacity()
        }
    }

    fn submit(&mut self, container: &mut B::Container) -> Result<()> {
        let samples = self.staging.samples();
        self.encoder.send_frame(&self.staging, self.next_pts)?;
        self.next_pts += samples as i64;
        self.samples += samples as u64;
        self.staging.set_samples(0)?;
        drain(&mut self.encoder, container, self.stream, false)
    }

    /**
        Submit samples still buffered in the resampler. A short final frame is
        only submitted if the encoder accepts one.
    */
    fn flush_tail(&mut self, container: &mut B::Container) -> Result<()> {
        loop {
            self.resampler.convert_frame(None, &mut self.staging)?;
            let buffered = self.staging.samples();
            if buffered == 0 {
                return Ok(());
            }
            let full = buffered == self.staging.capacity();
            if !full && !self.variable_frame_size && !self.small_last_frame {
                debug!(samples = buffered, "dropping audio tail shorter than a frame");
                return Ok(());
            }
            self.submit(container)?;
            if !full {
                return Ok(());
            }
        }
    }
}

/**
    Signal end of stream and drain everything the encoder still holds.
*/
fn flush<E, C>(encoder: &mut E, container: &mut C, stream: usize) -> Result<()>
where
    E: PacketSource,
    C: Container,
{
    encoder.send_eof()?;
    drain(encoder, container, stream, true)
}

/**
    Write every packet the encoder has ready.

    Packets are rescaled from the encoder time base to the stream time base.
    During the end-of-stream flush, packets without a duration last one
    encoder tick.
*/
fn drain<E, C>(encoder: &mut E, container: &mut C, stream: usize, flushing: bool) -> Result<()>
where
    E: PacketSource,
    C: Container,
{
    let stream_time_base = container.stream_time_base(stream)?;
    loop {
        match encoder.receive_packet()? {
            Poll::Packet(mut packet) => {
                if flushing && packet.duration == 0 {
                    packet.duration = 1;
                }
                packet.rescale(encoder.time_base(), stream_time_base);
                packet.stream_index = stream;
                container.write_interleaved(packet)?;
            }
            Poll::NeedsInput | Poll::EndOfStream => return Ok(()),
        }
    }
}

impl<B: Backend> Drop for MediaWriter<B> {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("media writer dropped while open, closing");
            if let Err(err) = self.close() {
                warn!(%err, "failed to close media writer on drop");
            }
        }
    }
}

impl<B: Backend> std::fmt::Debug for MediaWriter<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaWriter")
            .field("config", &self.config)
            .field("capabilities", &self.capabilities)
            .field(
                "destination",
                &self.session.as_ref().map(|session| session.destination.as_str()),
            )
            .finish_non_exhaustive()
    }
}

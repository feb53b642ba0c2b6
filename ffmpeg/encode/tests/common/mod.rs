//! Recording fakes for driving a `MediaWriter` without FFmpeg.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ffmpeg_encode::backend::{
    AudioEncoderSettings, AudioEncoding, Backend, CodecCatalog, Container, EncoderDescriptor,
    PacketSource, Poll, VideoEncoderSettings, VideoEncoding,
};
use ffmpeg_encode::{HardwareFamily, WriterConfig};
use ffmpeg_transform::{
    AudioShape, ImageShape, ResampleEngine, ResampleEngineFactory, ScaleEngine,
    ScaleEngineFactory,
};
use ffmpeg_types::{
    AudioFrame, ChannelLayout, CodecId, Error, Packet, PixelFormat, Rational, Result,
    SampleFormat, VideoFrame,
};

/// Stream time base the fake container assigns to video streams.
pub const VIDEO_STREAM_TIME_BASE: Rational = Rational::new(1, 90000);

/// Everything the fakes observed, plus switches tests flip to inject failures.
#[derive(Debug, Default)]
pub struct Log {
    pub destinations: Vec<String>,
    pub headers: usize,
    pub trailers: usize,
    pub containers_closed: usize,
    pub packets: Vec<Packet>,
    /// (pts, format, width, height) of every submitted video frame.
    pub video_frames: Vec<(i64, PixelFormat, u32, u32)>,
    /// (pts, samples) of every submitted audio frame.
    pub audio_frames: Vec<(i64, usize)>,
    pub video_settings: Vec<VideoEncoderSettings>,
    pub audio_settings: Vec<AudioEncoderSettings>,
    pub opened_encoders: Vec<String>,
    pub devices_created: usize,
    pub devices_released: usize,
    pub scalers_built: usize,
    pub resamplers_built: usize,
    /// Encoder names that fail to open.
    pub failing_encoders: Vec<String>,
    pub fail_container: bool,
    pub fail_header: bool,
}

pub type SharedLog = Rc<RefCell<Log>>;

impl Log {
    pub fn packets_for(&self, stream: usize) -> Vec<&Packet> {
        self.packets
            .iter()
            .filter(|packet| packet.stream_index == stream)
            .collect()
    }

    pub fn audio_samples(&self) -> usize {
        self.audio_frames.iter().map(|(_, samples)| samples).sum()
    }
}

/// A fake media library.
#[derive(Clone)]
pub struct FakeBackend {
    pub log: SharedLog,
    pub encoders: Vec<EncoderDescriptor>,
    pub default_video: Option<CodecId>,
    pub default_audio: Option<CodecId>,
    /// Native video default with no `CodecId` counterpart, like FLV's `flv1`.
    pub unmapped_video: Option<&'static str>,
    pub global_header: bool,
    /// Frames a video encoder holds before emitting packets.
    pub video_latency: usize,
}

impl FakeBackend {
    pub fn new() -> Self {
        let aac = EncoderDescriptor {
            small_last_frame: true,
            ..EncoderDescriptor::audio(
                "aac",
                CodecId::Aac,
                vec![SampleFormat::F32p],
                vec![96000, 48000, 44100],
                Vec::new(),
            )
        };
        let flac = EncoderDescriptor {
            variable_frame_size: true,
            ..EncoderDescriptor::audio(
                "flac",
                CodecId::Flac,
                vec![SampleFormat::S16],
                Vec::new(),
                Vec::new(),
            )
        };
        Self {
            log: SharedLog::default(),
            encoders: vec![
                EncoderDescriptor::video(
                    "libx264",
                    CodecId::H264,
                    vec![PixelFormat::Yuv420p, PixelFormat::Nv12],
                ),
                EncoderDescriptor::video(
                    "h264_nvenc",
                    CodecId::H264,
                    vec![
                        PixelFormat::Yuv420p,
                        PixelFormat::Nv12,
                        PixelFormat::Cuda,
                        PixelFormat::D3d11,
                    ],
                ),
                EncoderDescriptor::video(
                    "hevc_nvenc",
                    CodecId::H265,
                    vec![PixelFormat::Nv12, PixelFormat::Cuda, PixelFormat::D3d11],
                ),
                EncoderDescriptor::video("libvpx-vp9", CodecId::Vp9, vec![PixelFormat::Yuv420p]),
                aac,
                EncoderDescriptor::audio(
                    "libopus",
                    CodecId::Opus,
                    vec![SampleFormat::F32],
                    vec![48000, 24000, 16000],
                    vec![ChannelLayout::Stereo, ChannelLayout::Mono],
                ),
                flac,
            ],
            default_video: Some(CodecId::H264),
            default_audio: Some(CodecId::Aac),
            unmapped_video: None,
            global_header: true,
            video_latency: 2,
        }
    }

    pub fn fail_encoder(&self, name: &str) {
        self.log.borrow_mut().failing_encoders.push(name.to_owned());
    }

    fn audio_frame_size(name: &str) -> Option<usize> {
        match name {
            "aac" => Some(1024),
            "libopus" => Some(960),
            _ => None,
        }
    }
}

impl CodecCatalog for FakeBackend {
    fn find_encoder(&self, codec: CodecId) -> Option<EncoderDescriptor> {
        self.encoders
            .iter()
            .find(|descriptor| {
                descriptor.codec == codec && HardwareFamily::of_encoder(&descriptor.name).is_none()
            })
            .cloned()
    }

    fn find_encoder_by_name(&self, name: &str) -> Option<EncoderDescriptor> {
        self.encoders
            .iter()
            .find(|descriptor| descriptor.name == name)
            .cloned()
    }
}

impl Backend for FakeBackend {
    type VideoEncoder = FakeVideoEncoder;
    type AudioEncoder = FakeAudioEncoder;
    type Container = FakeContainer;
    type Device = FakeDevice;
    type Scaling = CountingScaling;
    type Resampling = FifoResampling;

    fn open_container(&self, destination: &str, _format: Option<&str>) -> Result<FakeContainer> {
        let mut log = self.log.borrow_mut();
        if log.fail_container {
            return Err(Error::io(format!("failed to open {destination}")));
        }
        log.destinations.push(destination.to_owned());
        Ok(FakeContainer {
            log: self.log.clone(),
            streams: Vec::new(),
            default_video: self.default_video,
            default_audio: self.default_audio,
            unmapped_video: self.unmapped_video,
            global_header: self.global_header,
            header_written: false,
        })
    }

    fn create_device(&self, surface: PixelFormat) -> Result<FakeDevice> {
        if !surface.is_hardware() {
            return Err(Error::unsupported_format(surface.to_string()));
        }
        self.log.borrow_mut().devices_created += 1;
        Ok(FakeDevice {
            log: self.log.clone(),
        })
    }

    fn open_video_encoder(
        &self,
        descriptor: &EncoderDescriptor,
        settings: &VideoEncoderSettings,
        device: Option<&FakeDevice>,
    ) -> Result<FakeVideoEncoder> {
        let mut log = self.log.borrow_mut();
        if log.failing_encoders.contains(&descriptor.name) {
            return Err(Error::codec(format!("failed to open {}", descriptor.name)));
        }
        if settings.hardware.is_some() && device.is_none() {
            return Err(Error::io("hardware encoder opened without a device"));
        }
        log.opened_encoders.push(descriptor.name.clone());
        log.video_settings.push(settings.clone());
        Ok(FakeVideoEncoder {
            name: descriptor.name.clone(),
            time_base: settings.time_base,
            latency: self.video_latency,
            queue: VecDeque::new(),
            eof: false,
            log: self.log.clone(),
        })
    }

    fn open_audio_encoder(
        &self,
        descriptor: &EncoderDescriptor,
        settings: &AudioEncoderSettings,
    ) -> Result<FakeAudioEncoder> {
        let mut log = self.log.borrow_mut();
        if log.failing_encoders.contains(&descriptor.name) {
            return Err(Error::codec(format!("failed to open {}", descriptor.name)));
        }
        log.opened_encoders.push(descriptor.name.clone());
        log.audio_settings.push(settings.clone());
        Ok(FakeAudioEncoder {
            name: descriptor.name.clone(),
            sample_rate: settings.sample_rate,
            frame_size: Self::audio_frame_size(&descriptor.name),
            small_last_frame: descriptor.small_last_frame,
            queue: VecDeque::new(),
            eof: false,
            log: self.log.clone(),
        })
    }

    fn scaling(&self) -> CountingScaling {
        CountingScaling {
            log: self.log.clone(),
        }
    }

    fn resampling(&self) -> FifoResampling {
        FifoResampling {
            log: self.log.clone(),
        }
    }
}

/// Container that records what is written to it.
pub struct FakeContainer {
    log: SharedLog,
    streams: Vec<Rational>,
    default_video: Option<CodecId>,
    default_audio: Option<CodecId>,
    unmapped_video: Option<&'static str>,
    global_header: bool,
    header_written: bool,
}

impl Container for FakeContainer {
    type VideoEncoder = FakeVideoEncoder;
    type AudioEncoder = FakeAudioEncoder;

    fn default_video_codec(&self) -> Result<Option<CodecId>> {
        match self.unmapped_video {
            Some(native) => Err(Error::unsupported_format(format!("default video codec {native}"))),
            None => Ok(self.default_video),
        }
    }

    fn default_audio_codec(&self) -> Result<Option<CodecId>> {
        Ok(self.default_audio)
    }

    fn requires_global_header(&self) -> bool {
        self.global_header
    }

    fn add_video_stream(
        &mut self,
        _encoder: &FakeVideoEncoder,
        _settings: &VideoEncoderSettings,
    ) -> Result<usize> {
        self.streams.push(VIDEO_STREAM_TIME_BASE);
        Ok(self.streams.len() - 1)
    }

    fn add_audio_stream(
        &mut self,
        _encoder: &FakeAudioEncoder,
        settings: &AudioEncoderSettings,
    ) -> Result<usize> {
        self.streams
            .push(Rational::new(1, settings.sample_rate as i32));
        Ok(self.streams.len() - 1)
    }

    fn write_header(&mut self) -> Result<()> {
        let mut log = self.log.borrow_mut();
        if log.fail_header {
            return Err(Error::io("failed to write header"));
        }
        log.headers += 1;
        self.header_written = true;
        Ok(())
    }

    fn stream_time_base(&self, stream: usize) -> Result<Rational> {
        self.streams
            .get(stream)
            .copied()
            .ok_or_else(|| Error::invalid_data(format!("no stream {stream}")))
    }

    fn write_interleaved(&mut self, packet: Packet) -> Result<()> {
        if !self.header_written {
            return Err(Error::invalid_data("header not written"));
        }
        self.log.borrow_mut().packets.push(packet);
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<()> {
        if !self.header_written {
            return Err(Error::invalid_data("header not written"));
        }
        self.log.borrow_mut().trailers += 1;
        Ok(())
    }
}

impl Drop for FakeContainer {
    fn drop(&mut self) {
        self.log.borrow_mut().containers_closed += 1;
    }
}

/// Hardware device that counts its releases.
pub struct FakeDevice {
    log: SharedLog,
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.log.borrow_mut().devices_released += 1;
    }
}

/// Video encoder emitting one packet per frame after `latency` frames.
pub struct FakeVideoEncoder {
    name: String,
    time_base: Rational,
    latency: usize,
    queue: VecDeque<Packet>,
    eof: bool,
    log: SharedLog,
}

impl PacketSource for FakeVideoEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn time_base(&self) -> Rational {
        self.time_base
    }

    fn send_eof(&mut self) -> Result<()> {
        if self.eof {
            return Err(Error::codec("already flushed"));
        }
        self.eof = true;
        Ok(())
    }

    fn receive_packet(&mut self) -> Result<Poll> {
        if self.queue.len() > self.latency || (self.eof && !self.queue.is_empty()) {
            return Ok(self.queue.pop_front().map_or(Poll::EndOfStream, Poll::Packet));
        }
        Ok(if self.eof {
            Poll::EndOfStream
        } else {
            Poll::NeedsInput
        })
    }
}

impl VideoEncoding for FakeVideoEncoder {
    fn send_frame(&mut self, frame: &VideoFrame, pts: i64) -> Result<()> {
        if self.eof {
            return Err(Error::codec("frame after end of stream"));
        }
        self.log.borrow_mut().video_frames.push((
            pts,
            frame.format(),
            frame.width(),
            frame.height(),
        ));
        self.queue.push_back(Packet {
            pts: Some(pts),
            dts: Some(pts),
            duration: 0,
            is_keyframe: pts == 0,
            ..Packet::new(vec![0; 64])
        });
        Ok(())
    }
}

/// Audio encoder emitting one packet per frame immediately.
pub struct FakeAudioEncoder {
    name: String,
    sample_rate: u32,
    frame_size: Option<usize>,
    small_last_frame: bool,
    queue: VecDeque<Packet>,
    eof: bool,
    log: SharedLog,
}

impl PacketSource for FakeAudioEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn time_base(&self) -> Rational {
        Rational::new(1, self.sample_rate as i32)
    }

    fn send_eof(&mut self) -> Result<()> {
        if self.eof {
            return Err(Error::codec("already flushed"));
        }
        self.eof = true;
        Ok(())
    }

    fn receive_packet(&mut self) -> Result<Poll> {
        Ok(match self.queue.pop_front() {
            Some(packet) => Poll::Packet(packet),
            None if self.eof => Poll::EndOfStream,
            None => Poll::NeedsInput,
        })
    }
}

impl AudioEncoding for FakeAudioEncoder {
    fn send_frame(&mut self, frame: &AudioFrame, pts: i64) -> Result<()> {
        if self.eof {
            return Err(Error::codec("frame after end of stream"));
        }
        if let Some(frame_size) = self.frame_size {
            let fits = frame.samples() == frame_size
                || (self.small_last_frame && frame.samples() < frame_size);
            if !fits {
                return Err(Error::codec(format!(
                    "{} samples sent to an encoder with frame size {frame_size}",
                    frame.samples()
                )));
            }
        }
        self.log
            .borrow_mut()
            .audio_frames
            .push((pts, frame.samples()));
        self.queue.push_back(Packet {
            pts: Some(pts),
            dts: Some(pts),
            duration: frame.samples() as i64,
            is_keyframe: true,
            ..Packet::new(vec![0; 32])
        });
        Ok(())
    }

    fn frame_size(&self) -> Option<usize> {
        self.frame_size
    }
}

/// Scaler factory counting the contexts it builds.
#[derive(Clone)]
pub struct CountingScaling {
    log: SharedLog,
}

pub struct FillScaler;

impl ScaleEngine for FillScaler {
    fn scale(
        &mut self,
        _src: &[&[u8]],
        _src_strides: &[usize],
        dst: &mut [&mut [u8]],
        _dst_strides: &[usize],
    ) -> Result<()> {
        for plane in dst.iter_mut() {
            plane.fill(0x80);
        }
        Ok(())
    }
}

impl ScaleEngineFactory for CountingScaling {
    type Engine = FillScaler;

    fn create(&self, _src: ImageShape, _dst: ImageShape) -> Result<FillScaler> {
        self.log.borrow_mut().scalers_built += 1;
        Ok(FillScaler)
    }
}

/// Resampler factory whose engines count samples exactly, like a FIFO with
/// an ideal rate converter behind it.
#[derive(Clone)]
pub struct FifoResampling {
    log: SharedLog,
}

pub struct FifoEngine {
    src_rate: u64,
    dst_rate: u64,
    consumed: u64,
    produced: u64,
}

impl FifoEngine {
    fn available(&self, extra: u64) -> u64 {
        (self.consumed + extra) * self.dst_rate / self.src_rate - self.produced
    }
}

impl ResampleEngine for FifoEngine {
    fn convert(
        &mut self,
        input: Option<(&[&[u8]], usize)>,
        output: &mut [&mut [u8]],
        capacity: usize,
    ) -> Result<usize> {
        if let Some((_, samples)) = input {
            self.consumed += samples as u64;
        }
        let produced = self.available(0).min(capacity as u64) as usize;
        self.produced += produced as u64;
        for plane in output.iter_mut() {
            let bytes = plane.len() / capacity.max(1) * produced;
            plane[..bytes].fill(0);
        }
        Ok(produced)
    }

    fn output_samples(&mut self, input_samples: usize) -> usize {
        self.available(input_samples as u64) as usize
    }

    fn delay(&mut self, rate: u32) -> i64 {
        (self.available(0) * rate as u64 / self.dst_rate) as i64
    }
}

impl ResampleEngineFactory for FifoResampling {
    type Engine = FifoEngine;

    fn create(&self, src: AudioShape, dst: AudioShape) -> Result<FifoEngine> {
        self.log.borrow_mut().resamplers_built += 1;
        Ok(FifoEngine {
            src_rate: src.sample_rate as u64,
            dst_rate: dst.sample_rate as u64,
            consumed: 0,
            produced: 0,
        })
    }
}

pub fn hd_config() -> WriterConfig {
    WriterConfig::new(1280, 720, Rational::new(30000, 1001))
        .with_video_codec(CodecId::H264)
        .with_video_bitrate(4_000_000)
        .with_audio_codec(CodecId::Aac)
        .with_audio_bitrate(128_000)
}

pub fn gray_frame(width: u32, height: u32) -> VideoFrame {
    let mut frame = VideoFrame::new(width, height, PixelFormat::Yuv420p);
    frame.fill_gray(0x80);
    frame
}

/// Silence in the shape audio input is assumed to have.
pub fn silence(samples: usize) -> AudioFrame {
    AudioFrame::new(48000, ChannelLayout::Stereo, SampleFormat::S16, samples)
}

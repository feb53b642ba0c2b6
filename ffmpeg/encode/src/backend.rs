/*!
    Backend seams of the encode session.

    The session logic (negotiation, conversion, timestamping, draining,
    teardown) is written against these traits. The FFmpeg backend implements
    them over libavcodec/libavformat; tests implement them with recording
    fakes.
*/

use ffmpeg_transform::{AudioShape, ResampleEngineFactory, ScaleEngineFactory};
use ffmpeg_types::{
    AudioFrame, ChannelLayout, CodecId, Packet, PixelFormat, Rational, Result, SampleFormat,
    VideoFrame,
};

/**
    What an encoder implementation declares about itself.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderDescriptor {
    /// Implementation name, e.g. `libx264` or `h264_nvenc`.
    pub name: String,
    pub codec: CodecId,
    /// Supported pixel formats, in order of preference. Empty for audio.
    pub pixel_formats: Vec<PixelFormat>,
    /// Supported sample formats, in order of preference. Empty for video.
    pub sample_formats: Vec<SampleFormat>,
    /// Supported sample rates. Empty means any.
    pub sample_rates: Vec<u32>,
    /// Supported channel layouts. Empty means any.
    pub channel_layouts: Vec<ChannelLayout>,
    /// Accepts frames of any size.
    pub variable_frame_size: bool,
    /// Accepts a final frame shorter than the frame size.
    pub small_last_frame: bool,
}

impl EncoderDescriptor {
    /**
        Describe a video encoder.
    */
    pub fn video(name: impl Into<String>, codec: CodecId, pixel_formats: Vec<PixelFormat>) -> Self {
        Self {
            name: name.into(),
            codec,
            pixel_formats,
            sample_formats: Vec::new(),
            sample_rates: Vec::new(),
            channel_layouts: Vec::new(),
            variable_frame_size: false,
            small_last_frame: false,
        }
    }

    /**
        Describe an audio encoder.
    */
    pub fn audio(
        name: impl Into<String>,
        codec: CodecId,
        sample_formats: Vec<SampleFormat>,
        sample_rates: Vec<u32>,
        channel_layouts: Vec<ChannelLayout>,
    ) -> Self {
        Self {
            name: name.into(),
            codec,
            pixel_formats: Vec::new(),
            sample_formats,
            sample_rates,
            channel_layouts,
            variable_frame_size: false,
            small_last_frame: false,
        }
    }

    /**
        Returns true for the x264/x265 family of software encoders.
    */
    pub fn is_libx(&self) -> bool {
        self.name.starts_with("libx")
    }
}

/**
    Looks up encoder implementations.
*/
pub trait CodecCatalog {
    /**
        The default encoder for a codec.
    */
    fn find_encoder(&self, codec: CodecId) -> Option<EncoderDescriptor>;

    /**
        A specific encoder implementation by name.
    */
    fn find_encoder_by_name(&self, name: &str) -> Option<EncoderDescriptor>;
}

/**
    Hardware frame pool attached to a video encoder.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HardwareFrames {
    /// Surface format the encoder consumes.
    pub surface: PixelFormat,
    /// Format frames are uploaded from.
    pub software_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Frames to preallocate, when the device needs a fixed pool.
    pub initial_pool_size: Option<u32>,
}

/**
    Settings a video encoder is opened with.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct VideoEncoderSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: Rational,
    /// Encoder time base, the inverse of the frame rate.
    pub time_base: Rational,
    pub pixel_format: PixelFormat,
    pub bitrate: u64,
    /// Upper bound for the encoder's default keyframe interval.
    pub gop_cap: u32,
    /// Upper bound for the encoder's default bitrate tolerance.
    pub tolerance_cap: u64,
    /// Speed preset passed as an encoder option.
    pub preset: Option<&'static str>,
    /// Put codec headers in extradata.
    pub global_header: bool,
    /// Present when the encoder consumes device surfaces.
    pub hardware: Option<HardwareFrames>,
}

/**
    Settings an audio encoder is opened with.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct AudioEncoderSettings {
    pub sample_format: SampleFormat,
    pub sample_rate: u32,
    pub channels: ChannelLayout,
    pub bitrate: u64,
    /// Put codec headers in extradata.
    pub global_header: bool,
}

impl AudioEncoderSettings {
    pub fn shape(&self) -> AudioShape {
        AudioShape::new(self.channels, self.sample_format, self.sample_rate)
    }
}

/**
    Result of asking an encoder for output.
*/
#[derive(Debug)]
pub enum Poll {
    Packet(Packet),
    /// The encoder wants more input before it can produce a packet.
    NeedsInput,
    /// The encoder is fully drained.
    EndOfStream,
}

/**
    The packet side shared by video and audio encoders.
*/
pub trait PacketSource {
    /**
        Implementation name, e.g. `libx264`.
    */
    fn name(&self) -> &str;

    /**
        Time base of the packets this encoder produces.
    */
    fn time_base(&self) -> Rational;

    /**
        Signal end of stream. Buffered packets then drain until
        [`Poll::EndOfStream`].
    */
    fn send_eof(&mut self) -> Result<()>;

    fn receive_packet(&mut self) -> Result<Poll>;
}

/**
    An opened video encoder.
*/
pub trait VideoEncoding: PacketSource {
    /**
        Submit a frame in the encoder's software input format with the given
        presentation timestamp (in encoder time base).
    */
    fn send_frame(&mut self, frame: &VideoFrame, pts: i64) -> Result<()>;
}

/**
    An opened audio encoder.
*/
pub trait AudioEncoding: PacketSource {
    /**
        Submit a frame in the encoder's input shape with the given
        presentation timestamp (in samples).
    */
    fn send_frame(&mut self, frame: &AudioFrame, pts: i64) -> Result<()>;

    /**
        Samples per frame the encoder requires, or `None` if it accepts any
        frame size.
    */
    fn frame_size(&self) -> Option<usize>;
}

/**
    An output container being written.
*/
pub trait Container {
    type VideoEncoder;
    type AudioEncoder;

    /**
        Codec used for video when none is requested. `Ok(None)` when the
        container has no default, an error when the default is not a known
        [`CodecId`].
    */
    fn default_video_codec(&self) -> Result<Option<CodecId>>;

    fn default_audio_codec(&self) -> Result<Option<CodecId>>;

    fn requires_global_header(&self) -> bool;

    /**
        Add a stream mirroring an opened video encoder. Returns the stream index.
    */
    fn add_video_stream(
        &mut self,
        encoder: &Self::VideoEncoder,
        settings: &VideoEncoderSettings,
    ) -> Result<usize>;

    /**
        Add a stream mirroring an opened audio encoder. Returns the stream index.
    */
    fn add_audio_stream(
        &mut self,
        encoder: &Self::AudioEncoder,
        settings: &AudioEncoderSettings,
    ) -> Result<usize>;

    fn write_header(&mut self) -> Result<()>;

    /**
        Time base of a stream. Only final after the header is written.
    */
    fn stream_time_base(&self, stream: usize) -> Result<Rational>;

    /**
        Write a packet already rescaled to its stream's time base.
    */
    fn write_interleaved(&mut self, packet: Packet) -> Result<()>;

    fn write_trailer(&mut self) -> Result<()>;
}

/**
    Everything an encode session needs from a media library.
*/
pub trait Backend: CodecCatalog {
    type VideoEncoder: VideoEncoding;
    type AudioEncoder: AudioEncoding;
    type Container: Container<VideoEncoder = Self::VideoEncoder, AudioEncoder = Self::AudioEncoder>;
    /// Hardware device context kept alive for as long as its encoder.
    type Device;
    type Scaling: ScaleEngineFactory;
    type Resampling: ResampleEngineFactory;

    /**
        Open a destination, optionally forcing the container format.
    */
    fn open_container(&self, destination: &str, format: Option<&str>) -> Result<Self::Container>;

    /**
        Create a device context for a hardware surface format.
    */
    fn create_device(&self, surface: PixelFormat) -> Result<Self::Device>;

    fn open_video_encoder(
        &self,
        descriptor: &EncoderDescriptor,
        settings: &VideoEncoderSettings,
        device: Option<&Self::Device>,
    ) -> Result<Self::VideoEncoder>;

    fn open_audio_encoder(
        &self,
        descriptor: &EncoderDescriptor,
        settings: &AudioEncoderSettings,
    ) -> Result<Self::AudioEncoder>;

    fn scaling(&self) -> Self::Scaling;

    fn resampling(&self) -> Self::Resampling;

    /**
        Check whether a named video encoder can actually be opened on this
        machine: 1920x1080 at 60 fps and 10 Mbit/s, fed with its first
        software pixel format.
    */
    fn probe_encoder(&self, name: &str) -> bool {
        let Some(descriptor) = self.find_encoder_by_name(name) else {
            return false;
        };
        let pixel_format = descriptor
            .pixel_formats
            .iter()
            .copied()
            .find(|format| !format.is_hardware())
            .unwrap_or(PixelFormat::Yuv420p);
        let frame_rate = Rational::new(60, 1);
        let settings = VideoEncoderSettings {
            width: 1920,
            height: 1080,
            frame_rate,
            time_base: frame_rate.invert(),
            pixel_format,
            bitrate: 10_000_000,
            gop_cap: 60,
            tolerance_cap: 5_000_000,
            preset: None,
            global_header: false,
            hardware: None,
        };
        self.open_video_encoder(&descriptor, &settings, None).is_ok()
    }
}

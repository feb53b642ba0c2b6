/*!
    Conversion engine seams.
*/

use ffmpeg_types::{AudioFrame, ChannelLayout, PixelFormat, Result, SampleFormat, VideoFrame};

/**
    Geometry and pixel format of an image.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageShape {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl ImageShape {
    pub const fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    pub fn of(frame: &VideoFrame) -> Self {
        Self::new(frame.width(), frame.height(), frame.format())
    }

    /**
        Returns true if no conversion context can be built for this shape.
    */
    pub const fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/**
    Channel layout, sample format and rate of an audio stream.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AudioShape {
    pub channels: ChannelLayout,
    pub format: SampleFormat,
    pub sample_rate: u32,
}

impl AudioShape {
    pub const fn new(channels: ChannelLayout, format: SampleFormat, sample_rate: u32) -> Self {
        Self {
            channels,
            format,
            sample_rate,
        }
    }

    pub fn of(frame: &AudioFrame) -> Self {
        Self::new(frame.channels(), frame.format(), frame.sample_rate())
    }

    /// Bytes one sample occupies across all channels.
    pub const fn frame_bytes(&self) -> usize {
        self.channels.channels() as usize * self.format.bytes_per_sample()
    }

    pub const fn plane_count(&self) -> usize {
        if self.format.is_planar() {
            self.channels.channels() as usize
        } else {
            1
        }
    }
}

/**
    Converts images of one fixed shape into another.
*/
pub trait ScaleEngine {
    /**
        Convert one full image. Plane slices and strides follow the layout of
        the shapes the engine was created for.
    */
    fn scale(
        &mut self,
        src: &[&[u8]],
        src_strides: &[usize],
        dst: &mut [&mut [u8]],
        dst_strides: &[usize],
    ) -> Result<()>;
}

/**
    Creates [`ScaleEngine`]s for a source/destination shape pair.
*/
pub trait ScaleEngineFactory {
    type Engine: ScaleEngine;

    fn create(&self, src: ImageShape, dst: ImageShape) -> Result<Self::Engine>;
}

/**
    A stateful sample converter for one fixed shape pair.

    Engines buffer samples internally: rate conversion needs look-ahead, and
    output space may run out before all input is consumed.
*/
pub trait ResampleEngine {
    /**
        Push `input` (planes plus sample count), or drain when `None`, and write
        at most `capacity` samples per channel into `output`. Returns the number
        of samples written.
    */
    fn convert(
        &mut self,
        input: Option<(&[&[u8]], usize)>,
        output: &mut [&mut [u8]],
        capacity: usize,
    ) -> Result<usize>;

    /**
        Upper bound on the samples the next conversion of `input_samples`
        samples can produce, including what is already buffered.
    */
    fn output_samples(&mut self, input_samples: usize) -> usize;

    /**
        Buffered samples expressed at the given sample rate.
    */
    fn delay(&mut self, rate: u32) -> i64;
}

/**
    Creates [`ResampleEngine`]s for a source/destination shape pair.
*/
pub trait ResampleEngineFactory {
    type Engine: ResampleEngine;

    fn create(&self, src: AudioShape, dst: AudioShape) -> Result<Self::Engine>;
}

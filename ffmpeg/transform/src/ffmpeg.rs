/*!
    Conversion engines backed by libswscale and libswresample.

    Also hosts the format mappings between this ecosystem's types and FFmpeg's,
    shared by the crates that talk to FFmpeg directly.
*/

use std::os::raw::c_int;
use std::ptr;

use ffmpeg_next::{
    ChannelLayout as FFmpegChannelLayout, ffi,
    format::{Pixel, Sample, sample::Type as SampleType},
    software::resampling::context::Context as ResamplerContext,
    software::scaling::{context::Context as ScalerContext, flag::Flags as ScalerFlags},
};

use ffmpeg_types::{ChannelLayout, Error, PixelFormat, Result, SampleFormat};

use crate::engine::{
    AudioShape, ImageShape, ResampleEngine, ResampleEngineFactory, ScaleEngine,
    ScaleEngineFactory,
};

/// FFmpeg frames carry at most this many data pointers we use.
const MAX_PLANES: usize = 8;

/**
    Scaling algorithm for size conversion.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScalingAlgorithm {
    /// Fast bilinear - fastest filter that still interpolates, used for capture.
    #[default]
    FastBilinear,
    /// Nearest neighbor - lowest quality.
    Nearest,
    /// Bilinear interpolation - fast, acceptable quality.
    Bilinear,
    /// Bicubic interpolation - moderate speed, good quality.
    Bicubic,
    /// Lanczos resampling - slowest, highest quality.
    Lanczos,
}

impl ScalingAlgorithm {
    fn to_ffmpeg_flags(self) -> ScalerFlags {
        match self {
            Self::FastBilinear => ScalerFlags::FAST_BILINEAR,
            Self::Nearest => ScalerFlags::POINT,
            Self::Bilinear => ScalerFlags::BILINEAR,
            Self::Bicubic => ScalerFlags::BICUBIC,
            Self::Lanczos => ScalerFlags::LANCZOS,
        }
    }
}

/**
    Creates libswscale contexts.
*/
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegScaling {
    pub algorithm: ScalingAlgorithm,
}

impl ScaleEngineFactory for FfmpegScaling {
    type Engine = FfmpegScaler;

    fn create(&self, src: ImageShape, dst: ImageShape) -> Result<FfmpegScaler> {
        let context = ScalerContext::get(
            pixel_format_to_ffmpeg(src.format)?,
            src.width,
            src.height,
            pixel_format_to_ffmpeg(dst.format)?,
            dst.width,
            dst.height,
            self.algorithm.to_ffmpeg_flags(),
        )
        .map_err(|e| Error::codec(format!("failed to create scaler: {}", e)))?;

        Ok(FfmpegScaler {
            context,
            src_height: src.height,
        })
    }
}

/**
    A libswscale context for one shape pair.
*/
pub struct FfmpegScaler {
    context: ScalerContext,
    src_height: u32,
}

impl ScaleEngine for FfmpegScaler {
    fn scale(
        &mut self,
        src: &[&[u8]],
        src_strides: &[usize],
        dst: &mut [&mut [u8]],
        dst_strides: &[usize],
    ) -> Result<()> {
        let mut src_data = [ptr::null::<u8>(); 4];
        let mut src_lines: [c_int; 4] = [0; 4];
        for (index, (plane, stride)) in src.iter().zip(src_strides).take(4).enumerate() {
            src_data[index] = plane.as_ptr();
            src_lines[index] = *stride as c_int;
        }

        let mut dst_data = [ptr::null_mut::<u8>(); 4];
        let mut dst_lines: [c_int; 4] = [0; 4];
        for (index, (plane, stride)) in dst.iter_mut().zip(dst_strides).take(4).enumerate() {
            dst_data[index] = plane.as_mut_ptr();
            dst_lines[index] = *stride as c_int;
        }

        // SAFETY: the caller validated every plane against the shapes this
        // context was created for, so swscale stays inside the buffers.
        let rows = unsafe {
            ffi::sws_scale(
                self.context.as_mut_ptr(),
                src_data.as_ptr(),
                src_lines.as_ptr(),
                0,
                self.src_height as c_int,
                dst_data.as_ptr(),
                dst_lines.as_ptr(),
            )
        };

        if rows < 0 {
            return Err(Error::codec(format!(
                "sws_scale failed: {}",
                ffmpeg_next::Error::from(rows)
            )));
        }
        Ok(())
    }
}

/**
    Creates libswresample contexts.
*/
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegResampling;

impl ResampleEngineFactory for FfmpegResampling {
    type Engine = FfmpegResampler;

    fn create(&self, src: AudioShape, dst: AudioShape) -> Result<FfmpegResampler> {
        let context = ResamplerContext::get(
            sample_format_to_ffmpeg(src.format)?,
            channel_layout_to_ffmpeg(src.channels),
            src.sample_rate,
            sample_format_to_ffmpeg(dst.format)?,
            channel_layout_to_ffmpeg(dst.channels),
            dst.sample_rate,
        )
        .map_err(|e| Error::codec(format!("failed to create resampler: {}", e)))?;

        Ok(FfmpegResampler { context })
    }
}

/**
    A libswresample context for one shape pair.
*/
pub struct FfmpegResampler {
    context: ResamplerContext,
}

impl ResampleEngine for FfmpegResampler {
    fn convert(
        &mut self,
        input: Option<(&[&[u8]], usize)>,
        output: &mut [&mut [u8]],
        capacity: usize,
    ) -> Result<usize> {
        let mut out_data = [ptr::null_mut::<u8>(); MAX_PLANES];
        for (index, plane) in output.iter_mut().take(MAX_PLANES).enumerate() {
            out_data[index] = plane.as_mut_ptr();
        }

        let mut in_data = [ptr::null::<u8>(); MAX_PLANES];
        let in_samples = match input {
            Some((planes, samples)) => {
                for (index, plane) in planes.iter().take(MAX_PLANES).enumerate() {
                    in_data[index] = plane.as_ptr();
                }
                samples as c_int
            }
            None => 0,
        };
        let in_ptr = if input.is_some() {
            in_data.as_mut_ptr()
        } else {
            ptr::null_mut()
        };

        // SAFETY: output planes hold `capacity` samples each and input planes
        // hold `in_samples` samples each, in the shapes the context was built for.
        let produced = unsafe {
            ffi::swr_convert(
                self.context.as_mut_ptr(),
                out_data.as_mut_ptr(),
                capacity as c_int,
                in_ptr,
                in_samples,
            )
        };

        if produced < 0 {
            return Err(Error::codec(format!(
                "swr_convert failed: {}",
                ffmpeg_next::Error::from(produced)
            )));
        }
        Ok(produced as usize)
    }

    fn output_samples(&mut self, input_samples: usize) -> usize {
        // SAFETY: the context is initialized for the lifetime of self.
        let samples =
            unsafe { ffi::swr_get_out_samples(self.context.as_mut_ptr(), input_samples as c_int) };
        samples.max(0) as usize
    }

    fn delay(&mut self, rate: u32) -> i64 {
        // SAFETY: the context is initialized for the lifetime of self.
        unsafe { ffi::swr_get_delay(self.context.as_mut_ptr(), i64::from(rate)) }
    }
}

/**
    Convert our PixelFormat to FFmpeg's Pixel format.
*/
pub fn pixel_format_to_ffmpeg(format: PixelFormat) -> Result<Pixel> {
    match format {
        PixelFormat::Yuv420p => Ok(Pixel::YUV420P),
        PixelFormat::Nv12 => Ok(Pixel::NV12),
        PixelFormat::Bgra => Ok(Pixel::BGRA),
        PixelFormat::Rgba => Ok(Pixel::RGBA),
        PixelFormat::Rgb24 => Ok(Pixel::RGB24),
        PixelFormat::Bgr24 => Ok(Pixel::BGR24),
        PixelFormat::Yuv422p => Ok(Pixel::YUV422P),
        PixelFormat::Yuv444p => Ok(Pixel::YUV444P),
        PixelFormat::Yuv420p10 => Ok(Pixel::YUV420P10LE),
        PixelFormat::P010le => Ok(Pixel::P010LE),
        PixelFormat::X2Rgb10le => Ok(Pixel::X2RGB10LE),
        PixelFormat::Rgb48le => Ok(Pixel::RGB48LE),
        PixelFormat::D3d11 => Ok(Pixel::D3D11),
        PixelFormat::Cuda => Ok(Pixel::CUDA),
        PixelFormat::Qsv => Ok(Pixel::QSV),
        PixelFormat::Vaapi => Ok(Pixel::VAAPI),
        _ => Err(Error::unsupported_format(format!(
            "pixel format {:?} not supported",
            format
        ))),
    }
}

/**
    Convert FFmpeg's Pixel format to ours, if we represent it.
*/
pub fn pixel_format_from_ffmpeg(format: Pixel) -> Option<PixelFormat> {
    match format {
        Pixel::YUV420P => Some(PixelFormat::Yuv420p),
        Pixel::NV12 => Some(PixelFormat::Nv12),
        Pixel::BGRA => Some(PixelFormat::Bgra),
        Pixel::RGBA => Some(PixelFormat::Rgba),
        Pixel::RGB24 => Some(PixelFormat::Rgb24),
        Pixel::BGR24 => Some(PixelFormat::Bgr24),
        Pixel::YUV422P => Some(PixelFormat::Yuv422p),
        Pixel::YUV444P => Some(PixelFormat::Yuv444p),
        Pixel::YUV420P10LE => Some(PixelFormat::Yuv420p10),
        Pixel::P010LE => Some(PixelFormat::P010le),
        Pixel::X2RGB10LE => Some(PixelFormat::X2Rgb10le),
        Pixel::RGB48LE => Some(PixelFormat::Rgb48le),
        Pixel::D3D11 => Some(PixelFormat::D3d11),
        Pixel::CUDA => Some(PixelFormat::Cuda),
        Pixel::QSV => Some(PixelFormat::Qsv),
        Pixel::VAAPI => Some(PixelFormat::Vaapi),
        _ => None,
    }
}

/**
    Convert our SampleFormat to FFmpeg's Sample format.
*/
pub fn sample_format_to_ffmpeg(format: SampleFormat) -> Result<Sample> {
    match format {
        SampleFormat::F32 => Ok(Sample::F32(SampleType::Packed)),
        SampleFormat::F64 => Ok(Sample::F64(SampleType::Packed)),
        SampleFormat::S16 => Ok(Sample::I16(SampleType::Packed)),
        SampleFormat::S32 => Ok(Sample::I32(SampleType::Packed)),
        SampleFormat::U8 => Ok(Sample::U8(SampleType::Packed)),
        SampleFormat::F32p => Ok(Sample::F32(SampleType::Planar)),
        SampleFormat::F64p => Ok(Sample::F64(SampleType::Planar)),
        SampleFormat::S16p => Ok(Sample::I16(SampleType::Planar)),
        SampleFormat::S32p => Ok(Sample::I32(SampleType::Planar)),
        SampleFormat::U8p => Ok(Sample::U8(SampleType::Planar)),
        _ => Err(Error::unsupported_format(format!(
            "sample format {:?} not supported",
            format
        ))),
    }
}

/**
    Convert FFmpeg's Sample format to ours, if we represent it.
*/
pub fn sample_format_from_ffmpeg(format: Sample) -> Option<SampleFormat> {
    match format {
        Sample::F32(SampleType::Packed) => Some(SampleFormat::F32),
        Sample::F64(SampleType::Packed) => Some(SampleFormat::F64),
        Sample::I16(SampleType::Packed) => Some(SampleFormat::S16),
        Sample::I32(SampleType::Packed) => Some(SampleFormat::S32),
        Sample::U8(SampleType::Packed) => Some(SampleFormat::U8),
        Sample::F32(SampleType::Planar) => Some(SampleFormat::F32p),
        Sample::F64(SampleType::Planar) => Some(SampleFormat::F64p),
        Sample::I16(SampleType::Planar) => Some(SampleFormat::S16p),
        Sample::I32(SampleType::Planar) => Some(SampleFormat::S32p),
        Sample::U8(SampleType::Planar) => Some(SampleFormat::U8p),
        _ => None,
    }
}

/**
    Convert our ChannelLayout to FFmpeg's ChannelLayout.
*/
pub fn channel_layout_to_ffmpeg(layout: ChannelLayout) -> FFmpegChannelLayout {
    match layout {
        ChannelLayout::Mono => FFmpegChannelLayout::MONO,
        ChannelLayout::Stereo => FFmpegChannelLayout::STEREO,
        ChannelLayout::Surround5_1 => FFmpegChannelLayout::_5POINT1,
        ChannelLayout::Surround7_1 => FFmpegChannelLayout::_7POINT1,
        _ => FFmpegChannelLayout::STEREO, // Default fallback
    }
}

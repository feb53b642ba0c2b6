/*!
    Pixel, sample and channel format types.
*/

use core::fmt;
use core::str::FromStr;

use crate::error::ParseError;

/**
    Video pixel formats.

    This is a subset of formats commonly encountered in capture and encode
    pipelines. Not all FFmpeg pixel formats are represented.

    Hardware surface formats (`D3d11`, `Cuda`, `Qsv`, `Vaapi`) describe frames that
    live in device memory. They have no CPU-visible planes.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, 12bpp (most common video format)
    Yuv420p,
    /// Semi-planar YUV 4:2:0, 12bpp (common hardware encoder input)
    Nv12,
    /// Packed BGRA, 32bpp (common for display on macOS/Windows)
    Bgra,
    /// Packed RGBA, 32bpp (common for display)
    Rgba,
    /// Packed RGB, 24bpp
    Rgb24,
    /// Packed BGR, 24bpp
    Bgr24,
    /// Planar YUV 4:2:2, 16bpp
    Yuv422p,
    /// Planar YUV 4:4:4, 24bpp
    Yuv444p,
    /// Planar YUV 4:2:0, 10-bit little-endian in 16-bit words
    Yuv420p10,
    /// Semi-planar YUV 4:2:0, 10-bit little-endian in 16-bit words
    P010le,
    /// Packed 10-bit RGB in a little-endian 32-bit word, 2 padding bits on top
    /// (HDR desktop capture output)
    X2Rgb10le,
    /// Packed RGB, 16 bits per component little-endian, 48bpp
    Rgb48le,
    /// Direct3D 11 texture surface
    D3d11,
    /// CUDA device memory surface
    Cuda,
    /// Intel Quick Sync surface
    Qsv,
    /// VA-API surface
    Vaapi,
}

impl PixelFormat {
    /**
        Returns the number of bits per pixel for this format.

        For planar formats, this is the average bits per pixel. Hardware
        surfaces report zero.
    */
    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Yuv420p | Self::Nv12 => 12,
            Self::Yuv420p10 | Self::P010le => 24, // 16-bit words * 1.5 planes average
            Self::Yuv422p => 16,
            Self::Rgb24 | Self::Bgr24 | Self::Yuv444p => 24,
            Self::Bgra | Self::Rgba | Self::X2Rgb10le => 32,
            Self::Rgb48le => 48,
            Self::D3d11 | Self::Cuda | Self::Qsv | Self::Vaapi => 0,
        }
    }

    /**
        Returns true if this is a planar format.
    */
    pub const fn is_planar(self) -> bool {
        match self {
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p | Self::Yuv420p10 => true,
            Self::Nv12 | Self::P010le => true, // semi-planar counts as planar
            _ => false,
        }
    }

    /**
        Returns true if frames of this format live in device memory.
    */
    pub const fn is_hardware(self) -> bool {
        matches!(self, Self::D3d11 | Self::Cuda | Self::Qsv | Self::Vaapi)
    }

    /**
        Returns the number of CPU-visible planes.
    */
    pub const fn plane_count(self) -> usize {
        match self {
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p | Self::Yuv420p10 => 3,
            Self::Nv12 | Self::P010le => 2,
            Self::Bgra | Self::Rgba | Self::Rgb24 | Self::Bgr24 => 1,
            Self::X2Rgb10le | Self::Rgb48le => 1,
            Self::D3d11 | Self::Cuda | Self::Qsv | Self::Vaapi => 0,
        }
    }

    /**
        Returns the number of meaningful bytes in one row of `plane` for a frame
        of the given width, or zero if the plane does not exist.
    */
    pub const fn plane_row_bytes(self, plane: usize, width: u32) -> usize {
        if plane >= self.plane_count() {
            return 0;
        }
        let width = width as usize;
        let half = width.div_ceil(2);
        match self {
            Self::Yuv420p | Self::Yuv422p => {
                if plane == 0 {
                    width
                } else {
                    half
                }
            }
            Self::Yuv420p10 => {
                if plane == 0 {
                    width * 2
                } else {
                    half * 2
                }
            }
            Self::Yuv444p => width,
            Self::Nv12 => {
                if plane == 0 {
                    width
                } else {
                    half * 2
                }
            }
            Self::P010le => {
                if plane == 0 {
                    width * 2
                } else {
                    half * 4
                }
            }
            Self::Rgb24 | Self::Bgr24 => width * 3,
            Self::Bgra | Self::Rgba | Self::X2Rgb10le => width * 4,
            Self::Rgb48le => width * 6,
            Self::D3d11 | Self::Cuda | Self::Qsv | Self::Vaapi => 0,
        }
    }

    /**
        Returns the number of rows in `plane` for a frame of the given height,
        or zero if the plane does not exist.
    */
    pub const fn plane_rows(self, plane: usize, height: u32) -> usize {
        if plane >= self.plane_count() {
            return 0;
        }
        let height = height as usize;
        match self {
            Self::Yuv420p | Self::Yuv420p10 | Self::Nv12 | Self::P010le if plane > 0 => {
                height.div_ceil(2)
            }
            _ => height,
        }
    }

    /**
        Returns the format a packed 10-bit layout must be expanded to before a
        generic converter can consume it.
    */
    pub const fn unpacked(self) -> Option<PixelFormat> {
        match self {
            Self::X2Rgb10le => Some(Self::Rgb48le),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Yuv420p => "yuv420p",
            Self::Nv12 => "nv12",
            Self::Bgra => "bgra",
            Self::Rgba => "rgba",
            Self::Rgb24 => "rgb24",
            Self::Bgr24 => "bgr24",
            Self::Yuv422p => "yuv422p",
            Self::Yuv444p => "yuv444p",
            Self::Yuv420p10 => "yuv420p10le",
            Self::P010le => "p010le",
            Self::X2Rgb10le => "x2rgb10le",
            Self::Rgb48le => "rgb48le",
            Self::D3d11 => "d3d11",
            Self::Cuda => "cuda",
            Self::Qsv => "qsv",
            Self::Vaapi => "vaapi",
        }
    }

    const ALL: [PixelFormat; 16] = [
        Self::Yuv420p,
        Self::Nv12,
        Self::Bgra,
        Self::Rgba,
        Self::Rgb24,
        Self::Bgr24,
        Self::Yuv422p,
        Self::Yuv444p,
        Self::Yuv420p10,
        Self::P010le,
        Self::X2Rgb10le,
        Self::Rgb48le,
        Self::D3d11,
        Self::Cuda,
        Self::Qsv,
        Self::Vaapi,
    ];
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::new("pixel format", s))
    }
}

/**
    Audio sample formats.

    Packed formats interleave channels in a single plane. Planar formats
    (`*p` variants) store one plane per channel.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SampleFormat {
    /// 32-bit floating point, range [-1.0, 1.0]
    F32,
    /// 64-bit floating point
    F64,
    /// Signed 16-bit integer
    S16,
    /// Signed 32-bit integer
    S32,
    /// Unsigned 8-bit integer
    U8,
    /// Planar 32-bit floating point (AAC/Opus encoder input)
    F32p,
    /// Planar 64-bit floating point
    F64p,
    /// Planar signed 16-bit integer
    S16p,
    /// Planar signed 32-bit integer
    S32p,
    /// Planar unsigned 8-bit integer
    U8p,
}

impl SampleFormat {
    /**
        Returns the number of bytes per sample.
    */
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 | Self::U8p => 1,
            Self::S16 | Self::S16p => 2,
            Self::S32 | Self::F32 | Self::S32p | Self::F32p => 4,
            Self::F64 | Self::F64p => 8,
        }
    }

    /**
        Returns true if this is a floating-point format.
    */
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64 | Self::F32p | Self::F64p)
    }

    /**
        Returns true if each channel is stored in its own plane.
    */
    pub const fn is_planar(self) -> bool {
        matches!(
            self,
            Self::F32p | Self::F64p | Self::S16p | Self::S32p | Self::U8p
        )
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::F32 => "flt",
            Self::F64 => "dbl",
            Self::S16 => "s16",
            Self::S32 => "s32",
            Self::U8 => "u8",
            Self::F32p => "fltp",
            Self::F64p => "dblp",
            Self::S16p => "s16p",
            Self::S32p => "s32p",
            Self::U8p => "u8p",
        }
    }

    const ALL: [SampleFormat; 10] = [
        Self::F32,
        Self::F64,
        Self::S16,
        Self::S32,
        Self::U8,
        Self::F32p,
        Self::F64p,
        Self::S16p,
        Self::S32p,
        Self::U8p,
    ];
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::new("sample format", s))
    }
}

/**
    Audio channel layout.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ChannelLayout {
    /// Single channel
    Mono,
    /// Left and right channels
    Stereo,
    /// 5.1 surround (FL, FR, FC, LFE, BL, BR)
    Surround5_1,
    /// 7.1 surround (FL, FR, FC, LFE, BL, BR, SL, SR)
    Surround7_1,
}

impl ChannelLayout {
    /**
        Returns the number of channels.
    */
    pub const fn channels(self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
            Self::Surround5_1 => 6,
            Self::Surround7_1 => 8,
        }
    }

    /**
        Create a channel layout from a channel count.

        Falls back to the closest matching layout.
    */
    pub const fn from_count(count: u16) -> Self {
        match count {
            0 | 1 => Self::Mono,
            2 => Self::Stereo,
            6 => Self::Surround5_1,
            8 => Self::Surround7_1,
            // For other counts, use closest match
            3..=5 => Self::Surround5_1,
            _ => Self::Surround7_1,
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mono => "mono",
            Self::Stereo => "stereo",
            Self::Surround5_1 => "5.1",
            Self::Surround7_1 => "7.1",
        })
    }
}

/*!
    Raw frame types.

    Frames own their sample memory. Video planes are allocated with
    32-byte-aligned strides; audio frames keep a fixed sample capacity so they
    can be reused as staging buffers between a converter and an encoder.
*/

use std::time::Duration;

use crate::error::{Error, Result};
use crate::format::{ChannelLayout, PixelFormat, SampleFormat};

/**
    A raw video frame.

    Holds up to four CPU-visible planes. Frames with a hardware surface format
    carry no planes; they only describe a shape.
*/
#[derive(Clone, PartialEq, Eq)]
pub struct VideoFrame {
    width: u32,
    height: u32,
    format: PixelFormat,
    planes: Vec<Vec<u8>>,
    strides: Vec<usize>,
}

impl VideoFrame {
    /// Row alignment used for planes allocated by [`VideoFrame::new`].
    pub const ALIGNMENT: usize = 32;

    /**
        Allocate a zero-filled frame.
    */
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let mut planes = Vec::with_capacity(format.plane_count());
        let mut strides = Vec::with_capacity(format.plane_count());
        for plane in 0..format.plane_count() {
            let stride = format
                .plane_row_bytes(plane, width)
                .next_multiple_of(Self::ALIGNMENT);
            planes.push(vec![0; stride * format.plane_rows(plane, height)]);
            strides.push(stride);
        }
        Self {
            width,
            height,
            format,
            planes,
            strides,
        }
    }

    /**
        Wrap existing plane buffers.

        Fails if the plane count does not match the format, a stride is shorter
        than a row, or a plane is too small for its rows.
    */
    pub fn from_planes(
        width: u32,
        height: u32,
        format: PixelFormat,
        planes: Vec<Vec<u8>>,
        strides: Vec<usize>,
    ) -> Result<Self> {
        if planes.len() != format.plane_count() || strides.len() != planes.len() {
            return Err(Error::invalid_data(format!(
                "{format} expects {} planes, got {} planes and {} strides",
                format.plane_count(),
                planes.len(),
                strides.len()
            )));
        }
        for (index, (plane, stride)) in planes.iter().zip(&strides).enumerate() {
            let needed = required_len(format, index, width, height, *stride)?;
            if plane.len() < needed {
                return Err(Error::invalid_data(format!(
                    "plane {index} holds {} bytes, needs {needed}",
                    plane.len()
                )));
            }
        }
        Ok(Self {
            width,
            height,
            format,
            planes,
            strides,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /**
        Returns true for zero-sized frames and frames without planes.
    */
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.planes.is_empty()
    }

    pub fn stride(&self, plane: usize) -> usize {
        self.strides.get(plane).copied().unwrap_or(0)
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn plane(&self, plane: usize) -> &[u8] {
        self.planes.get(plane).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn plane_mut(&mut self, plane: usize) -> &mut [u8] {
        self.planes
            .get_mut(plane)
            .map(Vec::as_mut_slice)
            .unwrap_or(&mut [])
    }

    pub fn planes(&self) -> Vec<&[u8]> {
        self.planes.iter().map(Vec::as_slice).collect()
    }

    pub fn planes_mut(&mut self) -> Vec<&mut [u8]> {
        self.planes.iter_mut().map(Vec::as_mut_slice).collect()
    }

    /**
        Copy image data in from caller-provided planes.

        Rows are copied one at a time so source and destination strides may
        differ.
    */
    pub fn fill(&mut self, src: &[&[u8]], src_strides: &[usize]) -> Result<()> {
        if src.len() < self.planes.len() || src_strides.len() < self.planes.len() {
            return Err(Error::invalid_data(format!(
                "{} expects {} source planes, got {}",
                self.format,
                self.planes.len(),
                src.len()
            )));
        }
        for index in 0..self.planes.len() {
            let row_bytes = self.format.plane_row_bytes(index, self.width);
            let rows = self.format.plane_rows(index, self.height);
            let src_stride = src_strides[index];
            let needed = required_len(self.format, index, self.width, self.height, src_stride)?;
            if src[index].len() < needed {
                return Err(Error::invalid_data(format!(
                    "source plane {index} holds {} bytes, needs {needed}",
                    src[index].len()
                )));
            }
            copy_plane(
                src[index],
                src_stride,
                &mut self.planes[index],
                self.strides[index],
                row_bytes,
                rows,
            );
        }
        Ok(())
    }

    /**
        Copy image data in from one tightly packed buffer holding every plane
        back to back with no row padding.
    */
    pub fn fill_packed(&mut self, data: &[u8]) -> Result<()> {
        let mut offset = 0;
        let mut planes = Vec::with_capacity(self.planes.len());
        let mut strides = Vec::with_capacity(self.planes.len());
        for index in 0..self.planes.len() {
            let row_bytes = self.format.plane_row_bytes(index, self.width);
            let len = row_bytes * self.format.plane_rows(index, self.height);
            let plane = data.get(offset..offset + len).ok_or_else(|| {
                Error::invalid_data(format!(
                    "packed buffer holds {} bytes, plane {index} ends at {}",
                    data.len(),
                    offset + len
                ))
            })?;
            planes.push(plane);
            strides.push(row_bytes);
            offset += len;
        }
        self.fill(&planes, &strides)
    }

    /**
        Copy the contents of a frame with the same shape.
    */
    pub fn copy_from(&mut self, other: &VideoFrame) -> Result<()> {
        if (self.width, self.height, self.format) != (other.width, other.height, other.format) {
            return Err(Error::invalid_data(format!(
                "cannot copy {}x{} {} into {}x{} {}",
                other.width, other.height, other.format, self.width, self.height, self.format
            )));
        }
        self.fill(&other.planes(), &other.strides)
    }

    /**
        Zero every plane.
    */
    pub fn clear(&mut self) {
        for plane in &mut self.planes {
            plane.fill(0);
        }
    }

    /**
        Paint the whole frame a uniform gray of the given 8-bit level.

        Chroma planes are set to their neutral value; alpha is opaque.
    */
    pub fn fill_gray(&mut self, level: u8) {
        let wide = u16::from(level) << 8 | u16::from(level);
        let format = self.format;
        for index in 0..self.planes.len() {
            let row_bytes = format.plane_row_bytes(index, self.width);
            let rows = format.plane_rows(index, self.height);
            let chroma = index > 0;
            let stride = self.strides[index];
            if stride == 0 {
                continue;
            }
            let plane = &mut self.planes[index];
            for row in plane.chunks_mut(stride).take(rows) {
                let len = row_bytes.min(row.len());
                let row = &mut row[..len];
                match format {
                    PixelFormat::Yuv420p
                    | PixelFormat::Yuv422p
                    | PixelFormat::Yuv444p
                    | PixelFormat::Nv12 => row.fill(if chroma { 128 } else { level }),
                    PixelFormat::Yuv420p10 => {
                        let value: u16 = if chroma { 512 } else { u16::from(level) << 2 };
                        fill_words(row, &value.to_le_bytes());
                    }
                    PixelFormat::P010le => {
                        let value: u16 = if chroma { 0x8000 } else { u16::from(level) << 8 };
                        fill_words(row, &value.to_le_bytes());
                    }
                    PixelFormat::Bgra | PixelFormat::Rgba => {
                        fill_words(row, &[level, level, level, 0xff]);
                    }
                    PixelFormat::X2Rgb10le => {
                        let v = u32::from(level) << 2 | u32::from(level) >> 6;
                        fill_words(row, &(v << 20 | v << 10 | v).to_le_bytes());
                    }
                    PixelFormat::Rgb48le => fill_words(row, &wide.to_le_bytes()),
                    _ => row.fill(level),
                }
            }
        }
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("strides", &self.strides)
            .finish_non_exhaustive()
    }
}

/**
    A raw audio frame.

    Samples are stored contiguously. Packed formats use a single interleaved
    plane; planar formats store one plane per channel, each `capacity`
    samples long. Only the first `samples` samples of each plane are valid.
*/
#[derive(Clone, PartialEq)]
pub struct AudioFrame {
    sample_rate: u32,
    channels: ChannelLayout,
    format: SampleFormat,
    samples: usize,
    capacity: usize,
    data: Vec<u8>,
}

impl AudioFrame {
    /**
        Allocate a silent frame holding `samples` samples per channel.
    */
    pub fn new(
        sample_rate: u32,
        channels: ChannelLayout,
        format: SampleFormat,
        samples: usize,
    ) -> Self {
        let mut frame = Self::with_capacity(sample_rate, channels, format, samples);
        frame.samples = samples;
        frame
    }

    /**
        Allocate an empty frame that can hold up to `capacity` samples per
        channel.
    */
    pub fn with_capacity(
        sample_rate: u32,
        channels: ChannelLayout,
        format: SampleFormat,
        capacity: usize,
    ) -> Self {
        let bytes = capacity * channels.channels() as usize * format.bytes_per_sample();
        Self {
            sample_rate,
            channels,
            format,
            samples: 0,
            capacity,
            data: vec![0; bytes],
        }
    }

    /**
        Wrap a contiguous sample buffer.

        The buffer length must be a whole number of samples across all
        channels. Planar data is expected plane after plane.
    */
    pub fn from_data(
        sample_rate: u32,
        channels: ChannelLayout,
        format: SampleFormat,
        data: Vec<u8>,
    ) -> Result<Self> {
        let frame_bytes = channels.channels() as usize * format.bytes_per_sample();
        if data.len() % frame_bytes != 0 {
            return Err(Error::invalid_data(format!(
                "{} bytes is not a whole number of {channels} {format} samples",
                data.len()
            )));
        }
        let samples = data.len() / frame_bytes;
        Ok(Self {
            sample_rate,
            channels,
            format,
            samples,
            capacity: samples,
            data,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> ChannelLayout {
        self.channels
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Number of valid samples per channel.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Maximum number of samples per channel.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    /**
        Set the number of valid samples. Fails above capacity.
    */
    pub fn set_samples(&mut self, samples: usize) -> Result<()> {
        if samples > self.capacity {
            return Err(Error::invalid_data(format!(
                "{samples} samples exceeds frame capacity {}",
                self.capacity
            )));
        }
        self.samples = samples;
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples as f64 / self.sample_rate as f64)
    }

    pub fn plane_count(&self) -> usize {
        if self.format.is_planar() {
            self.channels.channels() as usize
        } else {
            1
        }
    }

    /// Bytes one sample occupies within a single plane.
    fn sample_stride(&self) -> usize {
        if self.format.is_planar() {
            self.format.bytes_per_sample()
        } else {
            self.format.bytes_per_sample() * self.channels.channels() as usize
        }
    }

    /**
        The valid region of each plane.
    */
    pub fn planes(&self) -> Vec<&[u8]> {
        let plane_len = self.capacity * self.sample_stride();
        let valid = self.samples * self.sample_stride();
        if plane_len == 0 {
            return vec![<&[u8]>::default(); self.plane_count()];
        }
        self.data
            .chunks(plane_len)
            .map(|plane| &plane[..valid])
            .collect()
    }

    /**
        The valid region of each plane, mutably.
    */
    pub fn planes_mut(&mut self) -> Vec<&mut [u8]> {
        let plane_len = self.capacity * self.sample_stride();
        let valid = self.samples * self.sample_stride();
        if plane_len == 0 {
            return (0..self.plane_count()).map(|_| <&mut [u8]>::default()).collect();
        }
        self.data
            .chunks_mut(plane_len)
            .map(|plane| &mut plane[..valid])
            .collect()
    }

    /**
        The unused tail of each plane, past the valid samples. Producers that
        append write here and then grow the count with [`AudioFrame::set_samples`].
    */
    pub fn spare_planes_mut(&mut self) -> Vec<&mut [u8]> {
        let plane_len = self.capacity * self.sample_stride();
        let valid = self.samples * self.sample_stride();
        if plane_len == 0 {
            return (0..self.plane_count()).map(|_| <&mut [u8]>::default()).collect();
        }
        self.data
            .chunks_mut(plane_len)
            .map(|plane| &mut plane[valid..])
            .collect()
    }

    /**
        Copy samples in from a contiguous buffer laid out like
        [`AudioFrame::from_data`] expects. The buffer must hold exactly
        `samples()` samples per channel.
    */
    pub fn fill(&mut self, src: &[u8]) -> Result<()> {
        let plane_bytes = self.samples * self.sample_stride();
        let expected = plane_bytes * self.plane_count();
        if src.len() != expected {
            return Err(Error::invalid_data(format!(
                "expected {expected} bytes of samples, got {}",
                src.len()
            )));
        }
        if plane_bytes == 0 {
            return Ok(());
        }
        for (dst, src) in self.planes_mut().into_iter().zip(src.chunks(plane_bytes)) {
            dst.copy_from_slice(src);
        }
        Ok(())
    }

    /**
        Zero all samples (silence for signed and float formats).
    */
    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}

impl std::fmt::Debug for AudioFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFrame")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("format", &self.format)
            .field("samples", &self.samples)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

fn required_len(
    format: PixelFormat,
    plane: usize,
    width: u32,
    height: u32,
    stride: usize,
) -> Result<usize> {
    let row_bytes = format.plane_row_bytes(plane, width);
    let rows = format.plane_rows(plane, height);
    if stride < row_bytes {
        return Err(Error::invalid_data(format!(
            "plane {plane} stride {stride} is shorter than a {row_bytes}-byte row"
        )));
    }
    Ok(match rows {
        0 => 0,
        rows => stride * (rows - 1) + row_bytes,
    })
}

/**
    Copy `rows` rows of `row_bytes` bytes between two strided buffers.
*/
pub(crate) fn copy_plane(
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    row_bytes: usize,
    rows: usize,
) {
    for row in 0..rows {
        let src_row = &src[row * src_stride..row * src_stride + row_bytes];
        dst[row * dst_stride..row * dst_stride + row_bytes].copy_from_slice(src_row);
    }
}

fn fill_words(row: &mut [u8], word: &[u8]) {
    for chunk in row.chunks_exact_mut(word.len()) {
        chunk.copy_from_slice(word);
    }
}

/*!
    Video encoder over libavcodec.
*/

use std::os::raw::c_int;

use ffmpeg_next::{
    Codec, Dictionary, Rational as FFmpegRational,
    codec::{self, encoder::Video as VideoEncoderFFmpeg},
    encoder, ffi,
    util::frame::video::Video as VideoFrameFFmpeg,
};

use ffmpeg_transform::ffmpeg::pixel_format_to_ffmpeg;
use ffmpeg_types::{Error, Rational, Result, VideoFrame};

use crate::backend::{
    EncoderDescriptor, PacketSource, Poll, VideoEncoderSettings, VideoEncoding,
};

use super::device::HardwareDevice;
use super::{apply_common, receive};

/**
    An opened libavcodec video encoder.

    Frames are copied into a reusable FFmpeg frame in the encoder's software
    input format. Hardware encoders then get a fresh surface from their frame
    pool and the software frame is uploaded into it.
*/
pub struct FfmpegVideoEncoder {
    encoder: VideoEncoderFFmpeg,
    codec: Codec,
    name: String,
    time_base: Rational,
    upload: VideoFrameFFmpeg,
    hardware: bool,
}

impl FfmpegVideoEncoder {
    pub(crate) fn open(
        descriptor: &EncoderDescriptor,
        settings: &VideoEncoderSettings,
        device: Option<&HardwareDevice>,
    ) -> Result<Self> {
        let codec = encoder::find_by_name(&descriptor.name)
            .ok_or_else(|| Error::encoder_not_found(descriptor.name.clone()))?;

        let mut encoder = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| Error::codec(e.to_string()))?;

        encoder.set_width(settings.width);
        encoder.set_height(settings.height);
        encoder.set_format(pixel_format_to_ffmpeg(settings.pixel_format)?);
        let frame_rate = FFmpegRational::new(settings.frame_rate.num, settings.frame_rate.den);
        encoder.set_frame_rate(Some(frame_rate));
        encoder.set_time_base(FFmpegRational::new(settings.time_base.num, settings.time_base.den));
        apply_common(&mut encoder, settings.bitrate, settings.global_header);

        // SAFETY: the context is allocated and not yet opened.
        unsafe {
            let context = encoder.as_mut_ptr();
            if (*context).gop_size > settings.gop_cap as c_int {
                (*context).gop_size = settings.gop_cap as c_int;
            }
            if (*context).bit_rate_tolerance as u64 > settings.tolerance_cap {
                (*context).bit_rate_tolerance = settings.tolerance_cap as c_int;
            }
        }

        let software_format = match (&settings.hardware, device) {
            (Some(hardware), Some(device)) => {
                let frames = device.create_frames(hardware)?;
                // SAFETY: the context takes ownership of the new reference
                // and releases it when freed.
                unsafe {
                    (*encoder.as_mut_ptr()).hw_frames_ctx = frames.new_ref()?;
                }
                hardware.software_format
            }
            (Some(_), None) => {
                return Err(Error::io("hardware encoder opened without a device"));
            }
            (None, _) => settings.pixel_format,
        };

        let mut options = Dictionary::new();
        if let Some(preset) = settings.preset {
            options.set("preset", preset);
        }

        let encoder = encoder
            .open_with(options)
            .map_err(|e| Error::codec(format!("failed to open {}: {e}", descriptor.name)))?;

        Ok(Self {
            encoder,
            codec,
            name: descriptor.name.clone(),
            time_base: settings.time_base,
            upload: VideoFrameFFmpeg::new(
                pixel_format_to_ffmpeg(software_format)?,
                settings.width,
                settings.height,
            ),
            hardware: settings.hardware.is_some(),
        })
    }

    pub(crate) fn codec(&self) -> Codec {
        self.codec
    }

    pub(crate) fn context(&self) -> &VideoEncoderFFmpeg {
        &self.encoder
    }

    /**
        Upload the staged software frame into a surface from the pool.
    */
    fn upload_to_surface(&self) -> Result<VideoFrameFFmpeg> {
        let mut surface = VideoFrameFFmpeg::empty();
        // SAFETY: the encoder was opened with a frame pool, and the upload
        // frame matches its software format and size.
        unsafe {
            let pool = (*self.encoder.as_ptr()).hw_frames_ctx;
            let ret = ffi::av_hwframe_get_buffer(pool, surface.as_mut_ptr(), 0);
            if ret < 0 {
                return Err(Error::io(format!(
                    "failed to get hardware surface: {}",
                    ffmpeg_next::Error::from(ret)
                )));
            }
            let ret = ffi::av_hwframe_transfer_data(surface.as_mut_ptr(), self.upload.as_ptr(), 0);
            if ret < 0 {
                return Err(Error::io(format!(
                    "failed to upload to hardware surface: {}",
                    ffmpeg_next::Error::from(ret)
                )));
            }
        }
        Ok(surface)
    }
}

impl PacketSource for FfmpegVideoEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn time_base(&self) -> Rational {
        self.time_base
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

impl VideoEncoding for FfmpegVideoEncoder {
    fn send_frame(&mut self, frame: &VideoFrame, pts: i64) -> Result<()> {
        copy_into(&mut self.upload, frame)?;

        let sent = if self.hardware {
            let mut surface = self.upload_to_surface()?;
            surface.set_pts(Some(pts));
            self.encoder.send_frame(&surface)
        } else {
            self.upload.set_pts(Some(pts));
            self.encoder.send_frame(&self.upload)
        };
        sent.map_err(|e| Error::codec(format!("failed to encode video frame: {e}")))
    }
}

/**
    Copy a frame into an FFmpeg frame of the same shape, row by row.
*/
fn copy_into(dst: &mut VideoFrameFFmpeg, src: &VideoFrame) -> Result<()> {
    if dst.width() != src.width() || dst.height() != src.height() {
        return Err(Error::invalid_data(format!(
            "frame is {}x{}, encoder expects {}x{}",
            src.width(),
            src.height(),
            dst.width(),
            dst.height()
        )));
    }

    // The encoder may still reference the previous frame's buffers
    // SAFETY: dst is an allocated video frame.
    let ret = unsafe { ffi::av_frame_make_writable(dst.as_mut_ptr()) };
    if ret < 0 {
        return Err(Error::io(format!(
            "failed to make frame writable: {}",
            ffmpeg_next::Error::from(ret)
        )));
    }

    let format = src.format();
    for plane in 0..format.plane_count() {
        let row_bytes = format.plane_row_bytes(plane, src.width());
        let rows = format.plane_rows(plane, src.height());
        let src_stride = src.stride(plane);
        let dst_stride = dst.stride(plane);
        let src_data = src.plane(plane);
        let dst_data = dst.data_mut(plane);
        for row in 0..rows {
            dst_data[row * dst_stride..][..row_bytes]
                .copy_from_slice(&src_data[row * src_stride..][..row_bytes]);
        }
    }
    Ok(())
}

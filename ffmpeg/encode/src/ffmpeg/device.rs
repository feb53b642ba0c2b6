/*!
    Hardware device and frame pool contexts.
*/

use std::os::raw::c_int;
use std::ptr;

use ffmpeg_next::ffi;
use tracing::debug;

use ffmpeg_transform::ffmpeg::pixel_format_to_ffmpeg;
use ffmpeg_types::{Error, PixelFormat, Result};

use crate::backend::HardwareFrames;

/**
    A hardware device context.

    Owns one reference to an `AVHWDeviceContext`. Encoders that upload into
    the device's frame pool hold their own references, so dropping this only
    releases the device once they are gone too.
*/
pub struct HardwareDevice {
    buffer: BufferRef,
    surface: PixelFormat,
}

impl HardwareDevice {
    /**
        Create a device able to host surfaces of the given format.
    */
    pub fn create(surface: PixelFormat) -> Result<Self> {
        let kind = device_type(surface)?;
        let mut buffer: *mut ffi::AVBufferRef = ptr::null_mut();
        // SAFETY: buffer is a valid out pointer; no device name or options.
        let ret = unsafe {
            ffi::av_hwdevice_ctx_create(&mut buffer, kind, ptr::null(), ptr::null_mut(), 0)
        };
        if ret < 0 || buffer.is_null() {
            return Err(Error::io(format!(
                "failed to create {surface} device: {}",
                ffmpeg_next::Error::from(ret)
            )));
        }
        debug!(%surface, "created hardware device");
        Ok(Self {
            buffer: BufferRef(buffer),
            surface,
        })
    }

    pub fn surface(&self) -> PixelFormat {
        self.surface
    }

    /**
        Allocate and initialize a frame pool on this device.
    */
    pub(crate) fn create_frames(&self, frames: &HardwareFrames) -> Result<BufferRef> {
        let surface = pixel_format_to_ffmpeg(frames.surface)?;
        let software = pixel_format_to_ffmpeg(frames.software_format)?;

        // SAFETY: the device reference is valid for the lifetime of self.
        let buffer = unsafe { ffi::av_hwframe_ctx_alloc(self.buffer.0) };
        if buffer.is_null() {
            return Err(Error::io("failed to allocate hardware frame pool"));
        }
        let buffer = BufferRef(buffer);

        // SAFETY: av_hwframe_ctx_alloc returns a buffer whose data is an
        // AVHWFramesContext, not yet initialized.
        let ret = unsafe {
            let context = (*buffer.0).data as *mut ffi::AVHWFramesContext;
            (*context).format = surface.into();
            (*context).sw_format = software.into();
            (*context).width = frames.width as c_int;
            (*context).height = frames.height as c_int;
            if let Some(size) = frames.initial_pool_size {
                (*context).initial_pool_size = size as c_int;
            }
            ffi::av_hwframe_ctx_init(buffer.0)
        };
        if ret < 0 {
            return Err(Error::io(format!(
                "failed to initialize hardware frame pool: {}",
                ffmpeg_next::Error::from(ret)
            )));
        }
        debug!(?frames, "created hardware frame pool");
        Ok(buffer)
    }
}

impl std::fmt::Debug for HardwareDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareDevice")
            .field("surface", &self.surface)
            .finish_non_exhaustive()
    }
}

/**
    An owned `AVBufferRef`, unreferenced on drop.
*/
pub(crate) struct BufferRef(*mut ffi::AVBufferRef);

impl BufferRef {
    /**
        A new reference to the same buffer, for FFmpeg structures that take
        ownership of one.
    */
    pub(crate) fn new_ref(&self) -> Result<*mut ffi::AVBufferRef> {
        // SAFETY: self.0 is a valid buffer reference.
        let buffer = unsafe { ffi::av_buffer_ref(self.0) };
        if buffer.is_null() {
            return Err(Error::io("failed to reference hardware buffer"));
        }
        Ok(buffer)
    }
}

impl Drop for BufferRef {
    fn drop(&mut self) {
        // SAFETY: we own exactly one reference; av_buffer_unref nulls it.
        unsafe { ffi::av_buffer_unref(&mut self.0) };
    }
}

fn device_type(surface: PixelFormat) -> Result<ffi::AVHWDeviceType> {
    match surface {
        PixelFormat::Cuda => Ok(ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA),
        PixelFormat::D3d11 => Ok(ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_D3D11VA),
        PixelFormat::Qsv => Ok(ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_QSV),
        PixelFormat::Vaapi => Ok(ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_VAAPI),
        _ => Err(Error::unsupported_format(format!(
            "{surface} is not a hardware surface format"
        ))),
    }
}

/*!
    Hardware encoder capabilities.
*/

use serde::Serialize;
use tracing::info;

use ffmpeg_types::{CodecId, PixelFormat};

use crate::backend::Backend;

/**
    Hardware encoder family.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HardwareFamily {
    /// NVIDIA NVENC.
    Nvenc,
    /// Intel Quick Sync Video.
    Qsv,
}

impl HardwareFamily {
    /// Families in order of preference.
    pub const ALL: [HardwareFamily; 2] = [Self::Nvenc, Self::Qsv];

    /**
        Encoder implementation name for a codec, if the family has one.
    */
    pub const fn encoder_name(self, codec: CodecId) -> Option<&'static str> {
        match (self, codec) {
            (Self::Nvenc, CodecId::H264) => Some("h264_nvenc"),
            (Self::Nvenc, CodecId::H265) => Some("hevc_nvenc"),
            (Self::Qsv, CodecId::H264) => Some("h264_qsv"),
            (Self::Qsv, CodecId::H265) => Some("hevc_qsv"),
            _ => None,
        }
    }

    /**
        Family of a named encoder implementation.
    */
    pub fn of_encoder(name: &str) -> Option<Self> {
        if name.ends_with("_nvenc") {
            Some(Self::Nvenc)
        } else if name.ends_with("_qsv") {
            Some(Self::Qsv)
        } else {
            None
        }
    }

    /**
        Pixel format the family is fed with.

        NVENC takes device surfaces (Direct3D 11 on Windows, CUDA elsewhere).
        Quick Sync is fed NV12 from system memory.
    */
    pub const fn input_format(self) -> PixelFormat {
        match self {
            Self::Nvenc if cfg!(windows) => PixelFormat::D3d11,
            Self::Nvenc => PixelFormat::Cuda,
            Self::Qsv => PixelFormat::Nv12,
        }
    }
}

/**
    Which hardware encoders are usable on this machine.

    Detected once with [`HardwareCapabilities::detect`] and handed to every
    writer, so probing cost is paid only once per process.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HardwareCapabilities {
    pub h264_nvenc: bool,
    pub h264_qsv: bool,
    pub hevc_nvenc: bool,
    pub hevc_qsv: bool,
}

impl HardwareCapabilities {
    /**
        No hardware encoders. Every session uses software encoding.
    */
    pub fn none() -> Self {
        Self::default()
    }

    /**
        Probe each hardware encoder by opening it with a representative
        configuration.
    */
    pub fn detect<B: Backend>(backend: &B) -> Self {
        let capabilities = Self {
            h264_nvenc: backend.probe_encoder("h264_nvenc"),
            h264_qsv: backend.probe_encoder("h264_qsv"),
            hevc_nvenc: backend.probe_encoder("hevc_nvenc"),
            hevc_qsv: backend.probe_encoder("hevc_qsv"),
        };
        info!(
            h264_nvenc = capabilities.h264_nvenc,
            h264_qsv = capabilities.h264_qsv,
            hevc_nvenc = capabilities.hevc_nvenc,
            hevc_qsv = capabilities.hevc_qsv,
            "hardware encoder capabilities"
        );
        capabilities
    }

    pub fn supports(&self, family: HardwareFamily, codec: CodecId) -> bool {
        match (family, codec) {
            (HardwareFamily::Nvenc, CodecId::H264) => self.h264_nvenc,
            (HardwareFamily::Nvenc, CodecId::H265) => self.hevc_nvenc,
            (HardwareFamily::Qsv, CodecId::H264) => self.h264_qsv,
            (HardwareFamily::Qsv, CodecId::H265) => self.hevc_qsv,
            _ => false,
        }
    }

    /**
        Name of the preferred usable hardware encoder for a codec.
    */
    pub fn preferred_encoder(&self, codec: CodecId) -> Option<&'static str> {
        HardwareFamily::ALL
            .into_iter()
            .find(|family| self.supports(*family, codec))
            .and_then(|family| family.encoder_name(codec))
    }

    pub fn any(&self) -> bool {
        self.h264_nvenc || self.h264_qsv || self.hevc_nvenc || self.hevc_qsv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nvenc_is_preferred_over_qsv() {
        let caps = HardwareCapabilities {
            h264_nvenc: true,
            h264_qsv: true,
            ..HardwareCapabilities::none()
        };
        assert_eq!(caps.preferred_encoder(CodecId::H264), Some("h264_nvenc"));
        assert_eq!(caps.preferred_encoder(CodecId::H265), None);
    }

    #[test]
    fn qsv_used_when_only_option() {
        let caps = HardwareCapabilities {
            hevc_qsv: true,
            ..HardwareCapabilities::none()
        };
        assert_eq!(caps.preferred_encoder(CodecId::H265), Some("hevc_qsv"));
        assert!(caps.any());
        assert!(!HardwareCapabilities::none().any());
    }

    #[test]
    fn only_avc_family_has_hardware_encoders() {
        let caps = HardwareCapabilities {
            h264_nvenc: true,
            h264_qsv: true,
            hevc_nvenc: true,
            hevc_qsv: true,
        };
        assert_eq!(caps.preferred_encoder(CodecId::Vp9), None);
        assert_eq!(caps.preferred_encoder(CodecId::Aac), None);
    }

    #[test]
    fn family_from_encoder_name() {
        assert_eq!(HardwareFamily::of_encoder("hevc_nvenc"), Some(HardwareFamily::Nvenc));
        assert_eq!(HardwareFamily::of_encoder("h264_qsv"), Some(HardwareFamily::Qsv));
        assert_eq!(HardwareFamily::of_encoder("libx264"), None);
    }

    #[test]
    fn family_input_formats() {
        assert!(HardwareFamily::Nvenc.input_format().is_hardware());
        assert_eq!(HardwareFamily::Qsv.input_format(), PixelFormat::Nv12);
    }
}

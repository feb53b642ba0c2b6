/*!
    FFmpeg-backed format catalog and codec identifier mappings.
*/

use std::ffi::{CStr, CString, c_char, c_void};
use std::ptr;

use ffmpeg_next::{codec::Id, ffi};

use ffmpeg_types::{CodecId, Error, Result};

use crate::catalog::{FormatCatalog, FormatInfo};

/**
    The muxers compiled into the linked FFmpeg.
*/
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegFormats;

impl FormatCatalog for FfmpegFormats {
    fn formats(&self) -> Vec<FormatInfo> {
        let mut formats = Vec::new();
        let mut opaque: *mut c_void = ptr::null_mut();
        loop {
            // SAFETY: av_muxer_iterate only reads and advances the opaque cursor.
            let muxer = unsafe { ffi::av_muxer_iterate(&mut opaque) };
            if muxer.is_null() {
                break;
            }
            // SAFETY: muxers returned by FFmpeg are static and non-null here.
            formats.push(unsafe { describe(muxer) });
        }
        formats
    }

    fn find(&self, name: &str) -> Option<FormatInfo> {
        let name = CString::new(name).ok()?;
        // SAFETY: the name is a valid C string for the duration of the call.
        let muxer = unsafe { ffi::av_guess_format(name.as_ptr(), ptr::null(), ptr::null()) };
        if muxer.is_null() {
            return None;
        }
        // SAFETY: checked for null above; muxers are static.
        Some(unsafe { describe(muxer) })
    }

    fn guess(&self, destination: &str) -> Option<FormatInfo> {
        let destination = CString::new(destination).ok()?;
        // SAFETY: the filename is a valid C string for the duration of the call.
        let muxer =
            unsafe { ffi::av_guess_format(ptr::null(), destination.as_ptr(), ptr::null()) };
        if muxer.is_null() {
            return None;
        }
        // SAFETY: checked for null above; muxers are static.
        Some(unsafe { describe(muxer) })
    }
}

/**
    Build a [`FormatInfo`] from a muxer descriptor.

    # Safety

    `muxer` must point to a valid `AVOutputFormat`.
*/
pub(crate) unsafe fn describe(muxer: *const ffi::AVOutputFormat) -> FormatInfo {
    // SAFETY: guaranteed by the caller.
    let muxer = unsafe { &*muxer };
    let extensions = unsafe { c_string(muxer.extensions) }
        .map(|list| {
            list.split(',')
                .filter(|ext| !ext.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    FormatInfo {
        name: unsafe { c_string(muxer.name) }.unwrap_or_default(),
        long_name: unsafe { c_string(muxer.long_name) }.unwrap_or_default(),
        extensions,
        video_codec: codec_id_from_ffmpeg(Id::from(muxer.video_codec)),
        audio_codec: codec_id_from_ffmpeg(Id::from(muxer.audio_codec)),
    }
}

/**
    # Safety

    `value` must be null or point to a NUL-terminated string.
*/
unsafe fn c_string(value: *const c_char) -> Option<String> {
    if value.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller.
    Some(unsafe { CStr::from_ptr(value) }.to_string_lossy().into_owned())
}

/**
    Convert our CodecId to FFmpeg's codec ID.
*/
pub fn codec_id_to_ffmpeg(codec: CodecId) -> Result<Id> {
    match codec {
        CodecId::H264 => Ok(Id::H264),
        CodecId::H265 => Ok(Id::HEVC),
        CodecId::Mpeg4 => Ok(Id::MPEG4),
        CodecId::Vp8 => Ok(Id::VP8),
        CodecId::Vp9 => Ok(Id::VP9),
        CodecId::Av1 => Ok(Id::AV1),
        CodecId::Aac => Ok(Id::AAC),
        CodecId::Opus => Ok(Id::OPUS),
        CodecId::Mp3 => Ok(Id::MP3),
        CodecId::Vorbis => Ok(Id::VORBIS),
        CodecId::Flac => Ok(Id::FLAC),
        CodecId::Ac3 => Ok(Id::AC3),
        _ => Err(Error::unsupported_format(format!(
            "codec {:?} not supported",
            codec
        ))),
    }
}

/**
    Convert FFmpeg's codec ID to ours, if we represent it.
*/
pub fn codec_id_from_ffmpeg(id: Id) -> Option<CodecId> {
    match id {
        Id::H264 => Some(CodecId::H264),
        Id::HEVC => Some(CodecId::H265),
        Id::MPEG4 => Some(CodecId::Mpeg4),
        Id::VP8 => Some(CodecId::Vp8),
        Id::VP9 => Some(CodecId::Vp9),
        Id::AV1 => Some(CodecId::Av1),
        Id::AAC => Some(CodecId::Aac),
        Id::OPUS => Some(CodecId::Opus),
        Id::MP3 => Some(CodecId::Mp3),
        Id::VORBIS => Some(CodecId::Vorbis),
        Id::FLAC => Some(CodecId::Flac),
        Id::AC3 => Some(CodecId::Ac3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_knows_common_muxers() {
        let formats = FfmpegFormats;
        let all = formats.list();
        assert!(all.iter().any(|(_, name)| name == "matroska"));
        assert_eq!(formats.extensions("matroska").as_deref(), Some("mkv"));
        assert!(formats.long_name("mp4").is_some());
    }

    #[test]
    fn unknown_names_are_absent() {
        let formats = FfmpegFormats;
        assert_eq!(formats.long_name("no-such-muxer"), None);
        assert_eq!(formats.extensions("no-such-muxer"), None);
    }

    #[test]
    fn guess_from_file_name() {
        let guessed = FfmpegFormats.guess("capture.mkv").map(|f| f.name);
        assert_eq!(guessed.as_deref(), Some("matroska"));
    }

    #[test]
    fn codec_ids_map_both_ways() {
        for codec in [CodecId::H264, CodecId::H265, CodecId::Aac, CodecId::Opus] {
            let id = codec_id_to_ffmpeg(codec).unwrap();
            assert_eq!(codec_id_from_ffmpeg(id), Some(codec));
        }
        assert_eq!(codec_id_from_ffmpeg(Id::PRORES), None);
    }
}

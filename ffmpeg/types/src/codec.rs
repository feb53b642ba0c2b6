/*!
    Codec identifiers and codec selection.
*/

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/**
    Codec identifier.

    Covers the codecs the writer knows how to negotiate. Container defaults
    outside this set are treated as unknown.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum CodecId {
    H264,
    #[serde(alias = "hevc")]
    H265,
    Mpeg4,
    Vp8,
    Vp9,
    Av1,
    Aac,
    Opus,
    Mp3,
    Vorbis,
    Flac,
    Ac3,
}

impl CodecId {
    pub const fn is_video(self) -> bool {
        matches!(
            self,
            Self::H264 | Self::H265 | Self::Mpeg4 | Self::Vp8 | Self::Vp9 | Self::Av1
        )
    }

    pub const fn is_audio(self) -> bool {
        !self.is_video()
    }

    /**
        Returns true for the codec families hardware encoders exist for.
    */
    pub const fn is_avc_family(self) -> bool {
        matches!(self, Self::H264 | Self::H265)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H265 => "h265",
            Self::Mpeg4 => "mpeg4",
            Self::Vp8 => "vp8",
            Self::Vp9 => "vp9",
            Self::Av1 => "av1",
            Self::Aac => "aac",
            Self::Opus => "opus",
            Self::Mp3 => "mp3",
            Self::Vorbis => "vorbis",
            Self::Flac => "flac",
            Self::Ac3 => "ac3",
        }
    }

    const ALL: [CodecId; 12] = [
        Self::H264,
        Self::H265,
        Self::Mpeg4,
        Self::Vp8,
        Self::Vp9,
        Self::Av1,
        Self::Aac,
        Self::Opus,
        Self::Mp3,
        Self::Vorbis,
        Self::Flac,
        Self::Ac3,
    ];
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CodecId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("hevc") {
            return Ok(Self::H265);
        }
        if s.eq_ignore_ascii_case("avc") {
            return Ok(Self::H264);
        }
        Self::ALL
            .into_iter()
            .find(|codec| codec.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::new("codec", s))
    }
}

/**
    Which codec a track should use.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CodecSelection {
    /// The track is omitted.
    None,
    /// Use the container's default codec for the medium.
    #[default]
    Probe,
    Codec(CodecId),
}

impl CodecSelection {
    /**
        Resolve the selection against a container's default codec.

        `container_default` is only consulted for [`CodecSelection::Probe`].
        Returns `Ok(None)` when the track should be omitted.
    */
    pub fn resolve<E>(
        self,
        container_default: impl FnOnce() -> std::result::Result<Option<CodecId>, E>,
    ) -> std::result::Result<Option<CodecId>, E> {
        match self {
            Self::None => Ok(None),
            Self::Probe => container_default(),
            Self::Codec(codec) => Ok(Some(codec)),
        }
    }
}

impl From<CodecId> for CodecSelection {
    fn from(codec: CodecId) -> Self {
        Self::Codec(codec)
    }
}

impl fmt::Display for CodecSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Probe => f.write_str("probe"),
            Self::Codec(codec) => fmt::Display::fmt(codec, f),
        }
    }
}

impl FromStr for CodecSelection {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "probe" | "auto" | "default" => Ok(Self::Probe),
            _ => s.parse().map(Self::Codec),
        }
    }
}

impl TryFrom<String> for CodecSelection {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CodecSelection> for String {
    fn from(selection: CodecSelection) -> Self {
        selection.to_string()
    }
}

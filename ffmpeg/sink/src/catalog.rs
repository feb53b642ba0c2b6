/*!
    Container format catalog.
*/

use std::path::Path;

use ffmpeg_types::CodecId;

/**
    Description of one container format (muxer).
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatInfo {
    /// Short name, e.g. `matroska`.
    pub name: String,
    /// Human readable name, e.g. `Matroska`.
    pub long_name: String,
    /// File extensions without dots, e.g. `["mkv"]`.
    pub extensions: Vec<String>,
    /// Codec used for video when none is requested.
    pub video_codec: Option<CodecId>,
    /// Codec used for audio when none is requested.
    pub audio_codec: Option<CodecId>,
}

/**
    Read-only view over the available container formats.

    Implementors only need to provide [`FormatCatalog::formats`]; the lookups
    have default implementations on top of it. The FFmpeg catalog overrides
    them with the library's own lookups.
*/
pub trait FormatCatalog {
    /**
        Every format, in catalog order.
    */
    fn formats(&self) -> Vec<FormatInfo>;

    /**
        Look up a format by short name.
    */
    fn find(&self, name: &str) -> Option<FormatInfo> {
        self.formats().into_iter().find(|format| format.name == name)
    }

    /**
        Guess the format of a destination from its file extension.
    */
    fn guess(&self, destination: &str) -> Option<FormatInfo> {
        let extension = Path::new(destination).extension()?.to_str()?;
        self.formats().into_iter().find(|format| {
            format
                .extensions
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(extension))
        })
    }

    /**
        Every format as a `(long name, short name)` pair.
    */
    fn list(&self) -> Vec<(String, String)> {
        self.formats()
            .into_iter()
            .map(|format| (format.long_name, format.name))
            .collect()
    }

    /**
        Comma-separated extension list for a format, if the format exists and
        declares any.
    */
    fn extensions(&self, name: &str) -> Option<String> {
        let format = self.find(name)?;
        if format.extensions.is_empty() {
            return None;
        }
        Some(format.extensions.join(","))
    }

    /**
        Human readable name of a format.
    */
    fn long_name(&self, name: &str) -> Option<String> {
        self.find(name).map(|format| format.long_name)
    }
}

/*!
    Media output and muxing for the ffmpeg crate ecosystem.

    This crate handles the output side of the media pipeline:

    - [`FormatCatalog`] answers questions about the container formats the
      linked FFmpeg build can write: which exist, their long names, file
      extensions and default codecs.
    - [`Sink`] (with the `ffmpeg` feature) writes encoded packets into a
      container: MP4 and MKV files, FLV over RTMP, MPEG-TS over UDP, etc.

    ```ignore
    use ffmpeg_sink::{FfmpegFormats, FormatCatalog};

    let formats = FfmpegFormats;
    for (long_name, name) in formats.list() {
        println!("{name:>12}  {long_name}");
    }
    assert_eq!(formats.extensions("matroska").as_deref(), Some("mkv"));
    ```
*/

pub use ffmpeg_types::{CodecId, Error, Packet, Rational, Result};

mod catalog;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
#[cfg(feature = "ffmpeg")]
mod sink;

pub use catalog::{FormatCatalog, FormatInfo};
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegFormats;
#[cfg(feature = "ffmpeg")]
pub use sink::Sink;

use anyhow::{Result, bail};
use clap::Parser;
use ffmpeg_sink::{FfmpegFormats, FormatCatalog};

#[derive(Parser, Debug)]
pub struct FormatsCommand {
    /// Short name of a format to describe
    pub name: Option<String>,
}

impl FormatsCommand {
    pub fn run(self) -> Result<()> {
        let catalog = FfmpegFormats;

        let Some(name) = self.name else {
            println!("Container formats:");
            for (long_name, name) in catalog.list() {
                println!("  {name:<16} {long_name}");
            }
            return Ok(());
        };

        let Some(format) = catalog.find(&name) else {
            bail!("unknown container format '{name}'");
        };
        let codec = |codec: Option<ffmpeg_types::CodecId>| {
            codec.map_or_else(|| "-".to_owned(), |codec| codec.to_string())
        };
        println!("Name:        {}", format.name);
        println!("Long name:   {}", format.long_name);
        println!("Extensions:  {}", catalog.extensions(&name).unwrap_or_default());
        println!("Video codec: {}", codec(format.video_codec));
        println!("Audio codec: {}", codec(format.audio_codec));
        Ok(())
    }
}

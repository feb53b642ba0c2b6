use anyhow::Result;
use clap::Parser;
use ffmpeg_encode::{FfmpegBackend, HardwareCapabilities, HardwareFamily};
use ffmpeg_types::CodecId;

#[derive(Parser, Debug)]
pub struct HardwareCommand {
    /// Print the probe result as JSON
    #[arg(long)]
    pub json: bool,
}

impl HardwareCommand {
    pub fn run(self) -> Result<()> {
        let backend = FfmpegBackend::new()?;
        let capabilities = HardwareCapabilities::detect(&backend);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&capabilities)?);
            return Ok(());
        }

        println!("Hardware encoders:");
        for family in HardwareFamily::ALL {
            for codec in [CodecId::H264, CodecId::H265] {
                let Some(name) = family.encoder_name(codec) else {
                    continue;
                };
                let status = if capabilities.supports(family, codec) {
                    "available"
                } else {
                    "unavailable"
                };
                println!("  {name:<12} {status}");
            }
        }
        Ok(())
    }
}

/*!
    Synthetic test media for the `record` command.
*/

use std::f64::consts::TAU;

use ffmpeg_encode::ASSUMED_AUDIO_INPUT;
use ffmpeg_types::{AudioFrame, PixelFormat, Rational, Result, SampleFormat, VideoFrame};

/// Peak amplitude of the generated tone, about -12 dBFS.
const TONE_AMPLITUDE: f64 = 8192.0;

/**
    Generates one video frame and the matching span of audio per tick.

    Video is a uniform gray that sweeps from black to white and back every
    two seconds. Audio is silence or a sine tone in the shape the writer
    assumes for input, so no resampler rebuild is needed.
*/
pub struct TestPattern {
    frame: VideoFrame,
    frame_rate: Rational,
    tone: Option<f64>,
    index: u64,
    samples_written: u64,
}

impl TestPattern {
    pub fn new(width: u32, height: u32, frame_rate: Rational, tone: Option<f64>) -> Self {
        Self {
            frame: VideoFrame::new(width, height, PixelFormat::Yuv420p),
            frame_rate,
            tone,
            index: 0,
            samples_written: 0,
        }
    }

    pub fn frames_generated(&self) -> u64 {
        self.index
    }

    /**
        Produce the next video frame and the audio covering the same interval.
    */
    pub fn next_tick(&mut self) -> Result<(&VideoFrame, AudioFrame)> {
        let level = self.gray_level();
        self.frame.fill_gray(level);
        let audio = self.audio_block()?;
        self.index += 1;
        Ok((&self.frame, audio))
    }

    fn gray_level(&self) -> u8 {
        let period = (self.frame_rate.to_f64() * 2.0).round().max(2.0) as u64;
        let phase = (self.index % period) as f64 / period as f64;
        let triangle = 1.0 - (2.0 * phase - 1.0).abs();
        (triangle * 255.0).round() as u8
    }

    /// Audio samples from stream start to the start of frame `index`.
    fn samples_until(&self, index: u64) -> u64 {
        let rate = u64::from(ASSUMED_AUDIO_INPUT.sample_rate);
        let num = self.frame_rate.num.max(1) as u64;
        let den = self.frame_rate.den.max(1) as u64;
        index * rate * den / num
    }

    fn audio_block(&mut self) -> Result<AudioFrame> {
        let shape = ASSUMED_AUDIO_INPUT;
        let samples =
            (self.samples_until(self.index + 1) - self.samples_until(self.index)) as usize;
        let mut block = AudioFrame::new(shape.sample_rate, shape.channels, shape.format, samples);

        if let Some(frequency) = self.tone {
            debug_assert_eq!(shape.format, SampleFormat::S16);
            let channels = shape.channels.channels() as usize;
            let mut data = Vec::with_capacity(samples * shape.frame_bytes());
            for offset in 0..samples as u64 {
                let t = (self.samples_written + offset) as f64 / f64::from(shape.sample_rate);
                let value = ((TAU * frequency * t).sin() * TONE_AMPLITUDE) as i16;
                for _ in 0..channels {
                    data.extend_from_slice(&value.to_le_bytes());
                }
            }
            block.fill(&data)?;
        }

        self.samples_written += samples as u64;
        Ok(block)
    }
}

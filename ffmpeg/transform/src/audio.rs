/*!
    Audio sample conversion.
*/

use tracing::debug;

use ffmpeg_types::{AudioFrame, Error, Result};

use crate::engine::{AudioShape, ResampleEngine, ResampleEngineFactory};

/**
    Sample converter.

    Converts audio between channel layouts, sample formats and sample rates.
    The resampler context is cached with the source and destination shape it
    was built for and rebuilt only when either changes.

    Two modes are offered:
    - [`Resampler::resample`] converts a buffer into an internal output buffer
      owned by the converter. Identical shapes pass the input through untouched.
    - [`Resampler::convert_frame`] appends into a caller-owned staging frame.
      This mode always runs through the engine, which then also serves as the
      sample FIFO between input chunks and fixed-size encoder frames.

    Note: resampling is stateful. Feed chunks in order, and drain with
    `convert_frame(None, ..)` at end of stream.
*/
pub struct Resampler<F: ResampleEngineFactory> {
    factory: F,
    /// Cached resampler context and the shapes it was created for.
    state: Option<ResamplerState<F::Engine>>,
    /// Output buffer for [`Resampler::resample`], grown geometrically.
    buffer: Vec<u8>,
}

struct ResamplerState<E> {
    src: AudioShape,
    dst: AudioShape,
    engine: Option<E>,
    /// Engine creation failed for these shapes.
    failed: bool,
}

impl<F: ResampleEngineFactory> Resampler<F> {
    /**
        Create a converter with no cached context.
    */
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            state: None,
            buffer: Vec::new(),
        }
    }

    /**
        Build (or keep) an engine for a shape pair.
    */
    pub fn prepare(&mut self, src: AudioShape, dst: AudioShape) -> Result<()> {
        self.ensure(src, dst, true)
    }

    /**
        Convert `samples` samples from `input` and return the converted buffer
        together with its sample count.

        Identical shapes return `input` itself. Otherwise the result borrows
        the converter's own buffer, valid until the next call. Planar output
        stores each channel plane back to back.
    */
    pub fn resample<'a>(
        &'a mut self,
        src: AudioShape,
        dst: AudioShape,
        input: &'a [u8],
        samples: usize,
    ) -> Result<(&'a [u8], usize)> {
        if src == dst {
            self.ensure(src, dst, false)?;
            return Ok((input, samples));
        }
        self.ensure(src, dst, true)?;

        let input_bytes = samples * src.frame_bytes();
        if input.len() < input_bytes {
            return Err(Error::invalid_data(format!(
                "{samples} samples need {input_bytes} bytes, got {}",
                input.len()
            )));
        }

        let Self { state, buffer, .. } = self;
        let engine = state
            .as_mut()
            .and_then(|state| state.engine.as_mut())
            .ok_or_else(|| Error::no_converter("resampler"))?;

        // Grow to twice the estimate so steady-state calls never reallocate
        let estimate = engine.output_samples(samples);
        let frame_bytes = dst.frame_bytes();
        if buffer.len() < estimate * frame_bytes {
            *buffer = vec![0; estimate * frame_bytes * 2];
            debug!(capacity = estimate * 2, "grew resampler output buffer");
        }
        let capacity = buffer.len() / frame_bytes;

        let in_planes = split_planes(&input[..input_bytes], src, samples);
        let out_plane_len = capacity * frame_bytes / dst.plane_count();
        let mut out_planes: Vec<&mut [u8]> = if out_plane_len == 0 {
            (0..dst.plane_count()).map(|_| <&mut [u8]>::default()).collect()
        } else {
            buffer.chunks_mut(out_plane_len).collect()
        };
        let produced = engine.convert(Some((&in_planes, samples)), &mut out_planes, capacity)?;

        // Close the gaps between planar channel planes
        let plane_stride = frame_bytes / dst.plane_count();
        if dst.plane_count() > 1 {
            for plane in 1..dst.plane_count() {
                let from = plane * out_plane_len;
                let to = plane * produced * plane_stride;
                buffer.copy_within(from..from + produced * plane_stride, to);
            }
        }

        Ok((&buffer[..produced * frame_bytes], produced))
    }

    /**
        Number of samples the next [`Resampler::resample`] call with
        `samples` input samples may produce, including buffered delay.
    */
    pub fn measure_output_samples(
        &mut self,
        src: AudioShape,
        dst: AudioShape,
        samples: usize,
    ) -> Result<usize> {
        if src == dst {
            self.ensure(src, dst, false)?;
            return Ok(samples);
        }
        self.ensure(src, dst, true)?;
        let engine = self
            .state
            .as_mut()
            .and_then(|state| state.engine.as_mut())
            .ok_or_else(|| Error::no_converter("resampler"))?;
        Ok(engine.output_samples(samples))
    }

    /**
        Push `input` through the engine and append converted samples to
        `output`, up to its capacity. Passing `None` drains buffered samples
        using the last source shape.

        Samples that do not fit stay buffered in the engine. Returns the
        number of samples appended.
    */
    pub fn convert_frame(
        &mut self,
        input: Option<&AudioFrame>,
        output: &mut AudioFrame,
    ) -> Result<usize> {
        let dst = AudioShape::of(output);
        let src = match input {
            Some(frame) => AudioShape::of(frame),
            None => match &self.state {
                Some(state) if state.engine.is_some() => state.src,
                _ => return Ok(0),
            },
        };
        self.ensure(src, dst, true)?;

        let engine = self
            .state
            .as_mut()
            .and_then(|state| state.engine.as_mut())
            .ok_or_else(|| Error::no_converter("resampler"))?;

        let spare = output.capacity() - output.samples();
        let in_planes = input.map(AudioFrame::planes);
        let pushed = match (&in_planes, input) {
            (Some(planes), Some(frame)) => Some((planes.as_slice(), frame.samples())),
            _ => None,
        };
        let produced = {
            let mut out_planes = output.spare_planes_mut();
            engine.convert(pushed, &mut out_planes, spare)?
        };
        output.set_samples(output.samples() + produced)?;
        Ok(produced)
    }

    /**
        Samples buffered inside the engine, expressed at `rate`.
    */
    pub fn delay(&mut self, rate: u32) -> i64 {
        self.state
            .as_mut()
            .and_then(|state| state.engine.as_mut())
            .map_or(0, |engine| engine.delay(rate))
    }

    /**
        Drop the cached context and any buffered samples.
    */
    pub fn reset(&mut self) {
        self.state = None;
    }

    /**
        Make sure the cached state matches the shape pair.

        `want_engine` is false for the passthrough path, which needs no engine.
        A failed build is remembered, so later calls for the same shapes report
        that no converter is initialized.
    */
    fn ensure(&mut self, src: AudioShape, dst: AudioShape, want_engine: bool) -> Result<()> {
        if let Some(state) = &self.state {
            if state.src == src && state.dst == dst {
                if state.engine.is_some() || !want_engine {
                    return Ok(());
                }
                if state.failed {
                    return Err(Error::no_converter(format!(
                        "{src:?} -> {dst:?}"
                    )));
                }
            }
        }

        // Drop the previous context before building its replacement
        self.state = None;

        if !want_engine {
            self.state = Some(ResamplerState {
                src,
                dst,
                engine: None,
                failed: false,
            });
            return Ok(());
        }

        match self.factory.create(src, dst) {
            Ok(engine) => {
                debug!(?src, ?dst, "built resampler context");
                self.state = Some(ResamplerState {
                    src,
                    dst,
                    engine: Some(engine),
                    failed: false,
                });
                Ok(())
            }
            Err(e) => {
                self.state = Some(ResamplerState {
                    src,
                    dst,
                    engine: None,
                    failed: true,
                });
                Err(e)
            }
        }
    }
}

impl<F: ResampleEngineFactory> std::fmt::Debug for Resampler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resampler")
            .field("src", &self.state.as_ref().map(|s| s.src))
            .field("dst", &self.state.as_ref().map(|s| s.dst))
            .field(
                "initialized",
                &self.state.as_ref().is_some_and(|s| s.engine.is_some()),
            )
            .finish_non_exhaustive()
    }
}

/**
    Split a contiguous buffer into its planes.
*/
fn split_planes(data: &[u8], shape: AudioShape, samples: usize) -> Vec<&[u8]> {
    let plane_len = samples * shape.frame_bytes() / shape.plane_count();
    if plane_len == 0 {
        return vec![<&[u8]>::default(); shape.plane_count()];
    }
    data.chunks(plane_len).collect()
}

/*!
    Video frame conversion.
*/

use tracing::{debug, warn};

use ffmpeg_types::{PixelFormat, VideoFrame};

use crate::engine::{ImageShape, ScaleEngine, ScaleEngineFactory};
use crate::unpack::unpack_x2rgb10;

/**
    Pixel converter.

    Converts images between sizes and pixel formats. The conversion context is
    cached together with the source and destination shape it was built for,
    and rebuilt only when either shape changes.

    Conversion failures are reported as `false` rather than as errors: a
    capture pipeline hands over whatever it has, and a bad frame should be
    skipped, not abort the session. A context is never built for degenerate
    geometry (a zero dimension), so every convert call with such a shape
    returns `false` without side effects.
*/
pub struct Scaler<F: ScaleEngineFactory> {
    factory: F,
    /// Cached route and the shapes it was created for.
    state: Option<ScalerState<F::Engine>>,
    /// Reused staging buffer for unpacked 10-bit rows.
    unpacked: Vec<u8>,
}

struct ScalerState<E> {
    src: ImageShape,
    dst: ImageShape,
    route: Route<E>,
}

enum Route<E> {
    /// No usable context for these shapes.
    Invalid,
    /// Shapes are identical: plain plane copy.
    Copy,
    /// Packed 10-bit source unpacked straight into the destination.
    Unpack,
    /// Packed 10-bit source unpacked, then converted by the engine.
    UnpackThen(E),
    Engine(E),
}

impl<F: ScaleEngineFactory> Scaler<F> {
    /**
        Create a converter with no cached context.
    */
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            state: None,
            unpacked: Vec::new(),
        }
    }

    /**
        Build (or keep) the context for a shape pair.

        Returns true if conversions between these shapes are possible.
    */
    pub fn prepare(&mut self, src: ImageShape, dst: ImageShape) -> bool {
        let needs_init = match &self.state {
            None => true,
            Some(state) => state.src != src || state.dst != dst,
        };

        if needs_init {
            // Drop the previous context before building its replacement
            self.state = None;
            let route = self.build_route(src, dst);
            self.state = Some(ScalerState { src, dst, route });
        }

        self.is_ready()
    }

    /**
        Returns true if a usable context is cached.
    */
    pub fn is_ready(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| !matches!(state.route, Route::Invalid))
    }

    /**
        Convert one image between caller-provided plane buffers.

        Returns false (and writes nothing) for degenerate shapes, buffers that
        are too small for their shape, or when no context could be built.
    */
    pub fn convert(
        &mut self,
        src: ImageShape,
        src_planes: &[&[u8]],
        src_strides: &[usize],
        dst: ImageShape,
        dst_planes: &mut [&mut [u8]],
        dst_strides: &[usize],
    ) -> bool {
        if !self.prepare(src, dst) {
            return false;
        }

        let src_lens: Vec<usize> = src_planes.iter().map(|p| p.len()).collect();
        let dst_lens: Vec<usize> = dst_planes.iter().map(|p| p.len()).collect();
        if !fits(src, &src_lens, src_strides) || !fits(dst, &dst_lens, dst_strides) {
            warn!(?src, ?dst, "plane buffers do not match their shape, skipping conversion");
            return false;
        }

        let Self {
            state, unpacked, ..
        } = self;
        let Some(state) = state.as_mut() else {
            return false;
        };

        let result = match &mut state.route {
            Route::Invalid => return false,
            Route::Copy => {
                for plane in 0..src.format.plane_count() {
                    copy_rows(
                        src_planes[plane],
                        src_strides[plane],
                        dst_planes[plane],
                        dst_strides[plane],
                        src.format.plane_row_bytes(plane, src.width),
                        src.format.plane_rows(plane, src.height),
                    );
                }
                Ok(())
            }
            Route::Unpack => {
                unpack_x2rgb10(
                    src_planes[0],
                    src_strides[0],
                    dst_planes[0],
                    dst_strides[0],
                    src.width as usize,
                    src.height as usize,
                );
                Ok(())
            }
            Route::UnpackThen(engine) => {
                let stride = PixelFormat::Rgb48le.plane_row_bytes(0, src.width);
                let len = stride * src.height as usize;
                if unpacked.len() < len {
                    unpacked.resize(len, 0);
                }
                unpack_x2rgb10(
                    src_planes[0],
                    src_strides[0],
                    unpacked,
                    stride,
                    src.width as usize,
                    src.height as usize,
                );
                engine.scale(&[&unpacked[..len]], &[stride], dst_planes, dst_strides)
            }
            Route::Engine(engine) => engine.scale(src_planes, src_strides, dst_planes, dst_strides),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(?src, ?dst, "conversion failed: {e}");
                false
            }
        }
    }

    /**
        Convert a whole frame into a preallocated destination frame, taking
        the shapes from the frames themselves.
    */
    pub fn convert_frame(&mut self, src: &VideoFrame, dst: &mut VideoFrame) -> bool {
        let src_shape = ImageShape::of(src);
        let dst_shape = ImageShape::of(dst);
        let dst_strides = dst.strides().to_vec();
        self.convert(
            src_shape,
            &src.planes(),
            src.strides(),
            dst_shape,
            &mut dst.planes_mut(),
            &dst_strides,
        )
    }

    fn build_route(&self, src: ImageShape, dst: ImageShape) -> Route<F::Engine> {
        if src.is_degenerate() || dst.is_degenerate() {
            debug!(?src, ?dst, "degenerate geometry, no conversion context");
            return Route::Invalid;
        }
        if src.format.is_hardware() || dst.format.is_hardware() {
            debug!(?src, ?dst, "hardware surfaces cannot be converted on the CPU");
            return Route::Invalid;
        }
        if src == dst {
            debug!(?src, "identical shapes, using plane copy");
            return Route::Copy;
        }

        // Packed 10-bit sources go through an unpacked intermediate
        let (engine_src, unpack) = match src.format.unpacked() {
            Some(format) => {
                let intermediate = ImageShape { format, ..src };
                if intermediate == dst {
                    debug!(?src, ?dst, "unpacking straight into destination");
                    return Route::Unpack;
                }
                (intermediate, true)
            }
            None => (src, false),
        };

        match self.factory.create(engine_src, dst) {
            Ok(engine) => {
                debug!(src = ?engine_src, ?dst, "built scaler context");
                if unpack {
                    Route::UnpackThen(engine)
                } else {
                    Route::Engine(engine)
                }
            }
            Err(e) => {
                warn!(src = ?engine_src, ?dst, "failed to create scaler: {e}");
                Route::Invalid
            }
        }
    }
}

impl<F: ScaleEngineFactory> std::fmt::Debug for Scaler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scaler")
            .field("src", &self.state.as_ref().map(|s| s.src))
            .field("dst", &self.state.as_ref().map(|s| s.dst))
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

/**
    Check that plane buffers are large enough for a shape.
*/
fn fits(shape: ImageShape, lens: &[usize], strides: &[usize]) -> bool {
    let planes = shape.format.plane_count();
    if lens.len() < planes || strides.len() < planes {
        return false;
    }
    (0..planes).all(|plane| {
        let row_bytes = shape.format.plane_row_bytes(plane, shape.width);
        let rows = shape.format.plane_rows(plane, shape.height);
        strides[plane] >= row_bytes
            && lens[plane] >= strides[plane] * rows.saturating_sub(1) + row_bytes
    })
}

fn copy_rows(
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    row_bytes: usize,
    rows: usize,
) {
    for row in 0..rows {
        let from = row * src_stride;
        let to = row * dst_stride;
        dst[to..to + row_bytes].copy_from_slice(&src[from..from + row_bytes]);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use ffmpeg_types::{Error, Result};

    use super::*;

    /// Records every engine it builds and fills destinations with a marker.
    #[derive(Clone, Default)]
    struct CountingFactory {
        built: Rc<RefCell<Vec<(ImageShape, ImageShape)>>>,
        fail: bool,
    }

    struct MarkerEngine;

    impl ScaleEngine for MarkerEngine {
        fn scale(
            &mut self,
            _src: &[&[u8]],
            _src_strides: &[usize],
            dst: &mut [&mut [u8]],
            _dst_strides: &[usize],
        ) -> Result<()> {
            for plane in dst.iter_mut() {
                plane.fill(0xab);
            }
            Ok(())
        }
    }

    impl ScaleEngineFactory for CountingFactory {
        type Engine = MarkerEngine;

        fn create(&self, src: ImageShape, dst: ImageShape) -> Result<MarkerEngine> {
            if self.fail {
                return Err(Error::unsupported_format("no engine"));
            }
            self.built.borrow_mut().push((src, dst));
            Ok(MarkerEngine)
        }
    }

    fn builds(factory: &CountingFactory) -> usize {
        factory.built.borrow().len()
    }

    #[test]
    fn rebuilds_only_when_shapes_change() {
        let factory = CountingFactory::default();
        let mut scaler = Scaler::new(factory.clone());
        let src = VideoFrame::new(64, 48, PixelFormat::Bgra);
        let mut dst = VideoFrame::new(32, 24, PixelFormat::Yuv420p);

        for _ in 0..5 {
            assert!(scaler.convert_frame(&src, &mut dst));
        }
        assert_eq!(builds(&factory), 1);
        assert!(dst.plane(0).iter().all(|&b| b == 0xab));

        let bigger = VideoFrame::new(128, 96, PixelFormat::Bgra);
        assert!(scaler.convert_frame(&bigger, &mut dst));
        assert!(scaler.convert_frame(&bigger, &mut dst));
        assert_eq!(builds(&factory), 2);

        let mut nv12 = VideoFrame::new(32, 24, PixelFormat::Nv12);
        assert!(scaler.convert_frame(&bigger, &mut nv12));
        assert_eq!(builds(&factory), 3);
    }

    #[test]
    fn identical_shapes_copy_without_engine() {
        let factory = CountingFactory::default();
        let mut scaler = Scaler::new(factory.clone());
        let mut src = VideoFrame::new(16, 16, PixelFormat::Yuv420p);
        src.fill_gray(77);
        let mut dst = VideoFrame::new(16, 16, PixelFormat::Yuv420p);

        assert!(scaler.convert_frame(&src, &mut dst));
        assert_eq!(dst, src);
        assert_eq!(builds(&factory), 0);
    }

    #[test]
    fn degenerate_geometry_fails_without_building() {
        let factory = CountingFactory::default();
        let mut scaler = Scaler::new(factory.clone());
        let src = VideoFrame::new(0, 48, PixelFormat::Bgra);
        let mut dst = VideoFrame::new(32, 24, PixelFormat::Yuv420p);

        assert!(!scaler.convert_frame(&src, &mut dst));
        assert!(!scaler.convert_frame(&src, &mut dst));
        assert!(!scaler.is_ready());
        assert_eq!(builds(&factory), 0);
        assert!(dst.plane(0).iter().all(|&b| b == 0));
    }

    #[test]
    fn short_buffers_are_rejected() {
        let factory = CountingFactory::default();
        let mut scaler = Scaler::new(factory.clone());
        let src_shape = ImageShape::new(4, 4, PixelFormat::Bgra);
        let dst_shape = ImageShape::new(4, 4, PixelFormat::Rgba);
        let src = [0u8; 8];
        let mut dst = [0u8; 64];

        let converted =
            scaler.convert(src_shape, &[&src], &[16], dst_shape, &mut [&mut dst], &[16]);
        assert!(!converted);
        assert!(dst.iter().all(|&b| b == 0));
    }

    #[test]
    fn engine_failure_is_reported_as_false() {
        let factory = CountingFactory {
            fail: true,
            ..CountingFactory::default()
        };
        let mut scaler = Scaler::new(factory);
        let src = VideoFrame::new(8, 8, PixelFormat::Bgra);
        let mut dst = VideoFrame::new(8, 8, PixelFormat::Nv12);
        assert!(!scaler.convert_frame(&src, &mut dst));
        assert!(!scaler.is_ready());
    }

    #[test]
    fn hardware_destination_is_not_convertible() {
        let factory = CountingFactory::default();
        let mut scaler = Scaler::new(factory.clone());
        let src = ImageShape::new(8, 8, PixelFormat::Nv12);
        let dst = ImageShape::new(8, 8, PixelFormat::D3d11);
        assert!(!scaler.prepare(src, dst));
        assert_eq!(builds(&factory), 0);
    }

    #[test]
    fn packed_ten_bit_unpacks_directly_into_rgb48() {
        let factory = CountingFactory::default();
        let mut scaler = Scaler::new(factory.clone());
        let mut src = VideoFrame::new(4, 2, PixelFormat::X2Rgb10le);
        src.fill_gray(0xff);
        let mut dst = VideoFrame::new(4, 2, PixelFormat::Rgb48le);

        assert!(scaler.convert_frame(&src, &mut dst));
        assert_eq!(builds(&factory), 0);
        assert!(dst.plane(0)[..24].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn packed_ten_bit_feeds_engine_with_unpacked_shape() {
        let factory = CountingFactory::default();
        let mut scaler = Scaler::new(factory.clone());
        let src = VideoFrame::new(4, 2, PixelFormat::X2Rgb10le);
        let mut dst = VideoFrame::new(4, 2, PixelFormat::Yuv420p);

        assert!(scaler.convert_frame(&src, &mut dst));
        let built = factory.built.borrow();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].0, ImageShape::new(4, 2, PixelFormat::Rgb48le));
    }
}

//! Encode session tests against a recording fake backend.

mod common;

use common::{FakeBackend, VIDEO_STREAM_TIME_BASE, gray_frame, hd_config, silence};
use ffmpeg_encode::{
    CodecSelection, Error, HardwareCapabilities, MediaWriter, PixelFormat, Rational, SampleFormat,
    VideoFrame, WriterConfig,
};
use ffmpeg_types::{AudioFrame, ChannelLayout, CodecId};

fn nvenc() -> HardwareCapabilities {
    HardwareCapabilities {
        h264_nvenc: true,
        ..HardwareCapabilities::none()
    }
}

fn video_only() -> WriterConfig {
    hd_config().with_audio_codec(CodecSelection::None)
}

fn audio_only(codec: CodecId) -> WriterConfig {
    hd_config()
        .with_video_codec(CodecSelection::None)
        .with_audio_codec(codec)
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn close_is_idempotent() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, hd_config(), HardwareCapabilities::none());

    writer.open("out.mp4", None, false).unwrap();
    assert!(writer.is_open());
    writer.close().unwrap();
    writer.close().unwrap();

    assert!(!writer.is_open());
    assert_eq!(log.borrow().trailers, 1);
    assert_eq!(log.borrow().containers_closed, 1);
}

#[test]
fn closing_a_never_opened_writer_does_nothing() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, hd_config(), HardwareCapabilities::none());

    writer.close().unwrap();
    drop(writer);

    let log = log.borrow();
    assert_eq!(log.headers, 0);
    assert_eq!(log.trailers, 0);
    assert_eq!(log.containers_closed, 0);
}

#[test]
fn properties_require_an_open_session() {
    let mut writer =
        MediaWriter::new(FakeBackend::new(), hd_config(), HardwareCapabilities::none());
    assert_eq!(writer.video_frames(), Err(Error::NotOpen));
    assert_eq!(writer.width(), Err(Error::NotOpen));
    assert_eq!(writer.video_codec_name(), Err(Error::NotOpen));

    writer.open("out.mp4", None, false).unwrap();
    assert_eq!(writer.width(), Ok(1280));
    assert_eq!(writer.height(), Ok(720));
    assert_eq!(writer.frame_rate(), Ok(Rational::new(30000, 1001)));
    assert_eq!(writer.sample_rate(), Ok(Some(48000)));
    assert_eq!(writer.video_codec_name(), Ok(Some("libx264")));
    assert_eq!(writer.audio_codec_name(), Ok(Some("aac")));
    assert_eq!(writer.destination(), Ok("out.mp4"));

    writer.close().unwrap();
    assert_eq!(writer.audio_samples(), Err(Error::NotOpen));
}

#[test]
fn frames_are_ignored_while_closed() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, hd_config(), HardwareCapabilities::none());

    writer.encode_video_frame(&gray_frame(1280, 720)).unwrap();
    writer.encode_audio_frame(&silence(1024)).unwrap();

    assert!(log.borrow().video_frames.is_empty());
    assert!(log.borrow().audio_frames.is_empty());
}

#[test]
fn empty_frames_are_ignored() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, hd_config(), HardwareCapabilities::none());
    writer.open("out.mp4", None, false).unwrap();

    writer
        .encode_video_frame(&VideoFrame::new(0, 0, PixelFormat::Yuv420p))
        .unwrap();
    writer.encode_audio_frame(&silence(0)).unwrap();

    assert_eq!(writer.video_frames(), Ok(0));
    assert_eq!(writer.audio_samples(), Ok(0));
    assert!(log.borrow().video_frames.is_empty());
}

#[test]
fn reopening_closes_the_previous_session() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, video_only(), HardwareCapabilities::none());

    writer.open("a.mp4", None, false).unwrap();
    for _ in 0..5 {
        writer.encode_video_frame(&gray_frame(1280, 720)).unwrap();
    }
    writer.open("b.mp4", None, false).unwrap();

    assert_eq!(writer.destination(), Ok("b.mp4"));
    assert_eq!(writer.video_frames(), Ok(0));
    let log = log.borrow();
    assert_eq!(log.destinations, ["a.mp4", "b.mp4"]);
    assert_eq!(log.trailers, 1);
    assert_eq!(log.containers_closed, 1);
    assert_eq!(log.packets.len(), 5);
}

#[test]
fn dropping_an_open_writer_finalizes_the_container() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    {
        let mut writer = MediaWriter::new(backend, video_only(), HardwareCapabilities::none());
        writer.open("out.mkv", None, false).unwrap();
        for _ in 0..3 {
            writer.encode_video_frame(&gray_frame(1280, 720)).unwrap();
        }
    }

    let log = log.borrow();
    assert_eq!(log.trailers, 1);
    assert_eq!(log.packets.len(), 3);
    assert_eq!(log.containers_closed, 1);
}

#[test]
fn no_trailer_without_tracks() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let config = hd_config()
        .with_video_codec(CodecSelection::None)
        .with_audio_codec(CodecSelection::None);
    let mut writer = MediaWriter::new(backend, config, HardwareCapabilities::none());

    writer.open("out.mp4", None, false).unwrap();
    assert_eq!(writer.video_codec_name(), Ok(None));
    writer.close().unwrap();

    assert_eq!(log.borrow().headers, 1);
    assert_eq!(log.borrow().trailers, 0);
}

// =============================================================================
// Open failures
// =============================================================================

#[test]
fn failed_open_leaves_writer_closed_and_reusable() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, hd_config(), HardwareCapabilities::none());

    log.borrow_mut().fail_container = true;
    assert!(matches!(writer.open("out.mp4", None, false), Err(Error::Io(_))));
    assert!(!writer.is_open());

    log.borrow_mut().fail_container = false;
    writer.open("out.mp4", None, false).unwrap();
    assert!(writer.is_open());
}

#[test]
fn header_failure_releases_the_container() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, hd_config(), HardwareCapabilities::none());

    log.borrow_mut().fail_header = true;
    assert!(matches!(writer.open("out.mp4", None, false), Err(Error::Io(_))));
    assert!(!writer.is_open());
    assert_eq!(log.borrow().containers_closed, 1);
    assert_eq!(log.borrow().trailers, 0);
}

#[test]
fn missing_encoder_fails_open() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let config = video_only().with_video_codec(CodecId::Av1);
    let mut writer = MediaWriter::new(backend, config, HardwareCapabilities::none());

    assert!(matches!(
        writer.open("out.mkv", None, false),
        Err(Error::EncoderNotFound(_))
    ));
    assert!(!writer.is_open());
    assert_eq!(log.borrow().containers_closed, 1);
}

#[test]
fn audio_open_failure_is_fatal() {
    let backend = FakeBackend::new();
    backend.fail_encoder("aac");
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, hd_config(), HardwareCapabilities::none());

    assert!(matches!(writer.open("out.mp4", None, false), Err(Error::Codec(_))));
    assert!(!writer.is_open());
    assert_eq!(log.borrow().headers, 0);
}

#[test]
fn invalid_config_is_rejected() {
    let config = WriterConfig::new(0, 720, Rational::new(30, 1));
    let mut writer = MediaWriter::new(FakeBackend::new(), config, HardwareCapabilities::none());
    assert!(matches!(
        writer.open("out.mp4", None, false),
        Err(Error::InvalidData(_))
    ));
}

// =============================================================================
// Codec selection
// =============================================================================

#[test]
fn probe_uses_container_defaults() {
    let config = WriterConfig::new(1280, 720, Rational::new(25, 1));
    let mut writer = MediaWriter::new(FakeBackend::new(), config, HardwareCapabilities::none());

    writer.open("out.mp4", None, false).unwrap();
    assert_eq!(writer.video_codec_name(), Ok(Some("libx264")));
    assert_eq!(writer.audio_codec_name(), Ok(Some("aac")));
}

#[test]
fn probe_without_container_default_omits_the_track() {
    let mut backend = FakeBackend::new();
    backend.default_audio = None;
    let config = WriterConfig::new(1280, 720, Rational::new(25, 1));
    let mut writer = MediaWriter::new(backend, config, HardwareCapabilities::none());

    writer.open("out.ivf", None, false).unwrap();
    assert_eq!(writer.video_codec_name(), Ok(Some("libx264")));
    assert_eq!(writer.audio_codec_name(), Ok(None));
    assert_eq!(writer.sample_rate(), Ok(None));
}

#[test]
fn unsupported_container_default_fails_open() {
    let mut backend = FakeBackend::new();
    backend.unmapped_video = Some("flv1");
    let log = backend.log.clone();
    let config = WriterConfig::new(1280, 720, Rational::new(25, 1));
    let mut writer = MediaWriter::new(backend, config, HardwareCapabilities::none());

    let err = writer.open("out.flv", None, false).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)), "{err}");
    assert!(!writer.is_open());

    let log = log.borrow();
    assert_eq!(log.headers, 0);
    assert!(log.video_settings.is_empty());
    assert_eq!(log.containers_closed, 1);
}

#[test]
fn explicit_codec_ignores_unsupported_container_default() {
    let mut backend = FakeBackend::new();
    backend.unmapped_video = Some("flv1");
    let mut writer = MediaWriter::new(backend, hd_config(), HardwareCapabilities::none());

    writer.open("out.flv", None, false).unwrap();
    assert_eq!(writer.video_codec_name(), Ok(Some("libx264")));
}

#[test]
fn global_header_follows_the_container() {
    let mut backend = FakeBackend::new();
    backend.global_header = false;
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, hd_config(), HardwareCapabilities::none());

    writer.open("out.ts", None, false).unwrap();
    let log = log.borrow();
    assert!(!log.video_settings[0].global_header);
    assert!(!log.audio_settings[0].global_header);
}

// =============================================================================
// Hardware negotiation
// =============================================================================

#[test]
fn hardware_failure_retries_in_software() {
    let backend = FakeBackend::new();
    backend.fail_encoder("h264_nvenc");
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, hd_config(), nvenc());

    writer.open("out.mp4", None, false).unwrap();
    assert_eq!(writer.video_codec_name(), Ok(Some("libx264")));

    let log = log.borrow();
    assert_eq!(log.opened_encoders, ["libx264", "aac"]);
    assert_eq!(log.devices_created, 1);
    assert_eq!(log.devices_released, 1);
    assert!(log.video_settings[0].hardware.is_none());
}

#[test]
fn forced_software_fails_without_retry() {
    let backend = FakeBackend::new();
    backend.fail_encoder("libx264");
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, video_only(), nvenc());

    assert!(matches!(writer.open("out.mp4", None, true), Err(Error::Codec(_))));
    assert_eq!(log.borrow().devices_created, 0);
}

#[test]
fn hardware_encoder_gets_surfaces_staged_in_nv12() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, video_only(), nvenc());

    writer.open("out.mp4", None, false).unwrap();
    assert_eq!(writer.video_codec_name(), Ok(Some("h264_nvenc")));
    for _ in 0..3 {
        writer.encode_video_frame(&gray_frame(1280, 720)).unwrap();
    }
    {
        let log = log.borrow();
        let hardware = log.video_settings[0].hardware.unwrap();
        assert!(hardware.surface.is_hardware());
        assert_eq!(hardware.software_format, PixelFormat::Nv12);
        assert_eq!(log.video_settings[0].preset, None);
        assert!(log.video_frames.iter().all(|frame| frame.1 == PixelFormat::Nv12));
        assert_eq!(log.scalers_built, 1);
        assert_eq!(log.devices_released, 0);
    }

    writer.close().unwrap();
    assert_eq!(log.borrow().devices_released, 1);
}

#[test]
fn forced_software_skips_hardware() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, video_only(), nvenc());

    writer.open("out.mp4", None, true).unwrap();
    assert_eq!(writer.video_codec_name(), Ok(Some("libx264")));
    assert_eq!(log.borrow().devices_created, 0);
}

#[test]
fn small_frames_are_encoded_in_software() {
    let config = WriterConfig::new(64, 48, Rational::new(30, 1))
        .with_video_codec(CodecId::H264)
        .with_audio_codec(CodecSelection::None);
    let mut writer = MediaWriter::new(FakeBackend::new(), config, nvenc());

    writer.open("out.mp4", None, false).unwrap();
    assert_eq!(writer.video_codec_name(), Ok(Some("libx264")));
}

#[test]
fn detect_probes_each_hardware_encoder() {
    let backend = FakeBackend::new();
    backend.fail_encoder("h264_nvenc");

    let capabilities = HardwareCapabilities::detect(&backend);
    assert_eq!(
        capabilities,
        HardwareCapabilities {
            hevc_nvenc: true,
            ..HardwareCapabilities::none()
        }
    );
    assert_eq!(capabilities.preferred_encoder(CodecId::H265), Some("hevc_nvenc"));
    assert_eq!(capabilities.preferred_encoder(CodecId::H264), None);
}

// =============================================================================
// Video
// =============================================================================

#[test]
fn video_pts_count_frames() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, video_only(), HardwareCapabilities::none());

    writer.open("out.mp4", None, false).unwrap();
    for _ in 0..10 {
        writer.encode_video_frame(&gray_frame(1280, 720)).unwrap();
    }
    // Two frames are still inside the encoder
    assert_eq!(log.borrow().packets.len(), 8);
    assert_eq!(writer.video_frames(), Ok(10));
    writer.close().unwrap();

    let log = log.borrow();
    let pts: Vec<i64> = log.video_frames.iter().map(|frame| frame.0).collect();
    assert_eq!(pts, (0..10).collect::<Vec<_>>());

    // 1001/30000 s per frame is 3003 ticks of 1/90000
    assert_eq!(VIDEO_STREAM_TIME_BASE, Rational::new(1, 90000));
    let packets = log.packets_for(0);
    assert_eq!(packets.len(), 10);
    for (index, packet) in packets.iter().enumerate() {
        assert_eq!(packet.pts, Some(index as i64 * 3003));
    }
}

#[test]
fn flushed_packets_get_a_duration() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, video_only(), HardwareCapabilities::none());

    writer.open("out.mp4", None, false).unwrap();
    for _ in 0..5 {
        writer.encode_video_frame(&gray_frame(1280, 720)).unwrap();
    }
    writer.close().unwrap();

    // One frame at 30000/1001 fps is 3003 ticks of the 1/90000 stream
    let durations: Vec<i64> = log.borrow().packets.iter().map(|packet| packet.duration).collect();
    assert_eq!(durations, [0, 0, 0, 3003, 3003]);
}

#[test]
fn mismatched_frames_are_scaled_with_one_context() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, video_only(), HardwareCapabilities::none());

    writer.open("out.mp4", None, false).unwrap();
    for _ in 0..3 {
        writer
            .encode_video_frame(&VideoFrame::new(640, 360, PixelFormat::Bgra))
            .unwrap();
    }
    writer.encode_video_frame(&gray_frame(1280, 720)).unwrap();

    let log = log.borrow();
    assert_eq!(log.scalers_built, 1);
    assert_eq!(log.video_frames.len(), 4);
    assert!(
        log.video_frames
            .iter()
            .all(|frame| (frame.1, frame.2, frame.3) == (PixelFormat::Yuv420p, 1280, 720))
    );
}

// =============================================================================
// Audio
// =============================================================================

#[test]
fn audio_pts_conserve_samples() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let config = audio_only(CodecId::Aac);
    let mut writer = MediaWriter::new(backend, config, HardwareCapabilities::none());

    writer.open("out.m4a", None, false).unwrap();
    for _ in 0..90 {
        writer.encode_audio_frame(&silence(1600)).unwrap();
    }
    writer.close().unwrap();

    let log = log.borrow();
    assert_eq!(log.audio_samples(), 144_000);
    assert_eq!(log.audio_frames.len(), 141);
    assert_eq!(log.audio_frames.last(), Some(&(143_360, 640)));
    for pair in log.audio_frames.windows(2) {
        assert_eq!(pair[1].0, pair[0].0 + pair[0].1 as i64);
    }
    assert_eq!(log.resamplers_built, 1);
    assert_eq!(log.packets_for(0).len(), 141);
}

#[test]
fn streaming_destinations_resample_to_44100() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let config = audio_only(CodecId::Aac);
    let mut writer = MediaWriter::new(backend, config, HardwareCapabilities::none());

    writer.open("rtmp://live.example.com/app/key", Some("flv"), false).unwrap();
    assert_eq!(writer.sample_rate(), Ok(Some(44100)));
    for _ in 0..90 {
        writer.encode_audio_frame(&silence(1600)).unwrap();
    }
    writer.close().unwrap();

    let log = log.borrow();
    assert_eq!(log.audio_samples(), 132_300);
    assert!(log.audio_frames.iter().all(|frame| frame.1 <= 1024));
}

#[test]
fn variable_frame_encoders_take_what_is_available() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let config = audio_only(CodecId::Flac);
    let mut writer = MediaWriter::new(backend, config, HardwareCapabilities::none());

    writer.open("out.flac", None, false).unwrap();
    for _ in 0..10 {
        writer.encode_audio_frame(&silence(1600)).unwrap();
    }
    assert_eq!(writer.audio_samples(), Ok(16_000));
    writer.close().unwrap();

    let log = log.borrow();
    assert_eq!(log.audio_settings[0].sample_format, SampleFormat::S16);
    assert_eq!(log.audio_frames.len(), 10);
    assert!(log.audio_frames.iter().all(|frame| frame.1 == 1600));
}

#[test]
fn short_tail_is_dropped_for_fixed_frame_encoders() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let config = audio_only(CodecId::Opus);
    let mut writer = MediaWriter::new(backend, config, HardwareCapabilities::none());

    writer.open("out.ogg", None, false).unwrap();
    for _ in 0..10 {
        writer.encode_audio_frame(&silence(1000)).unwrap();
    }
    writer.close().unwrap();

    let log = log.borrow();
    assert_eq!(log.audio_settings[0].channels, ChannelLayout::Stereo);
    assert_eq!(log.audio_frames.len(), 10);
    assert_eq!(log.audio_samples(), 9600);
}

#[test]
fn other_input_shapes_rebuild_the_resampler() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let config = audio_only(CodecId::Aac);
    let mut writer = MediaWriter::new(backend, config, HardwareCapabilities::none());

    writer.open("out.m4a", None, false).unwrap();
    let block = AudioFrame::new(44100, ChannelLayout::Mono, SampleFormat::S16, 4410);
    for _ in 0..10 {
        writer.encode_audio_frame(&block).unwrap();
    }
    writer.close().unwrap();

    let log = log.borrow();
    assert_eq!(log.resamplers_built, 2);
    assert_eq!(log.audio_samples(), 48_000);
}

// =============================================================================
// End to end
// =============================================================================

#[test]
fn three_seconds_of_video_and_audio() {
    let backend = FakeBackend::new();
    let log = backend.log.clone();
    let mut writer = MediaWriter::new(backend, hd_config(), HardwareCapabilities::none());

    writer.open("out.mp4", None, false).unwrap();
    let frame = gray_frame(1280, 720);
    let block = silence(1600);
    for _ in 0..90 {
        writer.encode_video_frame(&frame).unwrap();
        writer.encode_audio_frame(&block).unwrap();
    }
    assert_eq!(writer.video_frames(), Ok(90));
    writer.close().unwrap();

    let log = log.borrow();
    let video = &log.video_settings[0];
    assert_eq!(video.bitrate, 4_000_000);
    assert_eq!(video.tolerance_cap, 2_000_000);
    assert_eq!(video.gop_cap, 30);
    assert_eq!(video.preset, Some("ultrafast"));
    assert!(video.global_header);
    let audio = &log.audio_settings[0];
    assert_eq!(audio.bitrate, 128_000);
    assert_eq!(audio.sample_rate, 48_000);
    assert_eq!(audio.sample_format, SampleFormat::F32p);

    let video_packets = log.packets_for(0);
    assert_eq!(video_packets.len(), 90);
    assert!(video_packets.windows(2).all(|pair| pair[0].pts < pair[1].pts));
    assert_eq!(log.audio_samples(), 144_000);
    assert_eq!(log.headers, 1);
    assert_eq!(log.trailers, 1);
    assert_eq!(log.containers_closed, 1);
}

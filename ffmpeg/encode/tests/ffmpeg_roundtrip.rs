//! Writes a real file through libavcodec/libavformat.
//!
//! Needs an FFmpeg build with libx264 and the native AAC encoder, so the test
//! is ignored by default: `cargo test -p ffmpeg-encode -- --ignored`.

#![cfg(feature = "ffmpeg")]

use ffmpeg_encode::{FfmpegBackend, HardwareCapabilities, MediaWriter, WriterConfig};
use ffmpeg_types::{
    AudioFrame, ChannelLayout, CodecId, PixelFormat, Rational, SampleFormat, VideoFrame,
};

#[test]
#[ignore = "requires FFmpeg with libx264 and aac"]
fn writes_three_seconds_of_mp4() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.mp4");
    let destination = path.to_str().unwrap();

    let config = WriterConfig::new(320, 240, Rational::new(30, 1))
        .with_video_codec(CodecId::H264)
        .with_video_bitrate(500_000)
        .with_audio_codec(CodecId::Aac);
    let backend = FfmpegBackend::new().unwrap();
    let mut writer = MediaWriter::new(backend, config, HardwareCapabilities::none());
    writer.open(destination, None, true).unwrap();

    assert_eq!(writer.video_codec_name().unwrap(), Some("libx264"));
    assert_eq!(writer.audio_codec_name().unwrap(), Some("aac"));
    assert_eq!(writer.sample_rate().unwrap(), Some(48000));

    let mut frame = VideoFrame::new(320, 240, PixelFormat::Yuv420p);
    let block = AudioFrame::new(48000, ChannelLayout::Stereo, SampleFormat::S16, 1600);
    for index in 0..90u32 {
        frame.fill_gray((index * 2) as u8);
        writer.encode_video_frame(&frame).unwrap();
        writer.encode_audio_frame(&block).unwrap();
    }
    assert_eq!(writer.video_frames().unwrap(), 90);
    writer.close().unwrap();

    let size = std::fs::metadata(&path).unwrap().len();
    assert!(size > 0, "empty output file");
}

#[test]
#[ignore = "requires FFmpeg with libx264"]
fn scales_mismatched_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scaled.mkv");

    let config = WriterConfig::new(320, 240, Rational::new(25, 1))
        .with_video_codec(CodecId::H264)
        .with_audio_codec(ffmpeg_types::CodecSelection::None);
    let mut writer = MediaWriter::new(
        FfmpegBackend::new().unwrap(),
        config,
        HardwareCapabilities::none(),
    );
    writer.open(path.to_str().unwrap(), None, true).unwrap();

    let mut frame = VideoFrame::new(640, 480, PixelFormat::Bgra);
    frame.fill_packed(&vec![0x40; 640 * 480 * 4]).unwrap();
    for _ in 0..25 {
        writer.encode_video_frame(&frame).unwrap();
    }
    assert_eq!(writer.video_frames().unwrap(), 25);
    writer.close().unwrap();

    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

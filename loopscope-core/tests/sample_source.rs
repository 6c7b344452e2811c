use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hound::{SampleFormat, WavSpec, WavWriter};
use loopscope_core::{
    LoopScopeError, LoopSession, ManualBackend, OutputFormat, ResourceId, SampleSource,
    ScopeChannel, SessionConfig,
};

/// Fresh per-test directory under the system temp dir.
fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("loopscope-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create fixture dir");
    dir
}

fn write_stereo_wav(dir: &Path, file: &str, frames: usize) -> Vec<(i16, i16)> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: 48_000,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let samples: Vec<(i16, i16)> = (0..frames)
        .map(|i| ((i as i16) * 100, -(i as i16) * 50))
        .collect();
    let mut writer = WavWriter::create(dir.join(file), spec).expect("create wav");
    for (l, r) in &samples {
        writer.write_sample(*l).expect("write left");
        writer.write_sample(*r).expect("write right");
    }
    writer.finalize().expect("finalize wav");
    samples
}

#[test]
fn loads_a_stereo_loop_from_the_resource_root() {
    let dir = fixture_dir("stereo");
    let samples = write_stereo_wav(&dir, "Amen-break.wav", 32);

    let buffer = SampleSource::new(&dir)
        .load(&ResourceId::new("Amen-break.wav"))
        .expect("load loop");
    assert_eq!(buffer.frames(), 32);
    assert!(buffer.is_stereo());
    assert_eq!(buffer.sample_rate(), 48_000);
    assert_eq!(buffer.left()[3], samples[3].0 as f32 / 32_768.0);
    assert_eq!(buffer.right()[3], samples[3].1 as f32 / 32_768.0);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn ids_escaping_the_root_are_missing() {
    let dir = fixture_dir("escape");
    let err = SampleSource::new(&dir)
        .load(&ResourceId::new("../outside.wav"))
        .err()
        .expect("escape rejected");
    assert!(matches!(err, LoopScopeError::MissingResource { .. }));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn garbage_file_is_an_unsupported_format() {
    let dir = fixture_dir("garbage");
    fs::write(dir.join("noise.wav"), b"definitely not RIFF").expect("write garbage");
    let err = SampleSource::new(&dir)
        .load(&ResourceId::new("noise.wav"))
        .err()
        .expect("garbage rejected");
    assert!(matches!(err, LoopScopeError::UnsupportedFormat(_)));
    assert!(err.is_resource_error());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn session_opened_from_storage_plays_the_asset() {
    let dir = fixture_dir("session");
    write_stereo_wav(&dir, "loop.wav", 16);

    let backend = ManualBackend::new(OutputFormat {
        sample_rate: 48_000,
        channels: 2,
    });
    let clock = backend.clock();
    let config = SessionConfig {
        resource_root: dir.clone(),
        resource_id: "loop.wav".into(),
        ..SessionConfig::default()
    };
    let session = LoopSession::open_with_backend(config, Arc::new(backend)).expect("open session");
    assert_eq!(session.resource().map(ResourceId::as_str), Some("loop.wav"));

    session.start_loop().unwrap();
    let block = clock.render(16).unwrap();
    assert_eq!(session.scope(ScopeChannel::Left, 16), block.left);
    assert_eq!(session.scope(ScopeChannel::Right, 16), block.right);
    session.stop().unwrap();

    let _ = fs::remove_dir_all(&dir);
}

//! Configuration loading tests

use std::io::Write;
use std::time::Duration;

use neptr::config::file::read_config_file;
use neptr::config::{Settings, TtsEngine};
use neptr::{Error, SessionMode};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_file_overlays_defaults() {
    let file = write_config(
        r#"
        [audio]
        rms_silence_threshold = 400.0

        [session]
        mode = "command"
        silence_window_ms = 1500
        goodbye_phrases = ["over and out"]

        [wake]
        triggers = ["Hey Robot", "hey robot", "  "]

        [tts]
        engine = "espeak"
        espeak_pitch = 50

        [personality]
        name = "Pie Bot"
        "#,
    );

    let parsed = read_config_file(file.path()).unwrap();
    let settings = Settings::from_sources(parsed, |_| None).unwrap();

    assert!((settings.audio.vad_threshold - 400.0).abs() < f32::EPSILON);
    assert_eq!(settings.audio.sample_rate, 16000);
    assert_eq!(settings.session.mode, SessionMode::Command);
    assert_eq!(settings.session.silence_window, Duration::from_millis(1500));
    assert_eq!(settings.session.goodbye_phrases, ["over and out"]);
    assert_eq!(settings.wake.triggers, ["hey robot"]);
    assert_eq!(settings.tts.engine, TtsEngine::Espeak);
    assert_eq!(settings.tts.espeak.pitch, 50);
    assert_eq!(settings.tts.espeak.speed, 175);
    assert_eq!(settings.personality.name, "Pie Bot");
    assert!(!settings.personality.jokes.is_empty());
}

#[test]
fn test_explicit_file_must_parse() {
    let file = write_config("[session\nmode = ");
    let result = Settings::load(Some(file.path()));
    assert!(matches!(result, Err(Error::Toml(_))));
}

#[test]
fn test_unknown_section_rejected() {
    let file = write_config("[channels]\ndiscord = true\n");
    assert!(read_config_file(file.path()).is_err());
}

#[test]
fn test_missing_explicit_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Settings::load(Some(&dir.path().join("absent.toml")));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_invalid_timing_fails_validation() {
    let file = write_config(
        r#"
        [session]
        debounce_window_ms = 5000
        idle_timeout_ms = 4000
        "#,
    );
    let parsed = read_config_file(file.path()).unwrap();
    let settings = Settings::from_sources(parsed, |_| None).unwrap();
    assert!(matches!(settings.validate(), Err(Error::Config(_))));
}

#[test]
fn test_deepgram_gets_its_own_default_model() {
    let settings = Settings::from_sources(Default::default(), |key| {
        (key == "NEPTR_STT_PROVIDER").then(|| "deepgram".to_string())
    })
    .unwrap();
    assert_eq!(settings.stt.model, "nova-2");
}

use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_voiceprint_cli"))
}

fn temp_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("voiceprint_cli_{}_{}", std::process::id(), name))
}

fn record(output: &PathBuf, kind: &str) {
    let status = cli()
        .args(["record", "--synthetic", kind, "--seconds", "0.2", "--sample-rate", "16000"])
        .arg("--output")
        .arg(output)
        .output()
        .expect("failed to run voiceprint_cli record");
    assert!(
        status.status.success(),
        "record exited with {:?}: {}",
        status.status.code(),
        String::from_utf8_lossy(&status.stderr)
    );
}

fn write_config(name: &str) -> PathBuf {
    let path = temp_file(name);
    std::fs::write(
        &path,
        r#"{"extraction": {"frame_duration_secs": 0.025, "hop_duration_secs": 0.01,
            "feature_count": 13, "filter_bank_size": 26, "sentinel": -1300.0}}"#,
    )
    .unwrap();
    path
}

#[test]
fn record_then_inspect() {
    let wav = temp_file("inspect.wav");
    record(&wav, "sine");

    let output = cli()
        .arg("inspect")
        .arg(&wav)
        .output()
        .expect("failed to run voiceprint_cli inspect");
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).expect("inspect JSON payload");
    assert_eq!(json["header"]["sample_rate"], 16_000);
    assert_eq!(json["header"]["data_len"], 6_400);
    assert_eq!(json["header"]["chunk_size"], 6_436);
    assert_eq!(json["finalized"], true);
    assert_eq!(json["sizes_consistent"], true);

    let _ = std::fs::remove_file(wav);
}

#[test]
fn record_then_extract() {
    let wav = temp_file("extract.wav");
    let config = write_config("extract.json");
    record(&wav, "noise");

    let output = cli()
        .arg("--config")
        .arg(&config)
        .arg("extract")
        .arg(&wav)
        .arg("--all")
        .output()
        .expect("failed to run voiceprint_cli extract");
    assert!(
        output.status.success(),
        "extract exited with {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );

    let json: Value = serde_json::from_slice(&output.stdout).expect("extract JSON payload");
    let entries = json["entries"].as_array().unwrap();
    assert!(!entries.is_empty());
    assert_eq!(entries.len() as u64, json["retained"].as_u64().unwrap());
    let mfcc = entries[0]["mfcc"].as_str().unwrap();
    assert_eq!(mfcc.split(", ").count(), 13);

    let _ = std::fs::remove_file(wav);
    let _ = std::fs::remove_file(config);
}

#[test]
fn extract_silence_exits_with_2() {
    let wav = temp_file("silence.wav");
    let config = write_config("silence.json");
    record(&wav, "silence");

    let output = cli()
        .arg("--config")
        .arg(&config)
        .arg("extract")
        .arg(&wav)
        .output()
        .expect("failed to run voiceprint_cli extract");
    assert_eq!(output.status.code(), Some(2));

    let _ = std::fs::remove_file(wav);
    let _ = std::fs::remove_file(config);
}

#[test]
fn inspect_missing_file_fails() {
    let output = cli()
        .args(["inspect", "/nonexistent/voiceprint/clip.wav"])
        .output()
        .expect("failed to run voiceprint_cli inspect");
    assert_eq!(output.status.code(), Some(1));
}

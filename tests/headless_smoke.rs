use std::process::Command;
use tesselbox_testkit::unique_temp_dir;

#[test]
fn headless_run_reports_and_saves() {
    let saves = unique_temp_dir("headless_smoke");
    let output = Command::new(env!("CARGO_BIN_EXE_tesselbox"))
        .args([
            "--ticks",
            "30",
            "--seed",
            "1",
            "--world",
            "smoke",
            "--saves",
            saves.to_str().unwrap(),
            "--save-on-exit",
        ])
        .output()
        .expect("run tesselbox");
    assert!(
        output.status.success(),
        "tesselbox failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    let summary: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("summary is one JSON object");
    assert_eq!(summary["world"], "smoke");
    assert_eq!(summary["seed"], 1);
    assert_eq!(summary["tick"], 30);
    assert!(summary["resident_chunks"].as_u64().unwrap_or(0) > 0);

    assert!(saves.join("smoke.world").exists());
    assert!(saves.join("player_smoke.json").exists());
    let _ = std::fs::remove_dir_all(&saves);
}

#[test]
fn same_seed_runs_end_in_the_same_place() {
    let run = || {
        let saves = unique_temp_dir("headless_determinism");
        let output = Command::new(env!("CARGO_BIN_EXE_tesselbox"))
            .args(["--ticks", "20", "--seed", "99", "--saves", saves.to_str().unwrap()])
            .output()
            .expect("run tesselbox");
        assert!(output.status.success());
        let summary: serde_json::Value =
            serde_json::from_slice(&output.stdout).expect("summary json");
        let _ = std::fs::remove_dir_all(&saves);
        summary["player"].clone()
    };
    assert_eq!(run(), run());
}

use std::process::Command;

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_gatekeep-tester");
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("scenarios.txt");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    assert!(content.contains("dress-code"));
    assert!(content.contains("german_speaker ≥ 800"));
}

#[test]
fn cli_json_report_covers_every_game() {
    let exe = env!("CARGO_BIN_EXE_gatekeep-tester");
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("report.json");
    let output = Command::new(exe)
        .args([
            "--scenarios",
            "1,local-scene",
            "--policies",
            "accept-all",
            "--games",
            "2",
            "--seed",
            "5",
            "--report",
            "json",
            "--output",
        ])
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Gatekeep Automated Tester"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output_path).unwrap()).unwrap();
    let games = report["games"].as_array().unwrap();
    assert_eq!(games.len(), 4);
    assert!(games.iter().all(|g| g["rejected"] == 0));
    assert_eq!(report["summaries"].as_array().unwrap().len(), 2);
}

#[test]
fn cli_fails_when_nothing_is_selected() {
    let exe = env!("CARGO_BIN_EXE_gatekeep-tester");
    let output = Command::new(exe)
        .args(["--scenarios", "99", "--games", "1"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown scenario"));
}

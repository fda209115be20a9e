use rrcore_testing::{CliWorld, RunBuilder};
use serde_json::json;

#[test]
fn init_writes_a_default_config_file() {
    let world = CliWorld::new();
    let dir = world.root().join("ledger");

    let result = world.run(&["init", dir.to_str().unwrap()]);
    assert!(result.success(), "stderr: {}", result.stderr());
    assert!(dir.join("record-replay.toml").is_file());
}

#[test]
fn init_refuses_a_nonempty_existing_directory() {
    let world = CliWorld::new();
    let dir = world.root().join("ledger");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("stray.txt"), b"hi").unwrap();

    let result = world.run(&["init", dir.to_str().unwrap()]);
    assert!(!result.success());
}

#[test]
fn inspect_and_verify_a_recorded_run() {
    let ledger = RunBuilder::new("run-cli-1")
        .with_tool_call(
            "bash-adapter",
            "agent-1",
            "bash",
            json!({"cmd": "ls"}),
            json!({"stdout": "a.txt\n"}),
        )
        .build();

    let run_dir = ledger.ledger_root().join(ledger.run_id());
    let world = CliWorld::new();

    let inspect = world.run(&["inspect", run_dir.to_str().unwrap()]);
    assert!(inspect.success(), "stderr: {}", inspect.stderr());
    assert!(inspect.stdout().contains("run-cli-1"));

    let verify = world.run(&["verify", run_dir.to_str().unwrap()]);
    assert!(verify.success(), "stderr: {}", verify.stderr());

    let stats = world.run(&["stats", run_dir.to_str().unwrap()]);
    assert!(stats.success(), "stderr: {}", stats.stderr());
    assert!(stats.stdout().contains("tool_call"));
}

#[test]
fn verify_reports_failure_on_corrupted_segment() {
    let ledger = RunBuilder::new("run-cli-2")
        .with_tool_call(
            "bash-adapter",
            "agent-1",
            "bash",
            json!({"cmd": "ls"}),
            json!({"stdout": "a.txt\n"}),
        )
        .build();

    let run_dir = ledger.ledger_root().join(ledger.run_id());
    let segment = std::fs::read_dir(&run_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .find(|e| e.file_name().to_string_lossy().starts_with("events-"))
        .unwrap()
        .path();
    let mut bytes = std::fs::read(&segment).unwrap();
    bytes.truncate(bytes.len() - 4);
    std::fs::write(&segment, bytes).unwrap();

    let world = CliWorld::new();
    let verify = world.run(&["verify", run_dir.to_str().unwrap()]);
    assert!(!verify.success());
}

use std::process::{Command, Output};

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mahi-client"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("MAHI_ID_TOKEN")
        .output()
        .expect("failed to run mahi-client")
}

#[test]
fn test_invalid_config_is_logged_before_exit() {
    let output = run_cli(&["--base-url", "nowhere", "chat", "hello"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains("Category: Configuration"), "stderr: {}", stderr);
    assert!(stderr.contains("Suggestion:"), "stderr: {}", stderr);
}

#[test]
fn test_verbose_log_does_not_leak_token() {
    let output = run_cli(&["--verbose", "--token", "secret-id-token", "chat", "hello"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "stderr: {}", stderr);
    assert!(stdout.contains("Hello"), "stdout: {}", stdout);
    assert!(stderr.contains("<redacted>"), "stderr: {}", stderr);
    assert!(!stderr.contains("secret-id-token"));
}

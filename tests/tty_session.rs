// Drives the tracking screen through a pseudo terminal.
//
// Unix-only and ignored by default; run with
// `cargo test --test tty_session -- --ignored`.

#![cfg(unix)]

use std::time::Duration;

use expectrl::{spawn, Eof};

#[test]
#[ignore]
fn toggle_then_quit_persists_session() -> Result<(), Box<dyn std::error::Error>> {
    let home = tempfile::tempdir()?;
    let bin = assert_cmd::cargo::cargo_bin("walkr");
    let cmd = format!("env WALKR_HOME={} {} track", home.path().display(), bin.display());

    let mut p = spawn(cmd)?;
    std::thread::sleep(Duration::from_millis(300));

    // start, let one tick land, then quit while running
    p.send(" ")?;
    std::thread::sleep(Duration::from_millis(1300));
    p.send("q")?;
    p.expect(Eof)?;

    let status = assert_cmd::Command::cargo_bin("walkr")?
        .env("WALKR_HOME", home.path())
        .args(["status", "--json"])
        .output()?;
    let report: serde_json::Value = serde_json::from_slice(&status.stdout)?;
    assert_eq!(report["running"], false);
    assert!(report["elapsed_seconds"].as_u64().unwrap_or(0) >= 1);
    assert!(report["last_ended"].is_string());
    Ok(())
}

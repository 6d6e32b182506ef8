//! Common test utilities for CLI tests.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Path of a config file that does not exist, so defaults apply.
fn missing_config(dir: &Path) -> PathBuf {
    dir.join("no-config.toml")
}

/// Writes `script` into `dir` and returns its path.
pub fn write_script(dir: &Path, script: &str) -> PathBuf {
    let path = dir.join("job.sql");
    std::fs::write(&path, script).expect("Failed to write script");
    path
}

/// Runs fragsql with the given arguments and optional stdin.
/// The config file is pinned to a missing path inside `dir`.
pub fn run_fragsql(dir: &Path, args: &[&str], stdin: Option<&str>) -> (i32, String, String) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_fragsql"))
        .arg("--config")
        .arg(missing_config(dir))
        .args(args)
        .env_remove("FRAGSQL_PARALLELISM")
        .env_remove("FRAGSQL_USE_SQL_FRAGMENT")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute command");

    if let Some(mut pipe) = child.stdin.take() {
        if let Some(input) = stdin {
            pipe.write_all(input.as_bytes())
                .expect("Failed to write stdin");
        }
    }

    let output = child.wait_with_output().expect("Failed to wait for command");
    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    (exit_code, stdout, stderr)
}

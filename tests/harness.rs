//! Test harness for lsg integration tests

#![allow(dead_code)]

use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

pub use lsg::test_utils::TestDir;

pub struct Run {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl Run {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout lines with trailing padding removed.
    pub fn lines(&self) -> Vec<&str> {
        self.stdout.lines().map(str::trim_end).collect()
    }
}

fn run<I, S>(dir: &Path, args: I, config_home: Option<&Path>) -> Run
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let binary = env!("CARGO_BIN_EXE_lsg");
    let mut command = Command::new(binary);
    command
        .args(args)
        .current_dir(dir)
        .env_remove("LSG_LOG")
        .env("NO_COLOR", "1");
    match config_home {
        Some(home) => {
            command.env("XDG_CONFIG_HOME", home);
        }
        None => {
            command.arg("--no-config");
        }
    }
    let output = command.output().expect("Failed to run lsg");

    Run {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        code: output.status.code().unwrap_or(-1),
    }
}

/// Run the binary in `dir`, ignoring any user config file.
pub fn run_lsg(dir: &Path, args: &[&str]) -> Run {
    run(dir, args, None)
}

/// Like [`run_lsg`], for arguments that are not valid UTF-8.
pub fn run_lsg_os(dir: &Path, args: &[&OsStr]) -> Run {
    run(dir, args, None)
}

/// Run the binary with `$XDG_CONFIG_HOME` pointed at `config_home`.
pub fn run_lsg_with_config(dir: &Path, config_home: &Path, args: &[&str]) -> Run {
    run(dir, args, Some(config_home))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_runs_binary() {
        let dir = TestDir::new();
        dir.add_file("a.txt", "a");
        let run = run_lsg(dir.path(), &[]);
        assert!(run.success(), "stderr: {}", run.stderr);
        assert_eq!(run.lines(), vec!["a.txt"]);
    }
}

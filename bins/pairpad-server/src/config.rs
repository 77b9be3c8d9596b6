// Runtime configuration for the pairpad server
use crate::preprocess::InputMode;
use pairpad_common::types::{ExecutionStatus, Language};

/// `timeout(1)` reports a fired wall-clock cap with this exit code.
pub const TIMEOUT_EXIT_CODE: i64 = 124;

/// Listener addresses and startup behaviour, overridable from the
/// environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_addr: String,
    pub ws_addr: String,
    /// ENV_RUN=local pre-pulls the sandbox images before the listeners
    /// open, so the first submission isn't a multi-minute download.
    pub prepull_images: bool,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let http_addr =
            std::env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let ws_addr = std::env::var("WS_ADDR").unwrap_or_else(|_| "0.0.0.0:8081".to_string());
        let prepull_images = is_local_run(std::env::var("ENV_RUN").ok().as_deref());

        Self {
            http_addr,
            ws_addr,
            prepull_images,
        }
    }
}

fn is_local_run(env_run: Option<&str>) -> bool {
    env_run == Some("local")
}

/// Everything language-specific the sandbox needs: which image to run,
/// what the staged files are called, the driver script, and how exit
/// codes map back to verdict statuses.
#[derive(Debug, Clone)]
pub struct LanguageProfile {
    pub language: Language,
    pub image: &'static str,
    pub workdir_prefix: &'static str,
    pub source_file: &'static str,
    pub runner_file: &'static str,
    pub runner_script: &'static str,
    /// Shell line the container runs; owns the wall-clock cap and the
    /// 8 KiB output cap so neither depends on host-side enforcement.
    pub launch_cmd: &'static str,
    pub input_mode: InputMode,
    /// Exit code the driver reserves for compilation failure, if the
    /// language has a compile step.
    pub compile_error_code: Option<i64>,
}

impl LanguageProfile {
    pub fn status_for_exit(&self, code: i64) -> ExecutionStatus {
        if code == 0 {
            ExecutionStatus::Successful
        } else if code == TIMEOUT_EXIT_CODE {
            ExecutionStatus::RuntimeTimeout
        } else if Some(code) == self.compile_error_code {
            ExecutionStatus::CompileError
        } else {
            ExecutionStatus::RuntimeError
        }
    }
}

// The driver reads the snippet and input.txt itself: each blank-line
// separated group of assignments becomes run_case.py with the group staged
// above the snippet, so user code can reference nums, k, ... directly
// without input() boilerplate. A group that runs longer than 10 seconds
// exits the whole driver with the timeout sentinel.
const PYTHON_RUNNER: &str = r#"#!/usr/bin/env python3
import subprocess, sys

with open('main.py') as f:
    snippet = f.read()

with open('input.txt') as f:
    content = f.read().strip()

groups = [g.strip() for g in content.split('\n\n') if g.strip()]

if not groups:
    # No test cases: run the snippet exactly once, as-is.
    proc = subprocess.run(['python3', 'main.py'], text=True, capture_output=True)
    sys.stdout.write(proc.stdout)
    sys.stderr.write(proc.stderr)
    sys.exit(proc.returncode)

for group in groups:
    with open('run_case.py', 'w') as f:
        f.write(group + '\n' + snippet)
    try:
        proc = subprocess.run(
            ['python3', 'run_case.py'],
            text=True,
            capture_output=True,
            timeout=10,
        )
        sys.stdout.write(proc.stdout)
        sys.stderr.write(proc.stderr)
    except subprocess.TimeoutExpired:
        print('Time Limit Exceeded', file=sys.stderr)
        sys.exit(124)
"#;

// Compiles once, then feeds each blank-line separated group of input.txt
// to `java Main` on stdin. Exit 100 is reserved for javac failure so the
// host can tell a compile error from a runtime crash.
const JAVA_RUNNER: &str = r#"#!/bin/sh
javac Main.java 2>&1
if [ $? -ne 0 ]; then
    exit 100
fi

if [ ! -s input.txt ]; then
    java Main
    exit $?
fi

tmpfile=$(mktemp)
has_content=0

flush() {
    if [ "$has_content" -eq 1 ]; then
        java Main < "$tmpfile"
        : > "$tmpfile"
        has_content=0
    fi
}

while IFS= read -r line || [ -n "$line" ]; do
    if [ -z "$line" ]; then
        flush
    else
        printf '%s\n' "$line" >> "$tmpfile"
        has_content=1
    fi
done < input.txt

flush
rm -f "$tmpfile"
"#;

pub fn python3_profile() -> LanguageProfile {
    LanguageProfile {
        language: Language::Python3,
        image: "python:3.9.19-slim-bullseye",
        workdir_prefix: "py-workdir",
        source_file: "main.py",
        runner_file: "runner.py",
        runner_script: PYTHON_RUNNER,
        launch_cmd: "timeout --foreground 30s python3 runner.py > run.out 2>&1; \
                     status=$?; head -c 8192 run.out; exit $status",
        input_mode: InputMode::Assignments,
        compile_error_code: None,
    }
}

pub fn java_profile() -> LanguageProfile {
    LanguageProfile {
        language: Language::Java,
        image: "openjdk:17-slim",
        workdir_prefix: "java-workdir",
        source_file: "Main.java",
        runner_file: "runner.sh",
        runner_script: JAVA_RUNNER,
        launch_cmd: "timeout --foreground 60s sh runner.sh > run.out 2>&1; \
                     status=$?; head -c 8192 run.out; exit $status",
        input_mode: InputMode::ValuesOnly,
        compile_error_code: Some(100),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_exit_codes_map_to_statuses() {
        let profile = python3_profile();
        assert_eq!(profile.status_for_exit(0), ExecutionStatus::Successful);
        assert_eq!(profile.status_for_exit(124), ExecutionStatus::RuntimeTimeout);
        assert_eq!(profile.status_for_exit(1), ExecutionStatus::RuntimeError);
        // Python has no compile step, so 100 is just another crash.
        assert_eq!(profile.status_for_exit(100), ExecutionStatus::RuntimeError);
    }

    #[test]
    fn test_java_reserves_exit_100_for_javac() {
        let profile = java_profile();
        assert_eq!(profile.status_for_exit(100), ExecutionStatus::CompileError);
        assert_eq!(profile.status_for_exit(124), ExecutionStatus::RuntimeTimeout);
        assert_eq!(profile.status_for_exit(0), ExecutionStatus::Successful);
        assert_eq!(profile.status_for_exit(137), ExecutionStatus::RuntimeError);
    }

    #[test]
    fn test_profiles_pin_the_sandbox_images() {
        assert_eq!(python3_profile().image, "python:3.9.19-slim-bullseye");
        assert_eq!(java_profile().image, "openjdk:17-slim");
    }

    #[test]
    fn test_only_env_run_local_triggers_prepull() {
        assert!(is_local_run(Some("local")));
        assert!(!is_local_run(Some("production")));
        assert!(!is_local_run(Some("")));
        assert!(!is_local_run(None));
    }
}

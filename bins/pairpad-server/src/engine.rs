//! Sandbox Execution Engine
//!
//! **Core Responsibility:**
//! Run one untrusted snippet inside a disposable, resource-capped
//! container and reduce whatever happens to a `Verdict`.
//!
//! **Per-submission protocol:**
//! 1. Stage a fresh temp workdir: source file, preprocessed `input.txt`,
//!    and the language driver script.
//! 2. Create a container bound to the workdir at `/workdir`, no network,
//!    1 GiB RAM, one core-equivalent of CPU.
//! 3. Attach to the multiplexed output stream, start, then block on the
//!    wait channel.
//! 4. Inspect the finished container for its StartedAt/FinishedAt
//!    timestamps; their difference is the reported runtime.
//! 5. Map the exit code through the language profile and collect the
//!    captured stdout.
//! 6. Remove the container (log-and-continue) and the workdir (always).
//!
//! Infrastructure failures never escape as errors: they are folded into
//! `RuntimeError` verdicts with the diagnostic in `output`, because the
//! editor client handles exactly one response shape.

use crate::config::{self, LanguageProfile};
use crate::preprocess;
use anyhow::{Context, Result};
use bollard::container::{
    AttachContainerOptions, Config, CreateContainerOptions, InspectContainerOptions, LogOutput,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use chrono::DateTime;
use futures_util::{Stream, StreamExt};
use pairpad_common::types::{Language, SourceCode, Verdict};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::pin::Pin;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 1 GiB of RAM per sandbox.
const MEMORY_LIMIT_BYTES: i64 = 1 << 30;
/// One core-equivalent: 100 ms of CPU time per 100 ms period.
const CPU_QUOTA_MICROS: i64 = 100_000;
const CPU_PERIOD_MICROS: i64 = 100_000;
/// The driver already caps output with `head -c`; this is the host-side
/// belt for the same limit.
const MAX_OUTPUT_BYTES: usize = 8192;

type OutputStream =
    Pin<Box<dyn Stream<Item = std::result::Result<LogOutput, bollard::errors::Error>> + Send>>;

/// One executor per supported language. Owns its connection to the
/// container runtime; created once at startup and shared by every
/// request handler.
pub struct SandboxExecutor {
    docker: Docker,
    profile: LanguageProfile,
}

/// Container cleanup guard. If execution bails out anywhere after
/// creation, dropping the guard force-removes the container in the
/// background; the happy path removes it explicitly and disarms.
struct ContainerGuard {
    docker: Docker,
    container_id: String,
    armed: bool,
}

impl ContainerGuard {
    fn new(docker: Docker, container_id: String) -> Self {
        Self {
            docker,
            container_id,
            armed: true,
        }
    }

    /// The caller has removed the container itself.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let docker = self.docker.clone();
        let container_id = self.container_id.clone();
        tokio::spawn(async move {
            let options = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };
            if let Err(e) = docker.remove_container(&container_id, Some(options)).await {
                warn!(container_id = %container_id, error = %e, "failed to remove container");
            }
        });
    }
}

impl SandboxExecutor {
    pub fn connect(profile: LanguageProfile) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .context("failed to connect to the container runtime")?;
        Ok(Self { docker, profile })
    }

    /// Pull the base image unless it is already cached locally. The pull
    /// stream must be drained to the end before returning; cutting it
    /// short makes the daemon abandon the download and nothing is stored.
    pub async fn ensure_image(&self) -> Result<()> {
        if self.docker.inspect_image(self.profile.image).await.is_ok() {
            debug!(image = self.profile.image, "sandbox image already cached");
            return Ok(());
        }

        info!(
            image = self.profile.image,
            "pulling sandbox image (this may take a minute on first run)"
        );
        let options = Some(CreateImageOptions {
            from_image: self.profile.image,
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress.context("failed to pull sandbox image")?;
        }

        info!(image = self.profile.image, "sandbox image ready");
        Ok(())
    }

    /// Run one submission to a verdict. The workdir is guaranteed removed
    /// on every path (TempDir drops after the verdict exists), and the
    /// container never outlives the workdir.
    pub async fn execute(&self, source: &SourceCode) -> Verdict {
        if let Err(e) = self.ensure_image().await {
            return Verdict::infra_error(format!("Failed to ensure sandbox image: {:#}", e));
        }

        let workdir = match self.stage_workdir(source) {
            Ok(dir) => dir,
            Err(e) => return Verdict::infra_error(format!("Failed to stage workdir: {:#}", e)),
        };

        match self.run_container(workdir.path()).await {
            Ok(verdict) => verdict,
            Err(e) => Verdict::infra_error(format!("{:#}", e)),
        }
    }

    /// Write the source, the preprocessed test cases, and the driver into
    /// a fresh temp directory.
    fn stage_workdir(&self, source: &SourceCode) -> Result<TempDir> {
        let dir = tempfile::Builder::new()
            .prefix(self.profile.workdir_prefix)
            .tempdir()
            .context("failed to create temp dir")?;

        let source_path = dir.path().join(self.profile.source_file);
        fs::write(&source_path, &source.content).context("failed to write source file")?;
        fs::set_permissions(&source_path, fs::Permissions::from_mode(0o644))
            .context("failed to set source file permissions")?;

        let input = preprocess::preprocess(&source.input, self.profile.input_mode);
        fs::write(dir.path().join("input.txt"), input).context("failed to write input file")?;

        let runner_path = dir.path().join(self.profile.runner_file);
        fs::write(&runner_path, self.profile.runner_script)
            .context("failed to write runner script")?;
        fs::set_permissions(&runner_path, fs::Permissions::from_mode(0o755))
            .context("failed to set runner permissions")?;

        Ok(dir)
    }

    async fn run_container(&self, workdir: &Path) -> Result<Verdict> {
        let container_name = format!("pairpad-{}", Uuid::new_v4());

        let container_config = Config {
            image: Some(self.profile.image.to_string()),
            working_dir: Some("/workdir".to_string()),
            cmd: Some(vec![
                "sh".to_string(),
                "-c".to_string(),
                self.profile.launch_cmd.to_string(),
            ]),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            network_disabled: Some(true),
            host_config: Some(HostConfig {
                binds: Some(vec![format!("{}:/workdir", workdir.display())]),
                memory: Some(MEMORY_LIMIT_BYTES),
                cpu_quota: Some(CPU_QUOTA_MICROS),
                cpu_period: Some(CPU_PERIOD_MICROS),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: container_name.as_str(),
                    platform: None,
                }),
                container_config,
            )
            .await
            .context("failed to create container")?;
        let container_id = created.id;
        let mut guard = ContainerGuard::new(self.docker.clone(), container_id.clone());

        let attached = self
            .docker
            .attach_container(
                &container_id,
                Some(AttachContainerOptions::<String> {
                    stream: Some(true),
                    stdout: Some(true),
                    stderr: Some(true),
                    ..Default::default()
                }),
            )
            .await
            .context("failed to attach to container")?;
        let collector = tokio::spawn(collect_output(attached.output));

        self.docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
            .context("failed to start container")?;

        let exit_code = self.wait_for_exit(&container_id).await?;
        let run_time = self.measure_run_time(&container_id).await?;
        let (stdout, _stderr) = collector.await.unwrap_or_default();

        guard.disarm();
        if let Err(e) = self
            .docker
            .remove_container(&container_id, None::<RemoveContainerOptions>)
            .await
        {
            warn!(container_id = %container_id, error = %e, "failed to remove container");
        }

        debug!(
            language = %self.profile.language,
            exit_code,
            run_time_ms = run_time,
            "sandbox finished"
        );

        Ok(Verdict {
            status: self.profile.status_for_exit(exit_code),
            exit_code,
            run_time,
            output: stdout,
        })
    }

    /// Block until the container reaches a terminal state and return its
    /// exit code. bollard reports non-zero exits as a typed error on the
    /// wait stream, so both arms carry a real status.
    async fn wait_for_exit(&self, container_id: &str) -> Result<i64> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut wait = self.docker.wait_container(container_id, Some(options));
        match wait.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(e).context("container wait error"),
            None => anyhow::bail!("container wait stream ended without a status"),
        }
    }

    /// Wall-clock runtime as the container runtime saw it, in
    /// milliseconds.
    async fn measure_run_time(&self, container_id: &str) -> Result<i64> {
        let inspected = self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
            .context("failed to inspect container")?;
        let state = inspected
            .state
            .context("container state missing from inspect response")?;
        let started_at = state
            .started_at
            .context("container start time missing from inspect response")?;
        let finished_at = state
            .finished_at
            .context("container finish time missing from inspect response")?;
        run_time_between(&started_at, &finished_at)
    }
}

/// The two live executors. Built once at startup; request handlers
/// dispatch into them by language tag.
pub struct Executors {
    pub python3: SandboxExecutor,
    pub java: SandboxExecutor,
}

impl Executors {
    pub fn connect() -> Result<Self> {
        Ok(Self {
            python3: SandboxExecutor::connect(config::python3_profile())?,
            java: SandboxExecutor::connect(config::java_profile())?,
        })
    }

    /// The executor for a language, or `None` for languages without an
    /// execution backend.
    pub fn for_language(&self, language: Language) -> Option<&SandboxExecutor> {
        match language {
            Language::Python3 => Some(&self.python3),
            Language::Java => Some(&self.java),
            Language::C | Language::Cpp => None,
        }
    }

    pub async fn prepull_images(&self) -> Result<()> {
        self.python3.ensure_image().await?;
        self.java.ensure_image().await
    }
}

/// Demultiplex the attached stream into stdout and stderr buffers, each
/// capped at 8 KiB. The drivers merge stderr into stdout with `2>&1`, so
/// in practice everything arrives on the stdout side.
async fn collect_output(mut stream: OutputStream) -> (String, String) {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(LogOutput::StdOut { message }) => append_capped(&mut stdout, &message),
            Ok(LogOutput::StdErr { message }) => append_capped(&mut stderr, &message),
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "error reading container output");
                break;
            }
        }
    }
    (
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    )
}

fn append_capped(buffer: &mut Vec<u8>, chunk: &[u8]) {
    let room = MAX_OUTPUT_BYTES.saturating_sub(buffer.len());
    buffer.extend_from_slice(&chunk[..chunk.len().min(room)]);
}

/// Millisecond difference between two RFC 3339 timestamps as reported by
/// the container runtime's inspect endpoint.
fn run_time_between(started_at: &str, finished_at: &str) -> Result<i64> {
    let started = DateTime::parse_from_rfc3339(started_at)
        .with_context(|| format!("failed to parse container start time {:?}", started_at))?;
    let finished = DateTime::parse_from_rfc3339(finished_at)
        .with_context(|| format!("failed to parse container finish time {:?}", finished_at))?;
    Ok(finished.signed_duration_since(started).num_milliseconds())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_time_between_docker_timestamps() {
        // Docker reports nanosecond precision.
        let started = "2024-05-01T10:00:00.100000000Z";
        let finished = "2024-05-01T10:00:01.350000000Z";
        assert_eq!(run_time_between(started, finished).unwrap(), 1250);
    }

    #[test]
    fn test_run_time_rejects_garbage_timestamps() {
        assert!(run_time_between("not-a-time", "2024-05-01T10:00:00Z").is_err());
        assert!(run_time_between("2024-05-01T10:00:00Z", "").is_err());
    }

    #[test]
    fn test_output_buffers_cap_at_8192_bytes() {
        let mut buffer = Vec::new();
        append_capped(&mut buffer, &[b'a'; 5000]);
        append_capped(&mut buffer, &[b'b'; 5000]);
        assert_eq!(buffer.len(), MAX_OUTPUT_BYTES);
        assert_eq!(buffer[4999], b'a');
        assert_eq!(buffer[5000], b'b');

        // Further appends are silently discarded.
        append_capped(&mut buffer, b"overflow");
        assert_eq!(buffer.len(), MAX_OUTPUT_BYTES);
    }
}

//! The containerized reference renderer behind a narrow capability
//! trait, so the orchestrator's fallback logic is testable without a
//! container runtime.

use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::{Duration, Instant},
};

use crate::foundation::error::{TonecraftError, TonecraftResult};
use crate::params::model::AdjustmentParams;
use crate::render::{OutputFormat, OutputOpts};
use crate::sidecar::profile::SidecarProfile;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const COPY_TIMEOUT: Duration = Duration::from_secs(10);
pub const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Capability interface for a reference-grade renderer.
pub trait ExternalRenderer: Send + Sync {
    /// Cheap liveness check; must respect a short timeout.
    fn probe(&self) -> bool;

    /// Render `image` with `params` into `out_dir`, returning the
    /// output path. Every failure is a structured [`TonecraftError::Adapter`];
    /// this never panics past its own boundary.
    fn render(
        &self,
        image: &Path,
        params: &AdjustmentParams,
        opts: &OutputOpts,
        out_dir: &Path,
    ) -> TonecraftResult<PathBuf>;
}

/// Reference renderer running inside a long-lived container.
///
/// We shell out to the container runtime binary rather than binding a
/// daemon API client, mirroring how the rest of the system invokes
/// external tools.
pub struct ContainerRenderer {
    runtime: String,
    container: String,
    renderer_bin: String,
}

impl ContainerRenderer {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            runtime: "docker".to_string(),
            container: container.into(),
            renderer_bin: "rawtherapee-cli".to_string(),
        }
    }

    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    fn cmd(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.runtime);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl ExternalRenderer for ContainerRenderer {
    fn probe(&self) -> bool {
        // Both checks must pass: the runtime answers, and the named
        // render container is actually running.
        let runtime_up = run_with_timeout(self.cmd(&["version"]), PROBE_TIMEOUT)
            .map(|out| out.status.success())
            .unwrap_or(false);
        if !runtime_up {
            return false;
        }

        run_with_timeout(
            self.cmd(&[
                "inspect",
                "-f",
                "{{.State.Running}}",
                &self.container,
            ]),
            PROBE_TIMEOUT,
        )
        .map(|out| {
            out.status.success() && String::from_utf8_lossy(&out.stdout).trim() == "true"
        })
        .unwrap_or(false)
    }

    fn render(
        &self,
        image: &Path,
        params: &AdjustmentParams,
        opts: &OutputOpts,
        out_dir: &Path,
    ) -> TonecraftResult<PathBuf> {
        let mut profile = SidecarProfile::from_params(params);
        if let Some(width) = opts.width {
            profile = profile.with_resize(width);
        }

        let tag = format!("{}-{}", std::process::id(), nanos_now());
        let profile_path = out_dir.join(format!("tc-profile-{tag}.pp3"));
        std::fs::write(&profile_path, profile.to_ini()).map_err(|e| {
            TonecraftError::adapter(format!(
                "failed to write sidecar profile '{}': {e}",
                profile_path.display()
            ))
        })?;
        // Best-effort cleanup of the host-side profile on every exit path.
        let _cleanup = TempFileGuard(&profile_path);

        let in_container = format!("/tmp/tc-input-{tag}");
        let profile_container = format!("/tmp/tc-profile-{tag}.pp3");
        let out_container = format!("/tmp/tc-output-{tag}.{}", opts.format.extension());

        self.copy_in(image, &in_container)?;
        self.copy_in(&profile_path, &profile_container)?;

        let quality_flag = match opts.format {
            OutputFormat::Jpeg => format!("-j{}", opts.quality),
            OutputFormat::Png => "-n".to_string(),
        };
        let exec = run_with_timeout(
            self.cmd(&[
                "exec",
                &self.container,
                &self.renderer_bin,
                "-o",
                &out_container,
                "-p",
                &profile_container,
                &quality_flag,
                "-Y",
                "-c",
                &in_container,
            ]),
            RENDER_TIMEOUT,
        )?;
        if !exec.status.success() {
            let stderr = String::from_utf8_lossy(&exec.stderr);
            return Err(TonecraftError::adapter(format!(
                "renderer exited with status {}: {}",
                exec.status,
                stderr.trim()
            )));
        }

        let host_out = out_dir.join(format!("tc-external-{tag}.{}", opts.format.extension()));
        self.copy_out(&out_container, &host_out)?;

        let len = std::fs::metadata(&host_out).map(|m| m.len()).unwrap_or(0);
        if len == 0 {
            return Err(TonecraftError::adapter(format!(
                "renderer produced no output at '{}'",
                host_out.display()
            )));
        }

        tracing::debug!(out = %host_out.display(), "external render complete");
        Ok(host_out)
    }
}

impl ContainerRenderer {
    fn copy_in(&self, host: &Path, in_container: &str) -> TonecraftResult<()> {
        let host_str = host.to_string_lossy().into_owned();
        let dest = format!("{}:{}", self.container, in_container);
        let out = run_with_timeout(self.cmd(&["cp", &host_str, &dest]), COPY_TIMEOUT)?;
        if !out.status.success() {
            return Err(TonecraftError::adapter(format!(
                "copy into container failed for '{}': {}",
                host.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(())
    }

    fn copy_out(&self, in_container: &str, host: &Path) -> TonecraftResult<()> {
        let src = format!("{}:{}", self.container, in_container);
        let host_str = host.to_string_lossy().into_owned();
        let out = run_with_timeout(self.cmd(&["cp", &src, &host_str]), COPY_TIMEOUT)?;
        if !out.status.success() {
            return Err(TonecraftError::adapter(format!(
                "copy out of container failed for '{in_container}': {}",
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(())
    }
}

struct TempFileGuard<'a>(&'a Path);

impl Drop for TempFileGuard<'_> {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(self.0);
    }
}

fn nanos_now() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

/// Run a command with a wall-clock deadline. The child is killed on
/// timeout; exceeding the deadline is an adapter failure, never a hang.
pub fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
) -> TonecraftResult<std::process::Output> {
    let program = cmd.get_program().to_string_lossy().to_string();
    let mut child = cmd
        .spawn()
        .map_err(|e| TonecraftError::adapter(format!("failed to spawn '{program}': {e}")))?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => {
                return child.wait_with_output().map_err(|e| {
                    TonecraftError::adapter(format!("failed to collect '{program}' output: {e}"))
                });
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(TonecraftError::adapter(format!(
                        "'{program}' timed out after {}s",
                        timeout.as_secs()
                    )));
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(e) => {
                let _ = child.kill();
                return Err(TonecraftError::adapter(format!(
                    "failed to poll '{program}': {e}"
                )));
            }
        }
    }
}

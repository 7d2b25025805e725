//! Child-process management for the WhatsApp Web sidecar.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use {
    anyhow::{Context, Result, bail},
    tokio::{
        io::{AsyncBufReadExt, AsyncRead, BufReader},
        process::{Child, Command},
    },
    tracing::{debug, error, info, warn},
};

/// Environment variable that points at the sidecar checkout.
pub const SIDECAR_DIR_ENV: &str = "SWITCHBOARD_SIDECAR_DIR";

const SIDECAR_SUBDIR: &str = "sidecar/whatsapp-web";
const STARTUP_GRACE: Duration = Duration::from_millis(500);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// How to launch the sidecar.
#[derive(Debug, Clone)]
pub struct SidecarLaunch {
    /// Directory containing the sidecar's `package.json`.
    pub sidecar_dir: PathBuf,
    pub port: u16,
    /// Root under which per-session auth directories live.
    pub auth_dir: PathBuf,
}

/// A running sidecar.
pub struct SidecarProcess {
    child: Child,
    port: u16,
}

impl SidecarProcess {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// SIGTERM, then SIGKILL if the process has not exited within
    /// [`STOP_TIMEOUT`].
    pub async fn stop(&mut self) -> Result<()> {
        info!(port = self.port, "stopping sidecar");

        #[cfg(unix)]
        {
            use nix::{
                sys::signal::{Signal, kill},
                unistd::Pid,
            };

            if let Some(pid) = self.child.id()
                && let Ok(pid) = i32::try_from(pid)
            {
                let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }

        match tokio::time::timeout(STOP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => info!(?status, "sidecar exited"),
            Ok(Err(e)) => warn!(error = %e, "error waiting for sidecar"),
            Err(_) => {
                warn!("sidecar ignored SIGTERM, killing");
                self.child
                    .kill()
                    .await
                    .context("failed to kill sidecar process")?;
            },
        }
        Ok(())
    }
}

/// Locate the sidecar checkout.
///
/// Order: `explicit`, then [`SIDECAR_DIR_ENV`], then next to the executable,
/// then relative to the working directory.
pub fn find_sidecar_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if is_sidecar_dir(path) {
            return Ok(path.to_path_buf());
        }
        bail!(
            "configured sidecar directory {} has no package.json",
            path.display()
        );
    }

    if let Ok(dir) = std::env::var(SIDECAR_DIR_ENV) {
        let path = PathBuf::from(&dir);
        if is_sidecar_dir(&path) {
            return Ok(path);
        }
        warn!(path = %dir, "{SIDECAR_DIR_ENV} set but package.json not found");
    }

    let mut candidates = Vec::new();
    if let Ok(exe) = std::env::current_exe()
        && let Some(exe_dir) = exe.parent()
    {
        candidates.push(exe_dir.join("..").join(SIDECAR_SUBDIR));
        candidates.push(exe_dir.join("../..").join(SIDECAR_SUBDIR));
    }
    candidates.push(PathBuf::from(SIDECAR_SUBDIR));
    candidates.push(Path::new("..").join(SIDECAR_SUBDIR));

    first_sidecar_dir(candidates).with_context(|| {
        format!("WhatsApp sidecar not found; set {SIDECAR_DIR_ENV} or [whatsapp].sidecar_dir")
    })
}

fn is_sidecar_dir(path: &Path) -> bool {
    path.join("package.json").is_file()
}

fn first_sidecar_dir(candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    candidates
        .into_iter()
        .find(|p| is_sidecar_dir(p))
        .map(|p| p.canonicalize().unwrap_or(p))
}

/// Install dependencies and build the sidecar if `dist/index.js` is missing.
async fn ensure_built(sidecar_dir: &Path) -> Result<()> {
    if sidecar_dir.join("dist/index.js").exists() {
        return Ok(());
    }
    if !sidecar_dir.join("node_modules").exists() {
        run_npm(sidecar_dir, &["install"]).await?;
    }
    run_npm(sidecar_dir, &["run", "build"]).await
}

async fn run_npm(sidecar_dir: &Path, args: &[&str]) -> Result<()> {
    let label = args.join(" ");
    info!(path = %sidecar_dir.display(), command = %label, "running npm for sidecar");

    let output = Command::new("npm")
        .args(args)
        .current_dir(sidecar_dir)
        .output()
        .await
        .with_context(|| format!("failed to run npm {label}"))?;
    if !output.status.success() {
        bail!(
            "npm {label} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(())
}

/// Build (if needed) and spawn the sidecar, forwarding its output to tracing.
pub async fn start_sidecar(launch: &SidecarLaunch) -> Result<SidecarProcess> {
    let dir = &launch.sidecar_dir;
    if !is_sidecar_dir(dir) {
        bail!("no sidecar at {}", dir.display());
    }
    ensure_built(dir).await?;

    info!(path = %dir.display(), port = launch.port, "starting sidecar");
    let mut child = Command::new("node")
        .arg("dist/index.js")
        .current_dir(dir)
        .env("SWITCHBOARD_SIDECAR_PORT", launch.port.to_string())
        .env("SWITCHBOARD_AUTH_DIR", &launch.auth_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context("failed to spawn sidecar")?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_output(stdout, false));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_output(stderr, true));
    }

    tokio::time::sleep(STARTUP_GRACE).await;
    if let Some(status) = child
        .try_wait()
        .context("failed to poll sidecar status")?
    {
        bail!("sidecar exited during startup with {status}");
    }

    info!(port = launch.port, "sidecar started");
    Ok(SidecarProcess {
        child,
        port: launch.port,
    })
}

async fn forward_output(stream: impl AsyncRead + Unpin, is_stderr: bool) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr {
            warn!(target: "whatsapp_sidecar", "{line}");
        } else {
            log_sidecar_line(&line);
        }
    }
}

/// Sidecar stdout is pino JSON; map its numeric levels onto tracing.
fn log_sidecar_line(line: &str) {
    let Some(log) = line
        .starts_with('{')
        .then(|| serde_json::from_str::<serde_json::Value>(line).ok())
        .flatten()
    else {
        info!(target: "whatsapp_sidecar", "{line}");
        return;
    };

    let msg = log.get("msg").and_then(|v| v.as_str()).unwrap_or(line);
    let session = log.get("session_id").and_then(|v| v.as_str()).unwrap_or("");
    match log.get("level").and_then(|v| v.as_u64()).unwrap_or(30) {
        10 | 20 => debug!(target: "whatsapp_sidecar", session, "{msg}"),
        30 => info!(target: "whatsapp_sidecar", session, "{msg}"),
        40 => warn!(target: "whatsapp_sidecar", session, "{msg}"),
        _ => error!(target: "whatsapp_sidecar", session, "{msg}"),
    }
}

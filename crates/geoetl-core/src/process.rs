//! Launching and tearing down import modules.
//!
//! A module runs with its standard streams piped. Standard input carries the
//! encoded import stream; standard output and standard error are drained by
//! background tasks for the whole life of the process so a chatty module can
//! never stall on a full pipe. The first byte a module writes to standard
//! output doubles as its acknowledgement.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use geoetl_core_common::StoreObject;
use log::{debug, info, warn};
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::ImportConfig;
use crate::error::{ImportError, Result};

/// How long to wait for output readers once the module is gone.
const OUTPUT_GRACE: Duration = Duration::from_secs(1);

/// A running import module.
pub(crate) struct ModuleProcess {
    module: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: JoinHandle<Vec<u8>>,
    stderr: JoinHandle<Vec<u8>>,
    ack: oneshot::Receiver<u8>,
    gisrc: NamedTempFile,
}

impl ModuleProcess {
    /// Starts `module` from the configured module directory with the store
    /// session of `object` in its environment.
    pub(crate) fn start(
        config: &ImportConfig,
        module: &str,
        object: &StoreObject,
        arguments: &[String],
    ) -> Result<Self> {
        let path = config.module_path(module);
        let module = path.display().to_string();
        let spawn_error = |source: io::Error| ImportError::Spawn {
            module: module.clone(),
            source,
        };

        let gisrc = write_gisrc(object).map_err(spawn_error)?;
        let search_path = search_path(config)?;

        info!("Starting {module} {}", arguments.join(" "));
        let mut command = Command::new(&path);
        command
            .args(arguments)
            .env("GISRC", gisrc.path())
            .env("GISDBASE", object.gisdbase())
            .env("LOCATION_NAME", object.location())
            .env("MAPSET", object.mapset())
            .env("PATH", search_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(gisbase) = &config.gisbase {
            command.env("GISBASE", gisbase);
        }

        let mut child = command.spawn().map_err(spawn_error)?;
        let stdin = child.stdin.take();
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(spawn_error(io::Error::other("module output is not piped")));
        };
        let (ack_sender, ack) = oneshot::channel();

        Ok(Self {
            child,
            stdin,
            stdout: tokio::spawn(drain(stdout, Some(ack_sender))),
            stderr: tokio::spawn(drain(stderr, None)),
            ack,
            gisrc,
            module,
        })
    }

    /// Writes one complete record to the module and flushes it.
    pub(crate) async fn write(&mut self, record: &[u8]) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::BrokenPipe))?;
        stdin.write_all(record).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Waits up to `timeout` for the module's acknowledgement byte.
    ///
    /// Returns `None` if the module closed its output or stayed silent.
    pub(crate) async fn read_ack(&mut self, timeout: Duration) -> Option<bool> {
        match time::timeout(timeout, &mut self.ack).await {
            Ok(Ok(byte)) => Some(byte != 0),
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Closes the module's input and waits up to `timeout` for it to exit.
    ///
    /// A module that does not exit in time is killed.
    pub(crate) async fn finish(self, timeout: Duration) -> Result<()> {
        let Self {
            module,
            mut child,
            stdin,
            stdout,
            stderr,
            gisrc: _gisrc,
            ..
        } = self;
        drop(stdin);

        let status = match time::timeout(timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!("{module} did not finish within {timeout:?}, killing it");
                if let Err(e) = child.kill().await {
                    warn!("Cannot kill {module}: {e}");
                }
                log_output(&module, &collect(stdout).await, &collect(stderr).await);
                return Err(ImportError::Timeout { module, timeout });
            },
        };

        let stdout = collect(stdout).await;
        let stderr = collect(stderr).await;
        debug!("{module} finished: {status}");
        log_output(&module, &stdout, &stderr);

        if status.success() {
            return Ok(());
        }
        match status.code() {
            Some(code) => Err(ImportError::ModuleFailed {
                module,
                code,
                stderr: stderr.trim().to_string(),
            }),
            None => Err(ImportError::ModuleCrashed {
                module,
                status: status.to_string(),
            }),
        }
    }

    /// Kills the module after a fatal error and reaps it.
    pub(crate) async fn abort(self) {
        let Self {
            module,
            mut child,
            stdin,
            stdout,
            stderr,
            ..
        } = self;
        drop(stdin);
        if let Err(e) = child.kill().await {
            warn!("Cannot kill {module}: {e}");
        }
        log_output(&module, &collect(stdout).await, &collect(stderr).await);
    }
}

/// Tears down a module after streaming.
///
/// A fatal streaming error kills the module. A broken pipe means the module
/// stopped reading, so its exit status decides the outcome and the broken pipe
/// is only reported when the module claims success.
pub(crate) async fn complete(
    process: ModuleProcess,
    streamed: Result<()>,
    timeout: Duration,
) -> Result<()> {
    match streamed {
        Err(e) if !e.is_broken_pipe() => {
            process.abort().await;
            Err(e)
        },
        streamed => {
            process.finish(timeout).await?;
            streamed
        },
    }
}

async fn drain<R: AsyncRead + Unpin>(mut reader: R, mut first: Option<oneshot::Sender<u8>>) -> Vec<u8> {
    let mut output = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if let Some(sender) = first.take() {
                    let _ = sender.send(chunk[0]);
                }
                output.extend_from_slice(&chunk[..n]);
            },
            Err(e) => {
                debug!("Cannot read module output: {e}");
                break;
            },
        }
    }
    output
}

async fn collect(mut reader: JoinHandle<Vec<u8>>) -> String {
    match time::timeout(OUTPUT_GRACE, &mut reader).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            debug!("Module output reader failed: {e}");
            String::new()
        },
        Err(_) => {
            reader.abort();
            String::new()
        },
    }
}

fn log_output(module: &str, stdout: &str, stderr: &str) {
    if !stdout.trim().is_empty() {
        debug!("{module} stdout: {}", stdout.trim());
    }
    if !stderr.trim().is_empty() {
        debug!("{module} stderr: {}", stderr.trim());
    }
}

/// Writes the session file a module reads to find its mapset.
fn write_gisrc(object: &StoreObject) -> io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new().prefix("geoetl-gisrc-").tempfile()?;
    writeln!(file, "GISDBASE: {}", object.gisdbase().display())?;
    writeln!(file, "LOCATION_NAME: {}", object.location())?;
    writeln!(file, "MAPSET: {}", object.mapset())?;
    file.flush()?;
    Ok(file)
}

/// Module directory and store binaries ahead of the inherited `PATH`.
fn search_path(config: &ImportConfig) -> Result<OsString> {
    let mut paths: Vec<PathBuf> = vec![config.module_dir.clone()];
    if let Some(gisbase) = &config.gisbase {
        paths.push(gisbase.join("bin"));
        paths.push(gisbase.join("scripts"));
    }
    if let Some(inherited) = std::env::var_os("PATH") {
        paths.extend(std::env::split_paths(&inherited));
    }
    std::env::join_paths(paths)
        .map_err(|e| ImportError::Precondition(format!("Invalid module search path: {e}")))
}

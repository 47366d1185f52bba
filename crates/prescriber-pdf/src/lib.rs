//! Subprocess-backed PDF conversion.
//!
//! Implements [`DocumentConverter`] by shelling out to LibreOffice
//! (`soffice --headless --convert-to pdf`) under a hard timeout. The
//! converter polls the child and kills it at the deadline, so a wedged
//! LibreOffice instance surfaces as a retryable [`ConvertError::Timeout`]
//! instead of hanging the lifecycle.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use prescriber_core::render::{ConvertError, DocumentConverter};

/// Default hard deadline for one conversion.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// LibreOffice-backed document converter.
pub struct SofficeConverter {
    soffice_path: PathBuf,
    timeout: Duration,
}

impl SofficeConverter {
    /// Use `soffice` from `PATH` with the default timeout.
    pub fn new() -> Self {
        Self::with_binary("soffice")
    }

    /// Use a specific LibreOffice binary.
    pub fn with_binary(path: impl Into<PathBuf>) -> Self {
        Self {
            soffice_path: path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn spawn(&self, workdir: &Path, input: &Path) -> Result<Child, ConvertError> {
        Command::new(&self.soffice_path)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(workdir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ConvertError::Unavailable(format!(
                    "{} not found",
                    self.soffice_path.display()
                )),
                _ => ConvertError::Failed(format!("could not start soffice: {e}")),
            })
    }

    /// Poll until exit or deadline; the child is killed at the deadline.
    fn wait_with_deadline(&self, child: &mut Child) -> Result<ExitStatus, ConvertError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(e) => return Err(ConvertError::Failed(format!("wait failed: {e}"))),
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(timeout_s = self.timeout.as_secs(), "soffice killed at deadline");
                return Err(ConvertError::Timeout {
                    seconds: self.timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Default for SofficeConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentConverter for SofficeConverter {
    fn convert(&self, document: &[u8]) -> Result<Vec<u8>, ConvertError> {
        let workdir = tempfile::tempdir()
            .map_err(|e| ConvertError::Failed(format!("could not create work dir: {e}")))?;
        let input = workdir.path().join("document.docx");
        std::fs::write(&input, document)
            .map_err(|e| ConvertError::Failed(format!("could not write input: {e}")))?;

        let mut child = self.spawn(workdir.path(), &input)?;
        let status = self.wait_with_deadline(&mut child)?;

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            return Err(ConvertError::Failed(format!(
                "soffice exited with {status}: {}",
                stderr.trim()
            )));
        }

        let output = workdir.path().join("document.pdf");
        std::fs::read(&output)
            .map_err(|e| ConvertError::Failed(format!("soffice produced no output: {e}")))
    }
}

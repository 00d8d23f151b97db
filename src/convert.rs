//! External HTML→Markdown converter subprocess.
//!
//! The converter (pandoc by default) is an opaque capability boundary: this
//! module hands it encoding-corrected HTML on stdin and receives Markdown on
//! stdout. Conversion correctness for arbitrary HTML constructs is the
//! converter's business, not ours.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to start converter '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("converter I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("converter exited with an error: {0}")]
    Failed(String),

    #[error("converter timed out after {0}s")]
    Timeout(u64),
}

/// Handle on the external converter command line.
#[derive(Debug, Clone)]
pub struct MarkdownConverter {
    program: String,
    args: Vec<String>,
    timeout_secs: u64,
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownConverter {
    /// Pandoc on PATH, GitHub-flavored Markdown output, unwrapped lines.
    pub fn new() -> Self {
        Self {
            program: "pandoc".to_string(),
            args: ["-f", "html", "-t", "gfm", "--wrap=none"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout_secs: 30,
        }
    }

    /// Use a specific converter executable instead of `pandoc` from PATH.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Replace the converter argument list.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-invocation timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Check the converter is installed and runnable.
    pub async fn is_available(&self) -> bool {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await;

        output.map(|o| o.status.success()).unwrap_or(false)
    }

    /// Convert one HTML document to Markdown text.
    pub async fn convert(&self, html: &str) -> Result<String, ConvertError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ConvertError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(html.as_bytes()).await?;
            // dropping stdin closes the pipe so the child sees EOF
        }

        let output = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| ConvertError::Timeout(self.timeout_secs))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::Failed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_program_is_unavailable() {
        let converter = MarkdownConverter::new().with_program("definitely-not-a-real-converter");
        assert!(!converter.is_available().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_passthrough_convert() {
        // `cat` as an identity converter exercises the full pipe plumbing
        let converter = MarkdownConverter::new()
            .with_program("cat")
            .with_args(Vec::<String>::new());

        let out = converter.convert("<p>hello</p>").await.unwrap();
        assert_eq!(out, "<p>hello</p>");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_converter_surfaces_error() {
        let converter = MarkdownConverter::new()
            .with_program("false")
            .with_args(Vec::<String>::new());

        // Depending on timing the stdin write may hit a closed pipe first,
        // so both Failed and Io are acceptable here.
        match converter.convert("<p>x</p>").await {
            Err(ConvertError::Failed(_)) | Err(ConvertError::Io(_)) => {}
            other => panic!("expected an error, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_slow_converter() {
        let converter = MarkdownConverter::new()
            .with_program("sleep")
            .with_args(["5"])
            .with_timeout(1);

        match converter.convert("<p>x</p>").await {
            Err(ConvertError::Timeout(1)) => {}
            other => panic!("expected Timeout, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_builder_overrides() {
        let converter = MarkdownConverter::new()
            .with_program("/opt/pandoc/bin/pandoc")
            .with_timeout(60);
        assert_eq!(converter.program(), "/opt/pandoc/bin/pandoc");
    }
}

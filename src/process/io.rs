//! I/O primitives for communicating with the engine subprocess.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

/// Reads newline-delimited protocol lines from the engine stdout.
///
/// Lines are returned trimmed; blank lines are skipped. Reads that end in
/// the middle of a line are buffered until the newline arrives, and bytes
/// that are not valid UTF-8 are replaced rather than treated as an error.
pub struct LineReader<R> {
    reader: BufReader<R>,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Create a new reader from an engine output stream.
    pub fn new(stdout: R) -> Self {
        Self {
            reader: BufReader::new(stdout),
            buffer: Vec::with_capacity(256),
        }
    }

    /// Read the next non-empty line.
    ///
    /// Returns `Ok(Some(line))` for each line, `Ok(None)` when EOF is reached,
    /// or `Err` on I/O errors. A final line without a trailing newline is
    /// still returned before EOF.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        loop {
            self.buffer.clear();

            let bytes_read = self
                .reader
                .read_until(b'\n', &mut self.buffer)
                .await
                .map_err(Error::io)?;

            if bytes_read == 0 {
                return Ok(None);
            }

            let line = String::from_utf8_lossy(&self.buffer);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            return Ok(Some(line.to_string()));
        }
    }
}

/// Writes protocol lines to the engine stdin.
pub struct LineWriter<W> {
    stdin: W,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    /// Create a new writer from an engine input stream.
    pub fn new(stdin: W) -> Self {
        Self { stdin }
    }

    /// Write one line followed by `\n` and flush it.
    ///
    /// Failures are reported as [`Error::Write`]: the pipe is unusable.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        self.stdin.write_all(&bytes).await.map_err(Error::Write)?;
        self.stdin.flush().await.map_err(Error::Write)?;
        Ok(())
    }

    /// Close the engine stdin, signalling EOF.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stdin.shutdown().await.map_err(Error::Write)
    }
}

/// Forward engine stderr to `tracing` until the stream closes.
pub(crate) async fn forward_stderr<R: AsyncRead + Unpin>(stderr: R, pid: Option<u32>) {
    let mut reader = LineReader::new(stderr);
    loop {
        match reader.read_line().await {
            Ok(Some(line)) => {
                tracing::debug!(target: "libuci::engine_stderr", ?pid, "{}", line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(target: "libuci::engine_stderr", ?pid, "stderr read failed: {}", e);
                break;
            }
        }
    }
}

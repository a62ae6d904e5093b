//! Line-oriented transports for the MCP server.
//!
//! The stdio transport follows the MCP stdio rules:
//!
//! - Messages are UTF-8 encoded JSON-RPC (invalid bytes are replaced with
//!   U+FFFD and left for the decoder to reject)
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//! - stdin: receives messages from client
//! - stdout: sends messages to client
//! - stderr: may be used for logging (not MCP messages)
//!
//! [`LineTransport`] works over any buffered Tokio reader and writer, so the
//! same code serves stdio in production and in-memory buffers in tests.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// A source and sink of complete protocol messages, one per line.
#[allow(async_fn_in_trait)] // Only used with concrete transports; no Send bound needed.
pub trait Transport {
    /// Reads the next message line.
    ///
    /// Returns `Ok(None)` at end-of-stream. Blank lines are returned as-is;
    /// callers skip them.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    async fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Writes one complete encoded message followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or flushing fails.
    async fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Flushes and releases the output side. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush or shutdown fails.
    async fn close(&mut self) -> io::Result<()>;
}

/// A newline-delimited transport over a buffered reader and a writer.
#[derive(Debug)]
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
    closed: bool,
}

/// The stdio transport used by the binary.
pub type StdioTransport = LineTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

impl StdioTransport {
    /// Creates a transport over the process's stdin and stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W> {
    /// Creates a transport from a reader and writer.
    #[must_use]
    pub const fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            closed: false,
        }
    }

    /// Consumes the transport, returning the reader and writer.
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Returns `true` once [`Transport::close`] has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<R, W> Transport for LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        let bytes_read = self.reader.read_until(b'\n', &mut buf).await?;

        if bytes_read == 0 {
            // EOF - input closed
            return Ok(None);
        }

        // Remove the trailing newline
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }

        // Invalid UTF-8 is replaced, never an error: the decoder answers it
        // with a parse error and the session keeps reading.
        let line = match String::from_utf8(buf) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(bytes = bytes_read, "Received line is not valid UTF-8");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        tracing::trace!(bytes = bytes_read, "Received line");
        Ok(Some(line))
    }

    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "transport is closed",
            ));
        }

        // MCP stdio framing: messages must not contain embedded newlines
        debug_assert!(
            !line.contains('\n'),
            "JSON message must not contain embedded newlines"
        );

        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.writer.flush().await?;
        self.writer.shutdown().await
    }
}

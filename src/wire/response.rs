use tokio::io::{AsyncRead, AsyncReadExt};

use crate::wire::error::{WireError, WireResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    StatusLine,
    Headers,
    Body,
}

/// Incremental HTTP/1.x response parser.
///
/// Runs through three phases as bytes arrive: status line, header lines,
/// body. Only the numeric status code is semantically significant to the
/// pipeline; headers are kept so `Content-Length` can signal completion
/// before the peer closes the connection.
#[derive(Debug)]
pub struct ResponseParser {
    phase: Phase,
    line_buffer: Vec<u8>,
    status_code: Option<u16>,
    headers: Vec<(String, String)>,
    content_length: Option<u64>,
    body: Vec<u8>,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            phase: Phase::StatusLine,
            line_buffer: Vec::new(),
            status_code: None,
            headers: Vec::new(),
            content_length: None,
            body: Vec::new(),
        }
    }

    /// Feed raw bytes from the connection.
    pub fn feed(&mut self, mut bytes: &[u8]) -> WireResult<()> {
        while !bytes.is_empty() {
            if self.phase == Phase::Body {
                self.body.extend_from_slice(bytes);
                return Ok(());
            }

            match bytes.iter().position(|&b| b == b'\n') {
                Some(idx) => {
                    self.line_buffer.extend_from_slice(&bytes[..idx]);
                    bytes = &bytes[idx + 1..];
                    let line = std::mem::take(&mut self.line_buffer);
                    self.handle_line(&line)?;
                }
                None => {
                    self.line_buffer.extend_from_slice(bytes);
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &[u8]) -> WireResult<()> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches('\r');

        match self.phase {
            Phase::StatusLine => {
                let mut parts = line.split_whitespace();
                let version = parts.next().unwrap_or("");
                let code = parts.next().and_then(|c| c.parse::<u16>().ok());
                match code {
                    Some(code) if version.starts_with("HTTP/") => {
                        self.status_code = Some(code);
                        self.phase = Phase::Headers;
                        Ok(())
                    }
                    _ => Err(WireError::MalformedStatusLine(line.to_string())),
                }
            }
            Phase::Headers => {
                if line.is_empty() {
                    self.phase = Phase::Body;
                    return Ok(());
                }
                if let Some((name, value)) = line.split_once(':') {
                    let name = name.trim().to_ascii_lowercase();
                    let value = value.trim().to_string();
                    if name == "content-length" {
                        self.content_length = value.parse().ok();
                    }
                    self.headers.push((name, value));
                }
                Ok(())
            }
            Phase::Body => unreachable!("body bytes are consumed in feed"),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn headers_complete(&self) -> bool {
        self.phase == Phase::Body
    }

    /// Whether the response can be considered finished without waiting for
    /// the peer to close. Without a `Content-Length`, only EOF terminates.
    pub fn is_complete(&self) -> bool {
        match (self.phase, self.content_length) {
            (Phase::Body, Some(len)) => self.body.len() as u64 >= len,
            _ => false,
        }
    }

    /// Drive the parser from a reader until completion or EOF.
    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> WireResult<Self> {
        let mut parser = Self::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(parser);
            }
            parser.feed(&buf[..n])?;
            if parser.is_complete() {
                return Ok(parser);
            }
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Minimal HTTP/1.1 request framing for IPP-over-HTTP (RFC 8010 SS4).
//
// Only what an IPP client needs is understood: the request line, a handful
// of headers, and the three body framings (Content-Length, chunked, or
// read-to-EOF for raw IPP without an HTTP envelope).  The body is exposed as
// a pull-based reader so the document can be streamed to disk.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Upper bound on the size of the request head.
const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Upper bound on a single chunk-size line.
const MAX_CHUNK_LINE: usize = 1024;

/// Parsed HTTP request line and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHead {
    pub method: String,
    pub path: String,
    /// Header names lower-cased, values trimmed.
    pub headers: Vec<(String, String)>,
}

impl HttpHead {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|v| v.parse::<u64>().ok())
    }

    pub fn is_chunked(&self) -> bool {
        self.header("transfer-encoding")
            .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
    }

    pub fn expects_continue(&self) -> bool {
        self.header("expect")
            .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"))
    }

    /// Body framing implied by the headers.
    pub fn framing(&self) -> BodyFraming {
        if self.is_chunked() {
            BodyFraming::Chunked
        } else {
            BodyFraming::Length(self.content_length().unwrap_or(0))
        }
    }
}

/// Whether the first bytes of a connection look like an HTTP request line
/// rather than a raw IPP version header.
pub fn looks_like_http(peek: &[u8]) -> bool {
    peek.first().is_some_and(|b| b.is_ascii_uppercase())
}

/// Read the request line and headers, stopping at the blank line.
pub async fn read_http_head<R>(reader: &mut R) -> io::Result<HttpHead>
where
    R: AsyncBufRead + Unpin,
{
    let mut total = 0usize;
    let mut line = String::new();

    let request_line = read_limited_line(reader, &mut line, &mut total).await?;
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
        return Err(invalid(format!("malformed request line: {request_line:?}")));
    };
    let (method, path) = (method.to_string(), path.to_string());

    let mut headers = Vec::new();
    loop {
        let header_line = read_limited_line(reader, &mut line, &mut total).await?;
        if header_line.is_empty() {
            break;
        }
        let Some((name, value)) = header_line.split_once(':') else {
            return Err(invalid(format!("malformed header: {header_line:?}")));
        };
        headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
    }

    Ok(HttpHead {
        method,
        path,
        headers,
    })
}

async fn read_limited_line<R>(reader: &mut R, line: &mut String, total: &mut usize) -> io::Result<String>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    let remaining = MAX_HEAD_BYTES.saturating_sub(*total) as u64;
    let n = (&mut *reader).take(remaining).read_line(line).await?;
    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed inside HTTP head",
        ));
    }
    *total += n;
    if !line.ends_with('\n') {
        return Err(invalid("HTTP head too large".into()));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// How the end of the request body is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// Exactly this many bytes.
    Length(u64),
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// Everything until the peer closes its write side.
    UntilEof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyState {
    /// Bytes left in the current length-delimited region.
    Remaining(u64),
    /// Between chunks; the next thing on the wire is a size line.
    ChunkHeader,
    UntilEof,
    Done,
}

/// Pull-based reader over a request body.
///
/// `read` returns `Ok(0)` exactly once the body is complete.  A peer that
/// closes early produces an `UnexpectedEof` error instead.
pub struct BodyReader<R> {
    inner: R,
    state: BodyState,
    chunked: bool,
}

impl<R> BodyReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(inner: R, framing: BodyFraming) -> Self {
        let (state, chunked) = match framing {
            BodyFraming::Length(0) => (BodyState::Done, false),
            BodyFraming::Length(n) => (BodyState::Remaining(n), false),
            BodyFraming::Chunked => (BodyState::ChunkHeader, true),
            BodyFraming::UntilEof => (BodyState::UntilEof, false),
        };
        Self {
            inner,
            state,
            chunked,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == BodyState::Done
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.state {
                BodyState::Done => return Ok(0),
                BodyState::UntilEof => {
                    let n = self.inner.read(buf).await?;
                    if n == 0 {
                        self.state = BodyState::Done;
                    }
                    return Ok(n);
                }
                BodyState::ChunkHeader => {
                    let size = self.read_chunk_size().await?;
                    if size == 0 {
                        self.skip_trailers().await?;
                        self.state = BodyState::Done;
                        return Ok(0);
                    }
                    self.state = BodyState::Remaining(size);
                }
                BodyState::Remaining(left) => {
                    let want = buf.len().min(usize::try_from(left).unwrap_or(usize::MAX));
                    let n = self.inner.read(&mut buf[..want]).await?;
                    if n == 0 {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("peer closed with {left} body bytes outstanding"),
                        ));
                    }
                    let left = left - n as u64;
                    if left > 0 {
                        self.state = BodyState::Remaining(left);
                    } else if self.chunked {
                        self.expect_crlf().await?;
                        self.state = BodyState::ChunkHeader;
                    } else {
                        self.state = BodyState::Done;
                    }
                    return Ok(n);
                }
            }
        }
    }

    async fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        let n = (&mut self.inner)
            .take(MAX_CHUNK_LINE as u64)
            .read_line(&mut line)
            .await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed inside chunked body",
            ));
        }
        if !line.ends_with('\n') {
            return Err(invalid("chunk line too long".into()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn read_chunk_size(&mut self) -> io::Result<u64> {
        let line = self.read_line().await?;
        // Chunk extensions (";name=value") are ignored.
        let size = line.split(';').next().unwrap_or_default().trim();
        u64::from_str_radix(size, 16).map_err(|_| invalid(format!("bad chunk size: {size:?}")))
    }

    async fn expect_crlf(&mut self) -> io::Result<()> {
        let line = self.read_line().await?;
        if line.is_empty() {
            Ok(())
        } else {
            Err(invalid("missing CRLF after chunk data".into()))
        }
    }

    async fn skip_trailers(&mut self) -> io::Result<()> {
        while !self.read_line().await?.is_empty() {}
        Ok(())
    }
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

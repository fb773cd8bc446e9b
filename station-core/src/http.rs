//! Minimal HTTP/1.1 GET over a raw stream, positioned for a JSON parser.
//!
//! No response parsing happens here beyond skipping to the start of the body:
//! the caller reads the JSON document straight off the returned reader.

use std::{fmt::Debug, io, time::Duration};

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
    time::timeout,
};
use tracing::debug;

use crate::error::FetchError;

pub const HTTP_PORT: u16 = 80;

/// How long to wait for the server to start answering, and for each later read.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Query components: everything but RFC 3986 unreserved characters is escaped.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Path segments for the legacy API, which takes `country/city` and `lat,lon` in the path.
const PATH_ENCODE_SET: &AsciiSet = &QUERY_ENCODE_SET.remove(b'/').remove(b',').remove(b':');

pub fn encode_query(component: &str) -> String {
    utf8_percent_encode(component, QUERY_ENCODE_SET).to_string()
}

pub fn encode_path(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_ENCODE_SET).to_string()
}

/// Opens byte streams to named hosts.
#[async_trait]
pub trait Connector: Send + Sync + Debug {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    async fn connect(&self, host: &str, port: u16) -> io::Result<Self::Stream>;
}

/// Plain TCP through the tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        match timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port))).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
        }
    }
}

/// Where the body is taken to begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipMode {
    /// Discard everything up to and including the first `\r\n\r\n`.
    HeaderTerminator,
    /// Discard everything before the first `{` or `[`.
    #[default]
    JsonStart,
}

pub type Body<S> = BufReader<S>;

#[derive(Debug, Clone)]
pub struct HttpJsonFetcher<C> {
    connector: C,
    port: u16,
    skip: SkipMode,
    timeout: Duration,
}

impl<C: Connector> HttpJsonFetcher<C> {
    pub fn new(connector: C) -> Self {
        Self { connector, port: HTTP_PORT, skip: SkipMode::default(), timeout: RESPONSE_TIMEOUT }
    }

    pub fn with_skip_mode(mut self, skip: SkipMode) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Connect to `host`, send a GET whose target is written by `add_target`, and
    /// return the response stream positioned at the start of the body.
    pub async fn connect_and_get<F>(&self, host: &str, add_target: F) -> Result<Body<C::Stream>, FetchError>
    where
        F: FnOnce(&mut String),
    {
        let mut stream = self.connector.connect(host, self.port).await.map_err(|source| {
            FetchError::Connect { host: host.to_owned(), source }
        })?;

        let mut request = String::from("GET ");
        add_target(&mut request);
        debug!("GET {}{}", host, &request[4..]);
        request.push_str(" HTTP/1.1\r\nHost: ");
        request.push_str(host);
        request.push_str("\r\nConnection: close\r\nAccept: application/json\r\n\r\n");

        let io_err = |source| FetchError::Io { host: host.to_owned(), source };
        stream.write_all(request.as_bytes()).await.map_err(io_err)?;
        stream.flush().await.map_err(io_err)?;

        let mut reader = BufReader::new(stream);
        match self.skip {
            SkipMode::JsonStart => self.skip_to_json(host, &mut reader).await?,
            SkipMode::HeaderTerminator => self.skip_headers(host, &mut reader).await?,
        }
        Ok(reader)
    }

    /// Read the rest of the body, at most `limit` bytes.
    ///
    /// The body is buffered before parsing rather than parsed off the socket.
    /// `limit` is the backend's budget for this request kind, the same figure the
    /// memory guard checks, so the buffer never outgrows what was checked.
    pub async fn read_document(&self, host: &str, body: Body<C::Stream>, limit: usize) -> Result<Vec<u8>, FetchError> {
        let mut body = body.take(limit as u64);
        let mut doc = Vec::with_capacity(limit.min(4096));
        let mut chunk = [0u8; 512];

        loop {
            let n = match timeout(self.timeout, body.read(&mut chunk)).await {
                Ok(Ok(n)) => n,
                Ok(Err(source)) => return Err(FetchError::Io { host: host.to_owned(), source }),
                Err(_) => return Err(FetchError::Timeout { host: host.to_owned() }),
            };
            if n == 0 {
                break;
            }
            doc.extend_from_slice(&chunk[..n]);
        }

        if doc.len() >= limit {
            debug!("response from {} truncated at {} bytes", host, limit);
        }
        Ok(doc)
    }

    /// Wait for buffered data; an empty slice means end of stream.
    async fn fill<'a>(&self, host: &str, reader: &'a mut Body<C::Stream>) -> Result<&'a [u8], FetchError> {
        match timeout(self.timeout, reader.fill_buf()).await {
            Ok(Ok(buf)) => Ok(buf),
            Ok(Err(source)) => Err(FetchError::Io { host: host.to_owned(), source }),
            Err(_) => Err(FetchError::Timeout { host: host.to_owned() }),
        }
    }

    async fn skip_to_json(&self, host: &str, reader: &mut Body<C::Stream>) -> Result<(), FetchError> {
        loop {
            let (start, len) = {
                let buf = self.fill(host, reader).await?;
                (buf.iter().position(|&b| b == b'{' || b == b'['), buf.len())
            };
            if len == 0 {
                return Err(FetchError::UnexpectedEof { host: host.to_owned() });
            }
            match start {
                Some(pos) => {
                    reader.consume(pos);
                    return Ok(());
                }
                None => reader.consume(len),
            }
        }
    }

    async fn skip_headers(&self, host: &str, reader: &mut Body<C::Stream>) -> Result<(), FetchError> {
        const TERMINATOR: &[u8] = b"\r\n\r\n";
        let mut matched = 0;

        loop {
            let consumed = {
                let buf = self.fill(host, reader).await?;
                if buf.is_empty() {
                    return Err(FetchError::UnexpectedEof { host: host.to_owned() });
                }
                let mut consumed = 0;
                for &b in buf {
                    consumed += 1;
                    matched = if b == TERMINATOR[matched] {
                        matched + 1
                    } else if b == TERMINATOR[0] {
                        1
                    } else {
                        0
                    };
                    if matched == TERMINATOR.len() {
                        break;
                    }
                }
                consumed
            };
            reader.consume(consumed);
            if matched == TERMINATOR.len() {
                return Ok(());
            }
        }
    }
}

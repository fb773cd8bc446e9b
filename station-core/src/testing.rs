//! Scripted transport for exercising the fetcher and providers without a network.

use std::{
    collections::VecDeque,
    io,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::http::Connector;

/// Bytes handed out per read, small enough to split headers and bodies across reads.
const READ_CHUNK: usize = 7;

#[derive(Debug, Clone)]
enum Script {
    Refuse,
    Respond(Vec<u8>),
    Silent,
}

#[derive(Debug, Default)]
struct Shared {
    scripts: VecDeque<Script>,
    hosts: Vec<(String, u16)>,
    requests: Vec<Arc<Mutex<Vec<u8>>>>,
}

/// Each `connect` consumes the next scripted exchange, in order.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedConnector {
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(self, script: Script) -> Self {
        self.shared.lock().unwrap().scripts.push_back(script);
        self
    }

    pub(crate) fn respond(self, response: impl AsRef<[u8]>) -> Self {
        self.push(Script::Respond(response.as_ref().to_vec()))
    }

    /// Respond with a 200 status line, a JSON content type and `body`.
    pub(crate) fn respond_json(self, body: &str) -> Self {
        self.respond(format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json; charset=utf-8\r\nConnection: close\r\n\r\n{body}"
        ))
    }

    pub(crate) fn refuse(self) -> Self {
        self.push(Script::Refuse)
    }

    /// Accept the connection but never send a byte.
    pub(crate) fn silent(self) -> Self {
        self.push(Script::Silent)
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.shared
            .lock()
            .unwrap()
            .requests
            .iter()
            .map(|r| String::from_utf8_lossy(&r.lock().unwrap()).into_owned())
            .collect()
    }

    pub(crate) fn hosts(&self) -> Vec<(String, u16)> {
        self.shared.lock().unwrap().hosts.clone()
    }

    pub(crate) fn connections(&self) -> usize {
        self.shared.lock().unwrap().hosts.len()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Stream = ScriptedStream;

    async fn connect(&self, host: &str, port: u16) -> io::Result<ScriptedStream> {
        let mut shared = self.shared.lock().unwrap();
        shared.hosts.push((host.to_owned(), port));

        let script = shared.scripts.pop_front().unwrap_or(Script::Refuse);
        let written = Arc::new(Mutex::new(Vec::new()));

        match script {
            Script::Refuse => Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused")),
            Script::Respond(input) => {
                shared.requests.push(written.clone());
                Ok(ScriptedStream { input, pos: 0, silent: false, written })
            }
            Script::Silent => {
                shared.requests.push(written.clone());
                Ok(ScriptedStream { input: Vec::new(), pos: 0, silent: true, written })
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct ScriptedStream {
    input: Vec<u8>,
    pos: usize,
    silent: bool,
    written: Arc<Mutex<Vec<u8>>>,
}

impl AsyncRead for ScriptedStream {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        if self.silent {
            return Poll::Pending;
        }
        let this = &mut *self;
        let remaining = &this.input[this.pos..];
        let n = remaining.len().min(buf.remaining()).min(READ_CHUNK);
        buf.put_slice(&remaining[..n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for ScriptedStream {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

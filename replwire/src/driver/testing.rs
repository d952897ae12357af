//! Scripted stand-in for the MicroPython REPL, for tests.
//!
//! Speaks the same byte protocol as the unix port: banner and prompt,
//! paste mode with `=== ` echo, Ctrl-D to run, Ctrl-C to interrupt.
//! Scripts are answered from a lookup table instead of being evaluated.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf, duplex, split};

use crate::error::{Result, TransportError};
use crate::platform::helpers::{
    CAPABILITY_PROBE_SCRIPT, FALLBACK_OS_SCRIPT, HELPER_SCRIPT, NATIVE_OS_SCRIPT,
};
use crate::platform::micropython::{EOT, INTERRUPT, PASTE_MODE_CMD, SCRIPT_SENTINEL};
use crate::transport::{Connector, StreamConnection};

pub(crate) type FakeConnection = StreamConnection<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

pub(crate) const BANNER: &str = "MicroPython v1.22.0 on 2024-01-01; linux [GCC 12.2.0] version\n\
Use Ctrl-D to exit, Ctrl-E for paste mode\n";

const PASTE_BANNER: &[u8] = b"\npaste mode; Ctrl-C to cancel, Ctrl-D to finish\n=== ";
const PROMPT: &[u8] = b">>> ";
const INTERRUPTED: &[u8] = b"Traceback (most recent call last):\n  File \"<stdin>\", line 1, in <module>\nKeyboardInterrupt: \n";

#[derive(Debug, Clone)]
enum Reply {
    Output(String),
    /// Print this, then hang until interrupted.
    Block(String),
}

/// What the fake REPL observed.
#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub args: Vec<String>,
    pub executed: Vec<String>,
    pub interrupts: usize,
    pub stdin: Vec<u8>,
}

/// Shared view of a running fake REPL.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeReplHandle {
    state: Arc<Mutex<FakeState>>,
}

impl FakeReplHandle {
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn interrupts(&self) -> usize {
        self.state.lock().unwrap().interrupts
    }

    pub fn args(&self) -> Vec<String> {
        self.state.lock().unwrap().args.clone()
    }

    pub fn stdin(&self) -> Vec<u8> {
        self.state.lock().unwrap().stdin.clone()
    }
}

#[derive(Debug, Clone)]
enum Mode {
    Normal,
    Paste(Vec<u8>),
    Blocked,
}

/// Configuration of a fake REPL.
#[derive(Debug, Clone)]
pub(crate) struct FakeRepl {
    banner: bool,
    paste_mode: bool,
    exit_on_paste: bool,
    os_capability: &'static str,
    replies: Vec<(String, Reply)>,
    byte_delay: Option<Duration>,
    missing: bool,
}

impl FakeRepl {
    pub fn new() -> Self {
        Self {
            banner: true,
            paste_mode: true,
            exit_on_paste: false,
            os_capability: "native",
            replies: Vec::new(),
            byte_delay: None,
            missing: false,
        }
    }

    /// Fail to start, as if the executable did not exist.
    pub fn missing(mut self) -> Self {
        self.missing = true;
        self
    }

    /// Start idle, as if the banner had already been read.
    pub fn skip_banner(mut self) -> Self {
        self.banner = false;
        self
    }

    /// Ignore Ctrl-E.
    pub fn without_paste_mode(mut self) -> Self {
        self.paste_mode = false;
        self
    }

    /// Exit as soon as Ctrl-E arrives.
    pub fn exit_on_paste(mut self) -> Self {
        self.exit_on_paste = true;
        self
    }

    /// Answer the capability probe with `fallback`.
    pub fn without_native_os(mut self) -> Self {
        self.os_capability = "fallback";
        self
    }

    /// Answer the capability probe with garbage.
    pub fn broken_probe(mut self) -> Self {
        self.os_capability = "Traceback: NameError";
        self
    }

    /// Print `output` when `script` (without sentinel) runs.
    pub fn respond(mut self, script: &str, output: &str) -> Self {
        self.replies
            .push((script.to_string(), Reply::Output(output.to_string())));
        self
    }

    /// Print `output` when `script` runs, then hang until interrupted.
    pub fn respond_blocking(mut self, script: &str, output: &str) -> Self {
        self.replies
            .push((script.to_string(), Reply::Block(output.to_string())));
        self
    }

    /// Deliver execution output and prompts one byte at a time.
    pub fn byte_delay(mut self, delay: Duration) -> Self {
        self.byte_delay = Some(delay);
        self
    }

    fn reply_for(&self, script: &str) -> Reply {
        if let Some((_, reply)) = self.replies.iter().find(|(s, _)| s == script) {
            return reply.clone();
        }
        let output = match script {
            HELPER_SCRIPT | NATIVE_OS_SCRIPT | FALLBACK_OS_SCRIPT => String::new(),
            CAPABILITY_PROBE_SCRIPT => format!("{}\n", self.os_capability),
            "print(1+1)" => "2\n".to_string(),
            _ => String::new(),
        };
        Reply::Output(output)
    }

    async fn send(&self, stream: &mut DuplexStream, data: &[u8]) -> std::io::Result<()> {
        match self.byte_delay {
            Some(delay) => {
                for byte in data {
                    tokio::time::sleep(delay).await;
                    stream.write_all(&[*byte]).await?;
                }
                Ok(())
            }
            None => stream.write_all(data).await,
        }
    }

    async fn serve(self, mut stream: DuplexStream, handle: FakeReplHandle) {
        let extra_args: Vec<String> = handle
            .args()
            .into_iter()
            .filter(|a| a != "-i")
            .collect();
        if !extra_args.is_empty() {
            let line = format!("ran {}\n", extra_args.join(" "));
            if stream.write_all(line.as_bytes()).await.is_err() {
                return;
            }
        }
        if self.banner {
            let greeting = [BANNER.as_bytes(), PROMPT].concat();
            if stream.write_all(&greeting).await.is_err() {
                return;
            }
        }

        let mut mode = Mode::Normal;
        let mut buf = [0u8; 1024];
        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            for &byte in &buf[..n] {
                mode = match self.handle(byte, mode, &mut stream, &handle).await {
                    Ok(Some(mode)) => mode,
                    _ => return,
                };
            }
        }
    }

    async fn handle(
        &self,
        byte: u8,
        mode: Mode,
        stream: &mut DuplexStream,
        handle: &FakeReplHandle,
    ) -> std::io::Result<Option<Mode>> {
        let next = match mode {
            Mode::Normal => match byte {
                PASTE_MODE_CMD if self.exit_on_paste => return Ok(None),
                PASTE_MODE_CMD if self.paste_mode => {
                    stream.write_all(PASTE_BANNER).await?;
                    Mode::Paste(Vec::new())
                }
                PASTE_MODE_CMD => Mode::Normal,
                INTERRUPT => {
                    handle.state.lock().unwrap().interrupts += 1;
                    stream.write_all(b"\n>>> ").await?;
                    Mode::Normal
                }
                EOT => return Ok(None),
                b'\n' => {
                    stream.write_all(b"\n>>> ").await?;
                    Mode::Normal
                }
                other => {
                    stream.write_all(&[other]).await?;
                    Mode::Normal
                }
            },
            Mode::Paste(mut script) => match byte {
                INTERRUPT => {
                    stream.write_all(b"\n>>> ").await?;
                    Mode::Normal
                }
                EOT => {
                    stream.write_all(b"\n").await?;
                    self.execute(&script, stream, handle).await?
                }
                b'\n' => {
                    script.push(byte);
                    stream.write_all(b"\n=== ").await?;
                    Mode::Paste(script)
                }
                other => {
                    script.push(other);
                    stream.write_all(&[other]).await?;
                    Mode::Paste(script)
                }
            },
            Mode::Blocked => match byte {
                INTERRUPT => {
                    handle.state.lock().unwrap().interrupts += 1;
                    self.send(stream, &[INTERRUPTED, PROMPT].concat()).await?;
                    Mode::Normal
                }
                other => {
                    handle.state.lock().unwrap().stdin.push(other);
                    Mode::Blocked
                }
            },
        };
        Ok(Some(next))
    }

    async fn execute(
        &self,
        script: &[u8],
        stream: &mut DuplexStream,
        handle: &FakeReplHandle,
    ) -> std::io::Result<Mode> {
        let script = String::from_utf8_lossy(script).into_owned();
        handle.state.lock().unwrap().executed.push(script.clone());

        let sentinel = String::from_utf8_lossy(SCRIPT_SENTINEL);
        let key = script.strip_suffix(sentinel.as_ref()).unwrap_or(&script);

        match self.reply_for(key) {
            Reply::Output(output) => {
                self.send(stream, &[output.as_bytes(), PROMPT].concat()).await?;
                Ok(Mode::Normal)
            }
            Reply::Block(output) => {
                self.send(stream, output.as_bytes()).await?;
                Ok(Mode::Blocked)
            }
        }
    }
}

/// Start a fake REPL and connect to it.
pub(crate) fn fake_connection(repl: FakeRepl) -> (FakeConnection, FakeReplHandle) {
    start(repl, Vec::new())
}

fn start(repl: FakeRepl, args: Vec<String>) -> (FakeConnection, FakeReplHandle) {
    let (ours, theirs) = duplex(64 * 1024);
    let handle = FakeReplHandle::default();
    handle.state.lock().unwrap().args = args;
    tokio::spawn(repl.serve(theirs, handle.clone()));

    let (reader, writer) = split(ours);
    (StreamConnection::new(reader, writer), handle)
}

/// Connector that starts a new fake REPL on every connect.
#[derive(Debug, Clone)]
pub(crate) struct FakeConnector {
    repl: FakeRepl,
    started: Arc<Mutex<Vec<FakeReplHandle>>>,
}

impl FakeConnector {
    pub fn new(repl: FakeRepl) -> Self {
        Self {
            repl,
            started: Arc::default(),
        }
    }

    /// Handles of every REPL started so far, oldest first.
    pub fn started(&self) -> Vec<FakeReplHandle> {
        self.started.lock().unwrap().clone()
    }

    pub fn latest(&self) -> FakeReplHandle {
        self.started().last().cloned().unwrap()
    }
}

impl Connector for FakeConnector {
    type Connection = FakeConnection;

    async fn connect(&self, args: &[String]) -> Result<FakeConnection> {
        if self.repl.missing {
            return Err(TransportError::SpawnFailed {
                program: "micropython".to_string(),
                source: std::io::ErrorKind::NotFound.into(),
            }
            .into());
        }
        let (conn, handle) = start(self.repl.clone(), args.to_vec());
        self.started.lock().unwrap().push(handle);
        Ok(conn)
    }
}

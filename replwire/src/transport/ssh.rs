//! Remote interpreter over SSH using russh.
//!
//! The interpreter is started with an `exec` request on a session channel,
//! so no PTY is involved and the byte stream is exactly what the
//! interpreter writes.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use regex::bytes::Regex;
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::ChannelStream;
use secrecy::ExposeSecret;
use tokio::io::{ReadHalf, WriteHalf};

use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use super::{Connection, Connector, StreamConnection};
use crate::error::{Result, TransportError};

type ChannelHalves = StreamConnection<ReadHalf<ChannelStream<Msg>>, WriteHalf<ChannelStream<Msg>>>;

/// Starts the interpreter on a remote host.
#[derive(Debug, Clone)]
pub struct SshConnector {
    config: SshConfig,
    command: String,
}

impl SshConnector {
    /// Create a connector that runs `command` (e.g. `micropython`) remotely.
    pub fn new(config: SshConfig, command: impl Into<String>) -> Self {
        Self {
            config,
            command: command.into(),
        }
    }

    /// The SSH configuration.
    pub fn config(&self) -> &SshConfig {
        &self.config
    }
}

impl Connector for SshConnector {
    type Connection = SshConnection;

    async fn connect(&self, args: &[String]) -> Result<SshConnection> {
        SshConnection::open(self.config.clone(), &command_line(&self.command, args)).await
    }
}

/// Connection to an interpreter running behind an SSH exec channel.
pub struct SshConnection {
    /// Keeps the SSH session alive for as long as the channel is used.
    session: Handle<SshHandler>,
    stream: ChannelHalves,
}

impl SshConnection {
    /// Connect, authenticate and exec `command_line`.
    pub async fn open(config: SshConfig, command_line: &str) -> Result<Self> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: None,
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("connecting to {}", config.socket_addr());
        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| {
            // Prefer the detailed host key error over russh's generic one
            let stored = host_key_error.lock().ok().and_then(|mut slot| slot.take());
            stored.unwrap_or(TransportError::Ssh(e))
        })?;

        Self::authenticate(&mut session, &config).await?;

        let channel = session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        debug!("exec {:?}", command_line);
        channel
            .exec(true, command_line)
            .await
            .map_err(TransportError::Ssh)?;

        let (reader, writer) = tokio::io::split(channel.into_stream());

        Ok(Self {
            session,
            stream: StreamConnection::new(reader, writer),
        })
    }

    /// Authenticate with the server.
    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        let success = match &config.auth {
            AuthMethod::None => session
                .authenticate_none(&config.username)
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::Password(password) => session
                .authenticate_password(&config.username, password.expose_secret())
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                // Get the best RSA hash algorithm supported by the server
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();

                session
                    .authenticate_publickey(
                        &config.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(TransportError::Ssh)?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }
}

impl fmt::Debug for SshConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshConnection")
            .field("session_closed", &self.session.is_closed())
            .field("connected", &self.stream.is_connected())
            .finish_non_exhaustive()
    }
}

impl Connection for SshConnection {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write(data).await
    }

    async fn read_until(&mut self, terminator: &[u8], timeout: Option<Duration>) -> Result<Vec<u8>> {
        self.stream.read_until(terminator, timeout).await
    }

    async fn soft_read_until(&mut self, closers: &Regex, timeout: Duration) -> Result<Vec<u8>> {
        self.stream.soft_read_until(closers, timeout).await
    }

    async fn soft_read(&mut self, size: usize, timeout: Duration) -> Result<Vec<u8>> {
        self.stream.soft_read(size, timeout).await
    }

    async fn read_all(&mut self) -> Result<Vec<u8>> {
        self.stream.read_all().await
    }

    async fn close(&mut self) -> Result<()> {
        let shutdown = self.stream.close().await;
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        shutdown
    }

    fn is_connected(&self) -> bool {
        self.stream.is_connected() && !self.session.is_closed()
    }
}

/// Join the command and its arguments into a POSIX shell command line.
fn command_line(command: &str, args: &[String]) -> String {
    std::iter::once(command.to_string())
        .chain(args.iter().map(|arg| shell_quote(arg)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote an argument for a POSIX shell, leaving simple words alone.
fn shell_quote(arg: &str) -> String {
    let simple = !arg.is_empty()
        && arg
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./=:@%+,".contains(&b));
    if simple {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> std::result::Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> std::result::Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    /// Remember why the key was rejected and reject it.
    fn reject(&self, error: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(error);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let accepted = match self.host_key_verification {
            HostKeyVerification::Disabled => true,

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key: {}", e);
                    }
                    true
                }
                Err(e) => self.reject(e),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                }),
                Err(e) => self.reject(e),
            },
        };

        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_quoting() {
        let args = vec![
            "-i".to_string(),
            "main.py".to_string(),
            "two words".to_string(),
            "it's".to_string(),
            String::new(),
        ];
        assert_eq!(
            command_line("micropython", &args),
            r"micropython -i main.py 'two words' 'it'\''s' ''"
        );
    }

    #[test]
    fn test_shell_quote_plain_words() {
        assert_eq!(shell_quote("/tmp/x.py"), "/tmp/x.py");
        assert_eq!(shell_quote("--flag=1"), "--flag=1");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
    }
}

//! Turns an [`FtpConfig`] into one connect call and defines the seam between
//! the dispatcher and the FTP session it drives.

use std::io::Read;
use std::time::Duration;

use serde::Serialize;

use crate::bridge::ChunkSink;
use crate::config::FtpConfig;
use crate::ftp::FtpStream;
use crate::listing::DirectoryEntry;
use crate::pem;
use crate::types::{Reply, Result};

pub const DEFAULT_PORT: u16 = 21;
pub const DEFAULT_IMPLICIT_PORT: u16 = 990;

/// How TLS is applied to the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TlsMode {
    Plain,
    /// Plain connect, then `AUTH TLS`.
    Explicit,
    /// TLS from the first byte.
    Implicit,
}

/// TLS parameters. Absent material means "use the defaults".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub reject_unauthorized: bool,
}

/// Parameters of the single connect call made per batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOptions {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub secure: TlsMode,
    pub secure_options: TlsOptions,
    pub verbose: bool,
    #[serde(skip)]
    pub timeout: Duration,
}

impl ConnectOptions {
    pub fn from_config(config: &FtpConfig) -> Result<ConnectOptions> {
        config.validate()?;

        let secure = match (config.secure, config.implicit_tls) {
            (false, _) => TlsMode::Plain,
            (true, false) => TlsMode::Explicit,
            (true, true) => TlsMode::Implicit,
        };

        Ok(ConnectOptions {
            host: config.host.trim().to_owned(),
            port: config.port.filter(|&p| p != 0),
            user: config.user.clone(),
            password: config.password.clone().unwrap_or_default(),
            secure,
            secure_options: TlsOptions {
                cert: non_empty_pem(config.certificate.as_deref()),
                key: non_empty_pem(config.private_key.as_deref()),
                reject_unauthorized: !config.ignore_tls_issues,
            },
            verbose: config.verbose,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        })
    }

    /// The port actually dialled.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(match self.secure {
            TlsMode::Implicit => DEFAULT_IMPLICIT_PORT,
            _ => DEFAULT_PORT,
        })
    }
}

fn non_empty_pem(text: Option<&str>) -> Option<String> {
    pem::normalize_opt(text).filter(|t| !t.trim().is_empty())
}

/// An authenticated session able to run the remote operations of a batch.
///
/// Calls are strictly sequential: the control channel is stateful.
pub trait Connection {
    /// Entries of `path`, in the order the server reported them.
    fn list(&mut self, path: &str) -> Result<Vec<DirectoryEntry>>;
    fn remove(&mut self, path: &str) -> Result<Reply>;
    /// Remove a directory and everything below it.
    fn remove_dir(&mut self, path: &str) -> Result<()>;
    /// Make sure every directory of `path` exists and enter it.
    fn ensure_dir(&mut self, path: &str) -> Result<()>;
    fn download_to(&mut self, sink: &mut dyn ChunkSink, path: &str) -> Result<Reply>;
    fn upload_from(&mut self, source: &mut dyn Read, path: &str) -> Result<Reply>;
    /// Release the session. Never fails; calling it twice is harmless.
    fn close(&mut self);
}

/// Opens sessions.
pub trait Connector {
    type Connection: Connection;

    /// Connect and authenticate.
    fn access(&self, options: &ConnectOptions) -> Result<Self::Connection>;
}

/// Connector for real FTP/FTPS servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct FtpConnector;

impl Connector for FtpConnector {
    type Connection = FtpStream;

    fn access(&self, options: &ConnectOptions) -> Result<FtpStream> {
        FtpStream::access(options)
    }
}

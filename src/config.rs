//! Resolved connection credentials.

use serde::Deserialize;

use crate::types::{FtpError, Result};

fn default_user() -> String {
    "anonymous".to_owned()
}

fn default_timeout() -> u64 {
    30
}

/// Credentials and connection settings for one batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpConfig {
    pub host: String,
    /// `None` or `0` selects the protocol default.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    /// PEM private key for client authentication.
    #[serde(default)]
    pub private_key: Option<String>,
    /// PEM client certificate (chain).
    #[serde(default)]
    pub certificate: Option<String>,
    /// Use FTPS.
    #[serde(default)]
    pub secure: bool,
    /// With `secure`: TLS from the first byte instead of `AUTH TLS`.
    #[serde(default)]
    pub implicit_tls: bool,
    #[serde(default)]
    pub ignore_tls_issues: bool,
    /// Log every command and reply.
    #[serde(default)]
    pub verbose: bool,
    /// Connect and socket read/write timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl FtpConfig {
    pub fn new<H: Into<String>>(host: H) -> FtpConfig {
        FtpConfig {
            host: host.into(),
            port: None,
            user: default_user(),
            password: None,
            private_key: None,
            certificate: None,
            secure: false,
            implicit_tls: false,
            ignore_tls_issues: false,
            verbose: false,
            timeout_secs: default_timeout(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(FtpError::InvalidConfig("host is required".to_owned()));
        }
        if self.password.is_none() {
            return Err(FtpError::InvalidConfig("password is required".to_owned()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_minimal_json() {
        let config: FtpConfig =
            serde_json::from_str(r#"{ "host": "ftp.example.com", "password": "secret" }"#).unwrap();
        assert_eq!(config.user, "anonymous");
        assert_eq!(config.port, None);
        assert!(!config.secure);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn camel_case_fields() {
        let config: FtpConfig = serde_json::from_str(
            r#"{
                "host": "h", "port": 2121, "user": "u", "password": "p",
                "secure": true, "implicitTls": true, "ignoreTlsIssues": true,
                "privateKey": "KEY", "certificate": "CERT", "verbose": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.port, Some(2121));
        assert!(config.implicit_tls && config.ignore_tls_issues && config.verbose);
        assert_eq!(config.private_key.as_deref(), Some("KEY"));
    }

    #[test]
    fn host_and_password_required() {
        let mut config = FtpConfig::new(" ");
        config.password = Some("p".to_owned());
        assert!(config.validate().is_err());

        let config = FtpConfig::new("h");
        match config.validate() {
            Err(FtpError::InvalidConfig(msg)) => assert!(msg.contains("password")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}

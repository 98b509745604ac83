//! Connect-and-close check for a set of credentials.

use serde::Serialize;
use tracing::info;

use crate::config::FtpConfig;
use crate::dispatcher::SessionGuard;
use crate::session::{ConnectOptions, Connector};
use crate::types::FtpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckStatus {
    #[serde(rename = "OK")]
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialCheck {
    pub status: CheckStatus,
    pub message: String,
}

impl CredentialCheck {
    pub fn is_ok(&self) -> bool {
        self.status == CheckStatus::Ok
    }
}

/// Open a session with `config` and close it again.
pub fn test_credentials<C: Connector>(connector: &C, config: &FtpConfig) -> CredentialCheck {
    let session = ConnectOptions::from_config(config)
        .and_then(|options| connector.access(&options))
        .map(SessionGuard::new);

    match session {
        Ok(session) => {
            session.finish();
            info!(host = %config.host, "credentials accepted");
            CredentialCheck {
                status: CheckStatus::Ok,
                message: "Connection successful!".to_owned(),
            }
        }
        Err(err) => {
            info!(host = %config.host, error = %err, "credentials rejected");
            CredentialCheck {
                status: CheckStatus::Error,
                message: failure_message(&err),
            }
        }
    }
}

/// Server refusals are rendered as their JSON form, everything else by its message.
fn failure_message(err: &FtpError) -> String {
    let detail = match *err.root() {
        FtpError::UnexpectedReply(ref reply) => {
            return match serde_json::to_string(reply) {
                Ok(json) => format!("Auth failed: {}", json),
                Err(_) => "Auth failed".to_owned(),
            };
        }
        FtpError::SecureError(ref desc)
        | FtpError::InvalidResponse(ref desc)
        | FtpError::InvalidConfig(ref desc) => desc.clone(),
        ref other => other.to_string(),
    };
    if detail.trim().is_empty() {
        "Auth failed".to_owned()
    } else {
        detail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Reply;
    use std::io;

    #[test]
    fn refusal_is_rendered_as_json() {
        let err = FtpError::UnexpectedReply(Reply::new(530, "Login incorrect."));
        assert_eq!(
            failure_message(&err),
            r#"Auth failed: {"code":530,"message":"Login incorrect."}"#
        );
    }

    #[test]
    fn other_failures_use_their_message() {
        let err = FtpError::ConnectionError(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(failure_message(&err), "FTP ConnectionError: refused");
    }

    #[test]
    fn details_without_prefix() {
        let err = FtpError::SecureError("certificate verify failed".to_owned());
        assert_eq!(failure_message(&err), "certificate verify failed");
    }

    #[test]
    fn empty_detail_becomes_generic() {
        assert_eq!(failure_message(&FtpError::SecureError(String::new())), "Auth failed");
        assert_eq!(failure_message(&FtpError::InvalidResponse(" ".to_owned())), "Auth failed");
    }
}

//! Error and reply types shared by the whole crate.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::params::OperationKind;

/// A shorthand for a Result whose error type is always an FtpError.
pub type Result<T> = ::std::result::Result<T, FtpError>;

/// `FtpError` is a library-global error type to describe the different kinds of
/// errors that might occur while running a batch.
#[derive(Debug)]
pub enum FtpError {
    ConnectionError(::std::io::Error),
    SecureError(String),
    InvalidResponse(String),
    /// The server answered, but not with one of the codes we expected.
    UnexpectedReply(Reply),
    InvalidConfig(String),
    MissingParameter(String),
    MissingBinary { property: String },
    /// A record failed while isolation was disabled; carries where it happened.
    Record {
        operation: OperationKind,
        index: usize,
        source: Box<FtpError>,
    },
}

/// A complete (possibly multi-line) server reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub code: u32,
    pub message: String,
}

impl Reply {
    pub fn new<S: Into<String>>(code: u32, message: S) -> Reply {
        Reply {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message)
    }
}

impl FtpError {
    /// The innermost error, looking through `Record` wrappers.
    pub fn root(&self) -> &FtpError {
        match *self {
            FtpError::Record { ref source, .. } => source.root(),
            ref other => other,
        }
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FtpError::ConnectionError(ref ioerr) => write!(f, "FTP ConnectionError: {}", ioerr),
            FtpError::SecureError(ref desc) => write!(f, "FTP SecureError: {}", desc),
            FtpError::InvalidResponse(ref desc) => write!(f, "FTP InvalidResponse: {}", desc),
            FtpError::UnexpectedReply(ref reply) => write!(f, "{}", reply),
            FtpError::InvalidConfig(ref desc) => write!(f, "Invalid configuration: {}", desc),
            FtpError::MissingParameter(ref name) => {
                write!(f, "Could not resolve parameter \"{}\"", name)
            }
            FtpError::MissingBinary { ref property } => {
                write!(f, "No binary data property \"{}\" exists on item!", property)
            }
            FtpError::Record {
                operation,
                index,
                ref source,
            } => write!(f, "{} failed on item {}: {}", operation, index, source),
        }
    }
}

impl ::std::error::Error for FtpError {
    fn source(&self) -> Option<&(dyn ::std::error::Error + 'static)> {
        match *self {
            FtpError::ConnectionError(ref ioerr) => Some(ioerr),
            FtpError::Record { ref source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<::std::io::Error> for FtpError {
    fn from(err: ::std::io::Error) -> FtpError {
        FtpError::ConnectionError(err)
    }
}

impl From<openssl::error::ErrorStack> for FtpError {
    fn from(err: openssl::error::ErrorStack) -> FtpError {
        FtpError::SecureError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_reply_displays_code_and_text() {
        let err = FtpError::UnexpectedReply(Reply::new(550, "No such file or directory"));
        assert_eq!(err.to_string(), "550 No such file or directory");
    }

    #[test]
    fn record_error_names_operation_and_index() {
        let err = FtpError::Record {
            operation: OperationKind::Delete,
            index: 3,
            source: Box::new(FtpError::UnexpectedReply(Reply::new(550, "denied"))),
        };
        assert_eq!(err.to_string(), "delete failed on item 3: 550 denied");
        match *err.root() {
            FtpError::UnexpectedReply(ref reply) => assert_eq!(reply.code, 550),
            ref other => panic!("unexpected root: {:?}", other),
        }
    }
}

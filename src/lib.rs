#![crate_name = "ftp_batch"]
#![crate_type = "lib"]

//! ftp_batch runs one FTP/FTPS operation per input record over a single
//! authenticated session.
//!
//! ### Usage
//!
//! ```rust,no_run
//! use ftp_batch::{dispatcher, FailurePolicy, FtpConfig, FtpConnector, Item, NodeParameters, OperationKind};
//!
//! let mut config = FtpConfig::new("127.0.0.1");
//! config.user = "Doe".to_owned();
//! config.password = Some("mumble".to_owned());
//!
//! let params = NodeParameters::new(OperationKind::List).folder_path("/{{ dir }}");
//! let items: Vec<Item> = serde_json::from_str(r#"[{ "json": { "dir": "pub" } }]"#).unwrap();
//!
//! let output = dispatcher::execute(&FtpConnector, &config, &params, items, FailurePolicy::Isolate)
//!     .unwrap_or_else(|err| panic!("{}", err));
//! println!("{}", serde_json::to_string_pretty(&output).unwrap());
//! ```
//!

#[macro_use]
extern crate lazy_static;

mod data_stream;
mod ftp;
pub mod bridge;
pub mod config;
pub mod dispatcher;
pub mod item;
pub mod job;
pub mod listing;
pub mod params;
pub mod pem;
pub mod probe;
pub mod session;
pub mod status;
pub mod types;

pub use self::config::FtpConfig;
pub use self::dispatcher::{execute, execute_into, FailurePolicy};
pub use self::ftp::FtpStream;
pub use self::item::{BinaryData, Item};
pub use self::job::Job;
pub use self::listing::{DirectoryEntry, EntryKind};
pub use self::params::{NodeParameters, OperationKind, OperationRequest, ParameterSource};
pub use self::probe::{test_credentials, CheckStatus, CredentialCheck};
pub use self::session::{ConnectOptions, Connection, Connector, FtpConnector, TlsMode, TlsOptions};
pub use self::types::{FtpError, Reply, Result};

//! Operation selection and per-record parameter resolution.

use std::fmt;
use std::str::FromStr;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::item::Item;
use crate::types::{FtpError, Result};

pub const PATH: &str = "path";
pub const FOLDER_PATH: &str = "folderPath";
pub const BINARY_PROPERTY: &str = "binaryPropertyName";

lazy_static! {
    // {{ field.sub }} or {{ $json.field }}; {{ $index }} is the record position.
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{\{\s*([$\w][\w.$-]*)\s*\}\}").unwrap();
}

/// The remote action a batch performs on every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Delete,
    Download,
    List,
    #[serde(rename = "mkdir")]
    MakeDir,
    #[serde(rename = "rmdir")]
    RemoveDir,
    Upload,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match *self {
            OperationKind::Delete => "delete",
            OperationKind::Download => "download",
            OperationKind::List => "list",
            OperationKind::MakeDir => "mkdir",
            OperationKind::RemoveDir => "rmdir",
            OperationKind::Upload => "upload",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = FtpError;

    fn from_str(s: &str) -> Result<OperationKind> {
        match s {
            "delete" => Ok(OperationKind::Delete),
            "download" => Ok(OperationKind::Download),
            "list" => Ok(OperationKind::List),
            "mkdir" => Ok(OperationKind::MakeDir),
            "rmdir" => Ok(OperationKind::RemoveDir),
            "upload" => Ok(OperationKind::Upload),
            other => Err(FtpError::InvalidConfig(format!(
                "The operation \"{}\" is not supported!",
                other
            ))),
        }
    }
}

/// One unit of work, resolved from one input record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    Delete { path: String },
    Download { path: String, binary_property: String },
    List { folder_path: String },
    MakeDir { folder_path: String },
    RemoveDir { folder_path: String },
    Upload { path: String, binary_property: String },
}

impl OperationRequest {
    /// Resolve the parameters `kind` needs against record `index`.
    pub fn resolve<P: ParameterSource + ?Sized>(
        kind: OperationKind,
        params: &P,
        item: &Item,
        index: usize,
    ) -> Result<OperationRequest> {
        let get = |name: &str| params.resolve(name, item, index);
        Ok(match kind {
            OperationKind::Delete => OperationRequest::Delete { path: get(PATH)? },
            OperationKind::Download => OperationRequest::Download {
                path: get(PATH)?,
                binary_property: get(BINARY_PROPERTY)?,
            },
            OperationKind::List => OperationRequest::List {
                folder_path: get(FOLDER_PATH)?,
            },
            OperationKind::MakeDir => OperationRequest::MakeDir {
                folder_path: get(FOLDER_PATH)?,
            },
            OperationKind::RemoveDir => OperationRequest::RemoveDir {
                folder_path: get(FOLDER_PATH)?,
            },
            OperationKind::Upload => OperationRequest::Upload {
                path: get(PATH)?,
                binary_property: get(BINARY_PROPERTY)?,
            },
        })
    }

    pub fn kind(&self) -> OperationKind {
        match *self {
            OperationRequest::Delete { .. } => OperationKind::Delete,
            OperationRequest::Download { .. } => OperationKind::Download,
            OperationRequest::List { .. } => OperationKind::List,
            OperationRequest::MakeDir { .. } => OperationKind::MakeDir,
            OperationRequest::RemoveDir { .. } => OperationKind::RemoveDir,
            OperationRequest::Upload { .. } => OperationKind::Upload,
        }
    }
}

/// Where the dispatcher reads its parameters from.
pub trait ParameterSource {
    /// The batch-wide operation. Read once per batch.
    fn operation(&self) -> Result<OperationKind>;

    /// Parameter `name` evaluated for record `index`.
    fn resolve(&self, name: &str, item: &Item, index: usize) -> Result<String>;
}

fn default_binary_property() -> String {
    "data".to_owned()
}

/// Parameters as written in a job file. Values may reference fields of
/// the current record with `{{ field.sub }}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeParameters {
    pub operation: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub folder_path: Option<String>,
    #[serde(default = "default_binary_property")]
    pub binary_property_name: String,
}

impl NodeParameters {
    pub fn new(operation: OperationKind) -> NodeParameters {
        NodeParameters {
            operation: operation.as_str().to_owned(),
            path: None,
            folder_path: None,
            binary_property_name: default_binary_property(),
        }
    }

    pub fn path<S: Into<String>>(mut self, path: S) -> NodeParameters {
        self.path = Some(path.into());
        self
    }

    pub fn folder_path<S: Into<String>>(mut self, folder_path: S) -> NodeParameters {
        self.folder_path = Some(folder_path.into());
        self
    }

    pub fn binary_property_name<S: Into<String>>(mut self, name: S) -> NodeParameters {
        self.binary_property_name = name.into();
        self
    }
}

impl ParameterSource for NodeParameters {
    fn operation(&self) -> Result<OperationKind> {
        self.operation.parse()
    }

    fn resolve(&self, name: &str, item: &Item, index: usize) -> Result<String> {
        let template = match name {
            PATH => self.path.as_deref(),
            FOLDER_PATH => self.folder_path.as_deref(),
            BINARY_PROPERTY => Some(self.binary_property_name.as_str()),
            _ => None,
        }
        .ok_or_else(|| FtpError::MissingParameter(name.to_owned()))?;
        render(template, &item.json, index)
    }
}

/// Substitute every placeholder in `template`.
pub fn render(template: &str, json: &Map<String, Value>, index: usize) -> Result<String> {
    let mut missing = None;
    let rendered = PLACEHOLDER_RE.replace_all(template, |caps: &Captures| {
        let expr = &caps[1];
        match lookup(expr, json, index) {
            Some(text) => text,
            None => {
                missing.get_or_insert_with(|| expr.to_owned());
                String::new()
            }
        }
    });
    match missing {
        Some(expr) => Err(FtpError::MissingParameter(expr)),
        None => Ok(rendered.into_owned()),
    }
}

fn lookup(expr: &str, json: &Map<String, Value>, index: usize) -> Option<String> {
    if expr == "$index" {
        return Some(index.to_string());
    }
    let expr = expr.strip_prefix("$json.").unwrap_or(expr);
    let mut segments = expr.split('.');
    let mut current = json.get(segments.next()?)?;
    for segment in segments {
        current = match *current {
            Value::Object(ref map) => map.get(segment)?,
            Value::Array(ref list) => list.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match *current {
        Value::Null => None,
        Value::String(ref s) => Some(s.clone()),
        ref other => Some(other.to_string()),
    }
}

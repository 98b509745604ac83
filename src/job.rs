//! Batch job files: credentials, parameters and the input records in one JSON document.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::config::FtpConfig;
use crate::item::Item;
use crate::params::NodeParameters;
use crate::types::{FtpError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub credentials: FtpConfig,
    #[serde(flatten)]
    pub parameters: NodeParameters,
    /// Record failures as error items instead of aborting the batch.
    #[serde(default)]
    pub continue_on_fail: bool,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Job {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Job> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FtpError::InvalidConfig(format!("cannot read job file {}: {}", path.display(), e))
        })?;
        Job::from_json(&content)
    }

    /// A job without items runs once, on an empty record.
    pub fn from_json(content: &str) -> Result<Job> {
        let mut job: Job = serde_json::from_str(content)
            .map_err(|e| FtpError::InvalidConfig(format!("invalid job: {}", e)))?;
        if job.items.is_empty() {
            job.items.push(Item::default());
        }
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const JOB: &str = r#"{
        "credentials": { "host": "ftp.example.com", "user": "u", "password": "p" },
        "operation": "list",
        "folderPath": "/{{ dir }}",
        "continueOnFail": true,
        "items": [ { "json": { "dir": "a" } }, { "json": { "dir": "b" } } ]
    }"#;

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(JOB.as_bytes()).unwrap();

        let job = Job::load(file.path()).unwrap();
        assert_eq!(job.credentials.host, "ftp.example.com");
        assert_eq!(job.parameters.operation, "list");
        assert_eq!(job.parameters.folder_path.as_deref(), Some("/{{ dir }}"));
        assert_eq!(job.parameters.binary_property_name, "data");
        assert!(job.continue_on_fail);
        assert_eq!(job.items.len(), 2);
    }

    #[test]
    fn no_items_means_one_empty_record() {
        let job = Job::from_json(
            r#"{ "credentials": { "host": "h", "password": "p" }, "operation": "mkdir", "folderPath": "/x" }"#,
        )
        .unwrap();
        assert_eq!(job.items, vec![Item::default()]);
        assert!(!job.continue_on_fail);
    }

    #[test]
    fn missing_file_is_reported() {
        match Job::load("/nonexistent/job.json") {
            Err(FtpError::InvalidConfig(msg)) => assert!(msg.contains("/nonexistent/job.json")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}

//! Runs the batch: one session, one operation per record, results in input order.

use std::io;

use tracing::{debug, info, warn};

use crate::bridge::{self, BufferSource};
use crate::config::FtpConfig;
use crate::item::{BinaryData, Item};
use crate::params::{OperationKind, OperationRequest, ParameterSource};
use crate::session::{ConnectOptions, Connection, Connector};
use crate::types::{FtpError, Result};

/// Owns a connection for one batch and closes it on every exit path.
pub struct SessionGuard<C: Connection> {
    conn: C,
    closed: bool,
}

impl<C: Connection> SessionGuard<C> {
    pub fn new(conn: C) -> SessionGuard<C> {
        SessionGuard {
            conn,
            closed: false,
        }
    }

    pub fn connection(&mut self) -> &mut C {
        &mut self.conn
    }

    /// Close now instead of at the end of the scope.
    pub fn finish(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.conn.close();
        }
    }
}

impl<C: Connection> Drop for SessionGuard<C> {
    fn drop(&mut self) {
        self.close();
    }
}

/// What a failing record does to the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failure and fail the batch.
    Abort,
    /// Emit `{ error, pairedItem }` for the record and go on.
    Isolate,
}

impl FailurePolicy {
    pub fn from_continue_on_fail(continue_on_fail: bool) -> FailurePolicy {
        if continue_on_fail {
            FailurePolicy::Isolate
        } else {
            FailurePolicy::Abort
        }
    }

    /// Fold one record's outcome into `output`. Only `Abort` returns an error.
    fn absorb(self, outcome: Result<Vec<Item>>, index: usize, output: &mut Vec<Item>) -> Result<()> {
        match (outcome, self) {
            (Ok(items), _) => {
                output.extend(items);
                Ok(())
            }
            (Err(err), FailurePolicy::Isolate) => {
                warn!(index, error = %err, "record failed");
                output.push(Item::error(err.to_string(), index));
                Ok(())
            }
            (Err(err), FailurePolicy::Abort) => Err(err),
        }
    }
}

/// Run the batch described by `params` over `items`.
///
/// The operation is read once; every other parameter is resolved per record.
/// Exactly one session is opened, and it is closed before this returns,
/// whether the loop ran to the end or was aborted. With
/// [`FailurePolicy::Abort`] the first failing record ends the batch with an
/// [`FtpError::Record`] naming the operation and the record position.
pub fn execute<C, P>(
    connector: &C,
    config: &FtpConfig,
    params: &P,
    items: Vec<Item>,
    policy: FailurePolicy,
) -> Result<Vec<Item>>
where
    C: Connector,
    P: ParameterSource + ?Sized,
{
    let mut output = Vec::with_capacity(items.len());
    execute_into(connector, config, params, items, policy, &mut output)?;
    Ok(output)
}

/// Like [`execute`], appending to `output`. After an abort `output` holds
/// exactly the records produced before the failing one.
pub fn execute_into<C, P>(
    connector: &C,
    config: &FtpConfig,
    params: &P,
    items: Vec<Item>,
    policy: FailurePolicy,
    output: &mut Vec<Item>,
) -> Result<()>
where
    C: Connector,
    P: ParameterSource + ?Sized,
{
    let kind = params.operation()?;
    let options = ConnectOptions::from_config(config)?;
    info!(operation = %kind, records = items.len(), host = %options.host, "starting batch");

    let mut session = SessionGuard::new(connector.access(&options)?);
    let start = output.len();

    for (index, item) in items.into_iter().enumerate() {
        debug!(operation = %kind, index, "running record");
        let outcome = run_record(session.connection(), kind, params, item, index);
        policy
            .absorb(outcome, index, output)
            .map_err(|source| FtpError::Record {
                operation: kind,
                index,
                source: Box::new(source),
            })?;
    }

    session.finish();
    info!(operation = %kind, outputs = output.len() - start, "batch finished");
    Ok(())
}

fn run_record<C, P>(
    conn: &mut C,
    kind: OperationKind,
    params: &P,
    item: Item,
    index: usize,
) -> Result<Vec<Item>>
where
    C: Connection + ?Sized,
    P: ParameterSource + ?Sized,
{
    let request = OperationRequest::resolve(kind, params, &item, index)?;
    perform(conn, &request, item)
}

/// Execute one request and map its result to output records.
///
/// `List` yields one record per entry, or a single `{ success: true }` when
/// the folder is empty. Every other operation yields exactly one record.
pub fn perform<C>(conn: &mut C, request: &OperationRequest, item: Item) -> Result<Vec<Item>>
where
    C: Connection + ?Sized,
{
    debug!(operation = %request.kind(), "performing");
    match *request {
        OperationRequest::Delete { ref path } => {
            let reply = conn.remove(path)?;
            Ok(vec![Item::from_serialize(&reply)])
        }
        OperationRequest::Download {
            ref path,
            ref binary_property,
        } => {
            let (data, _) = bridge::collect(|sink| conn.download_to(sink, path))?;
            let mut out = item;
            out.binary.insert(
                binary_property.clone(),
                BinaryData::new(data, bridge::file_name_from_path(path)),
            );
            Ok(vec![out])
        }
        OperationRequest::List { ref folder_path } => {
            let entries = conn.list(folder_path)?;
            if entries.is_empty() {
                Ok(vec![Item::success()])
            } else {
                Ok(entries.iter().map(Item::from_serialize).collect())
            }
        }
        OperationRequest::MakeDir { ref folder_path } => {
            conn.ensure_dir(folder_path)?;
            Ok(vec![Item::success()])
        }
        OperationRequest::RemoveDir { ref folder_path } => {
            conn.remove_dir(folder_path)?;
            Ok(vec![Item::success()])
        }
        OperationRequest::Upload {
            ref path,
            ref binary_property,
        } => {
            let binary = item
                .binary
                .get(binary_property)
                .ok_or_else(|| FtpError::MissingBinary {
                    property: binary_property.clone(),
                })?;
            let mut source = BufferSource::new(&binary.data);
            let reply = conn.upload_from(&mut source, path)?;
            if !source.is_ended() {
                return Err(FtpError::ConnectionError(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("upload of {} stopped before the end of the data", path),
                )));
            }
            Ok(vec![Item::from_serialize(&reply)])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ChunkSink;
    use crate::listing::DirectoryEntry;
    use crate::types::Reply;
    use std::io::Read;

    #[derive(Default)]
    struct Counting {
        closes: usize,
        upload_limit: Option<usize>,
    }

    impl Connection for Counting {
        fn list(&mut self, _: &str) -> Result<Vec<DirectoryEntry>> {
            Ok(Vec::new())
        }
        fn remove(&mut self, _: &str) -> Result<Reply> {
            Ok(Reply::new(250, "ok"))
        }
        fn remove_dir(&mut self, _: &str) -> Result<()> {
            Ok(())
        }
        fn ensure_dir(&mut self, _: &str) -> Result<()> {
            Ok(())
        }
        fn download_to(&mut self, sink: &mut dyn ChunkSink, _: &str) -> Result<Reply> {
            sink.receive(b"ab")?;
            sink.receive(b"cd")?;
            Ok(Reply::new(226, "done"))
        }
        fn upload_from(&mut self, source: &mut dyn Read, _: &str) -> Result<Reply> {
            let mut sink = Vec::new();
            match self.upload_limit {
                Some(limit) => source.take(limit as u64).read_to_end(&mut sink)?,
                None => source.read_to_end(&mut sink)?,
            };
            Ok(Reply::new(226, format!("{} bytes", sink.len())))
        }
        fn close(&mut self) {
            self.closes += 1;
        }
    }

    #[test]
    fn guard_closes_once() {
        let mut guard = SessionGuard::new(Counting::default());
        guard.close();
        guard.close();
        assert_eq!(guard.connection().closes, 1);
    }

    #[test]
    fn policy_folding() {
        let mut output = Vec::new();
        let err = || Err(FtpError::MissingBinary { property: "data".to_owned() });

        FailurePolicy::Isolate.absorb(Ok(vec![Item::success()]), 0, &mut output).unwrap();
        FailurePolicy::Isolate.absorb(err(), 1, &mut output).unwrap();
        assert_eq!(output.len(), 2);
        assert_eq!(output[1].paired_item, Some(1));

        assert!(FailurePolicy::Abort.absorb(err(), 2, &mut output).is_err());
        assert_eq!(output.len(), 2);
    }

    #[test]
    fn download_keeps_input_fields() {
        let mut conn = Counting::default();
        let mut item = Item::success();
        item.json.insert("id".to_owned(), 7.into());
        let request = OperationRequest::Download {
            path: "/dir/file.bin".to_owned(),
            binary_property: "payload".to_owned(),
        };
        let out = perform(&mut conn, &request, item).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].json["id"], 7);
        let binary = &out[0].binary["payload"];
        assert_eq!(binary.data, b"abcd");
        assert_eq!(binary.file_name.as_deref(), Some("file.bin"));
    }

    #[test]
    fn upload_needs_the_binary_property() {
        let mut conn = Counting::default();
        let request = OperationRequest::Upload {
            path: "/x".to_owned(),
            binary_property: "data".to_owned(),
        };
        match perform(&mut conn, &request, Item::default()) {
            Err(FtpError::MissingBinary { property }) => assert_eq!(property, "data"),
            other => panic!("unexpected: {:?}", other),
        }

        let mut item = Item::default();
        item.binary.insert("data".to_owned(), BinaryData::new(vec![1, 2, 3], None));
        let out = perform(&mut conn, &request, item).unwrap();
        assert_eq!(out[0].json["code"], 226);
        assert_eq!(out[0].json["message"], "3 bytes");
    }

    #[test]
    fn short_upload_is_an_error() {
        let mut conn = Counting {
            upload_limit: Some(2),
            ..Counting::default()
        };
        let request = OperationRequest::Upload {
            path: "/x".to_owned(),
            binary_property: "data".to_owned(),
        };
        let mut item = Item::default();
        item.binary.insert("data".to_owned(), BinaryData::new(vec![1, 2, 3], None));
        match perform(&mut conn, &request, item) {
            Err(FtpError::ConnectionError(err)) => {
                assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn empty_listing_is_one_success() {
        let mut conn = Counting::default();
        let request = OperationRequest::List {
            folder_path: "/".to_owned(),
        };
        assert_eq!(perform(&mut conn, &request, Item::default()).unwrap(), vec![Item::success()]);
    }
}

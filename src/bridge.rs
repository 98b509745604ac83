//! Moves payloads between in-memory buffers and the session's byte streams.
//!
//! Uploads read straight out of the record's buffer; nothing is copied.
//! Downloads push chunks into a [`ChunkSink`]; [`ChunkCollector`] appends them,
//! in arrival order, to one contiguous buffer.

use std::io::{self, Read};

use crate::types::Result;

/// Finite, single-pass reader over a borrowed buffer.
///
/// Once the buffer is exhausted the source is ended: every further read
/// returns `Ok(0)`.
#[derive(Debug)]
pub struct BufferSource<'a> {
    remaining: &'a [u8],
    ended: bool,
}

impl<'a> BufferSource<'a> {
    pub fn new(data: &'a [u8]) -> BufferSource<'a> {
        BufferSource {
            remaining: data,
            ended: false,
        }
    }

    /// True once a read has reported end of stream.
    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl<'a> Read for BufferSource<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining.is_empty() {
            self.ended = true;
            return Ok(0);
        }
        let n = self.remaining.len().min(buf.len());
        let (head, tail) = self.remaining.split_at(n);
        buf[..n].copy_from_slice(head);
        self.remaining = tail;
        Ok(n)
    }
}

/// Receives the chunks of a download as the server delivers them.
pub trait ChunkSink {
    fn receive(&mut self, chunk: &[u8]) -> io::Result<()>;
}

/// Accumulates every received chunk into a single buffer.
#[derive(Debug, Default)]
pub struct ChunkCollector {
    buffer: Vec<u8>,
    chunks: usize,
}

impl ChunkCollector {
    pub fn new() -> ChunkCollector {
        ChunkCollector::default()
    }

    /// Number of chunks received so far.
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }
}

impl ChunkSink for ChunkCollector {
    fn receive(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.buffer.extend_from_slice(chunk);
        self.chunks += 1;
        Ok(())
    }
}

/// Run `call` against a fresh collector and return the assembled buffer
/// together with whatever `call` returned.
pub fn collect<T, F>(call: F) -> Result<(Vec<u8>, T)>
where
    F: FnOnce(&mut dyn ChunkSink) -> Result<T>,
{
    let mut collector = ChunkCollector::new();
    let value = call(&mut collector)?;
    Ok((collector.into_buffer(), value))
}

/// Last segment of a remote path; `None` when the path ends with a separator.
pub fn file_name_from_path(path: &str) -> Option<&str> {
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_reads_once_then_ends() {
        let data = b"hello, world!".to_vec();
        let mut source = BufferSource::new(&data);
        let mut small = [0u8; 5];
        assert_eq!(source.read(&mut small).unwrap(), 5);
        assert_eq!(&small, b"hello");
        assert!(!source.is_ended());

        let mut rest = Vec::new();
        source.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b", world!");
        assert!(source.is_ended());
        assert_eq!(source.read(&mut small).unwrap(), 0);
    }

    #[test]
    fn empty_source_ends_immediately() {
        let mut source = BufferSource::new(&[]);
        let mut buf = [0u8; 8];
        assert_eq!(source.read(&mut buf).unwrap(), 0);
        assert!(source.is_ended());
    }

    #[test]
    fn collector_keeps_arrival_order() {
        let (buffer, chunks) = collect(|sink| {
            for chunk in [&b"one "[..], &b"two "[..], &b""[..], &b"three"[..]].iter() {
                sink.receive(chunk)?;
            }
            Ok(4)
        })
        .unwrap();
        assert_eq!(buffer, b"one two three");
        assert_eq!(chunks, 4);
    }

    #[test]
    fn collect_propagates_failure() {
        let res: Result<(Vec<u8>, ())> = collect(|sink| {
            sink.receive(b"partial")?;
            Err(crate::types::FtpError::InvalidResponse("boom".to_owned()))
        });
        assert!(res.is_err());
    }

    #[test]
    fn file_names() {
        assert_eq!(file_name_from_path("/a/b/report.csv"), Some("report.csv"));
        assert_eq!(file_name_from_path("report.csv"), Some("report.csv"));
        assert_eq!(file_name_from_path("/a/b/"), None);
    }
}

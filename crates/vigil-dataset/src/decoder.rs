//! Resumable decoder for newline-delimited JSON delta files.
//!
//! The decoder reports a byte offset after every record: the bytes consumed
//! so far, up to but not including the separator that follows the record.
//! Opening the same file at a saved offset and decoding from there yields
//! exactly the records that had not been returned yet.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;

use crate::error::DatasetError;

/// Pull decoder over a byte stream that starts at `offset` in the file.
pub struct DeltaFileDecoder<S> {
    source: S,
    buffer: Vec<u8>,
    pos: usize,
    offset: u64,
    source_done: bool,
}

impl<S> DeltaFileDecoder<S>
where
    S: Stream<Item = Result<Bytes, DatasetError>> + Unpin,
{
    /// `start_offset` is where `source` begins within the file.
    pub const fn new(source: S, start_offset: u64) -> Self {
        Self {
            source,
            buffer: Vec::new(),
            pos: 0,
            offset: start_offset,
            source_done: false,
        }
    }

    /// Absolute offset reached so far.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Decode the next record, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Decode`] with the record's starting offset if a
    /// line is not valid JSON for `T`, or the source's error if reading fails.
    pub async fn next_record<T: DeserializeOwned>(&mut self) -> Result<Option<T>, DatasetError> {
        loop {
            self.skip_whitespace();
            if self.pos < self.buffer.len() {
                break;
            }
            if !self.fill().await? {
                return Ok(None);
            }
        }

        let record_len = loop {
            if let Some(i) = self.buffer[self.pos..].iter().position(|&b| b == b'\n') {
                break i;
            }
            if !self.fill().await? {
                break self.buffer.len() - self.pos;
            }
        };

        let record_start = self.offset;
        let line = &self.buffer[self.pos..self.pos + record_len];
        let parsed = serde_json::from_slice::<T>(line).map_err(|e| DatasetError::Decode {
            offset: record_start,
            message: e.to_string(),
        });
        self.pos += record_len;
        self.offset += record_len as u64;
        parsed.map(Some)
    }

    fn skip_whitespace(&mut self) {
        let skipped = self.buffer[self.pos..]
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        self.pos += skipped;
        self.offset += skipped as u64;
    }

    /// Append the next chunk. Returns `false` once the source is exhausted.
    async fn fill(&mut self) -> Result<bool, DatasetError> {
        if self.source_done {
            return Ok(false);
        }
        match self.source.next().await {
            Some(chunk) => {
                let chunk = chunk?;
                if self.pos > 0 {
                    self.buffer.drain(..self.pos);
                    self.pos = 0;
                }
                self.buffer.extend_from_slice(&chunk);
                Ok(true)
            }
            None => {
                self.source_done = true;
                Ok(false)
            }
        }
    }
}

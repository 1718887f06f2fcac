//! Streaming export decoder
//!
//! Decodes an export document of the shape `{"messages": [...], ...}` into a
//! one-at-a-time sequence of [`MessageRecord`]s without ever materializing
//! the array. The decoder walks the top-level object with a serde visitor,
//! skips every field other than `messages`, and hands each array element to
//! a caller-supplied closure as soon as it is deserialized. Peak memory is a
//! single record plus the read buffer, independent of record count.
//!
//! # Error Handling
//!
//! Malformed JSON anywhere in the document is **fatal**: decoding stops and
//! the error is returned to the caller. No record is ever delivered twice,
//! and nothing after the failure point is delivered at all. An error
//! returned by the closure likewise aborts the pass and is surfaced
//! unchanged.
//!
//! Each call to [`ExportReader::for_each`] reopens the file, so a reader can
//! be used for multiple independent passes.

use crate::error::{Error, Result};
use crate::types::MessageRecord;
use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Field of the export document holding the message array.
const MESSAGES_FIELD: &str = "messages";

/// Streaming reader for an export document on disk.
pub struct ExportReader {
    path: PathBuf,
}

impl ExportReader {
    /// Create a reader for the given export file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the underlying export file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the document, invoking `handler` once per message record in
    /// document order. Returns the number of records delivered.
    pub fn for_each<F>(&self, mut handler: F) -> Result<u64>
    where
        F: FnMut(MessageRecord) -> Result<()>,
    {
        let file = File::open(&self.path)?;
        let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(file));

        // A handler failure aborts deserialization with an opaque serde
        // error; the real error is stashed here and restored afterwards.
        let mut handler_error: Option<Error> = None;

        let visitor = DocumentVisitor {
            handler: &mut handler,
            handler_error: &mut handler_error,
        };

        match serde::Deserializer::deserialize_map(&mut deserializer, visitor) {
            Ok(delivered) => {
                deserializer.end().map_err(|e| self.decode_error(&e))?;
                Ok(delivered)
            }
            Err(e) => match handler_error.take() {
                Some(original) => Err(original),
                None => Err(self.decode_error(&e)),
            },
        }
    }

    fn decode_error(&self, cause: &serde_json::Error) -> Error {
        Error::Decode {
            path: self.path.display().to_string(),
            message: cause.to_string(),
        }
    }
}

/// Visitor over the top-level export object.
struct DocumentVisitor<'a, F> {
    handler: &'a mut F,
    handler_error: &'a mut Option<Error>,
}

impl<'de, 'a, F> Visitor<'de> for DocumentVisitor<'a, F>
where
    F: FnMut(MessageRecord) -> Result<()>,
{
    type Value = u64;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an export document with a `messages` array")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<u64, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut delivered = 0u64;
        while let Some(key) = map.next_key::<String>()? {
            if key == MESSAGES_FIELD {
                delivered = map.next_value_seed(MessageSeq {
                    handler: &mut *self.handler,
                    handler_error: &mut *self.handler_error,
                })?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(delivered)
    }
}

/// Seed that drains the `messages` array element by element.
struct MessageSeq<'a, F> {
    handler: &'a mut F,
    handler_error: &'a mut Option<Error>,
}

impl<'de, 'a, F> DeserializeSeed<'de> for MessageSeq<'a, F>
where
    F: FnMut(MessageRecord) -> Result<()>,
{
    type Value = u64;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<u64, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, 'a, F> Visitor<'de> for MessageSeq<'a, F>
where
    F: FnMut(MessageRecord) -> Result<()>,
{
    type Value = u64;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an array of message records")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<u64, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut delivered = 0u64;
        while let Some(record) = seq.next_element::<MessageRecord>()? {
            if let Err(e) = (self.handler)(record) {
                *self.handler_error = Some(e);
                return Err(de::Error::custom("record handler aborted the pass"));
            }
            delivered += 1;
        }
        Ok(delivered)
    }
}

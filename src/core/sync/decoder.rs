//! Streaming decoder for the bulk dataset
//!
//! The dataset is one JSON array holding hundreds of thousands of objects.
//! [`RecordDecoder`] scans the byte stream for element boundaries and
//! deserializes one element at a time, so memory stays bounded by the largest
//! single element plus one chunk.
//!
//! Two failure levels are distinguished:
//! - a broken container (not an array, bad separators, truncated stream) is a
//!   [`DecodeError`] and ends the run;
//! - an element that is well delimited but does not deserialize is yielded as
//!   [`DecodedRecord::Malformed`] and the scan continues with the next element.

use crate::adapters::dataset::ByteStream;
use crate::domain::{CardSyncError, DecodeError, Result};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::marker::PhantomData;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// One element of the dataset array
#[derive(Debug)]
pub enum DecodedRecord<T> {
    /// The element deserialized cleanly
    Record(T),
    /// The element is delimited but not a valid record
    Malformed(MalformedRecord),
}

/// An element that failed to deserialize
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedRecord {
    /// Zero-based position in the array
    pub index: u64,
    /// `oracle_id` if it could still be read from the element
    pub oracle_id: Option<String>,
    /// `name` if it could still be read from the element
    pub name: Option<String>,
    pub message: String,
}

/// Lenient view used to identify a malformed element in error rows
#[derive(Deserialize)]
struct RecordHint {
    #[serde(default)]
    oracle_id: Option<serde_json::Value>,
    #[serde(default)]
    name: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Before the opening bracket
    Open,
    /// After `[`, before the first element
    BeforeFirst,
    /// After a `,`
    BeforeElement,
    InElement,
    AfterElement,
    /// After the closing bracket
    Closed,
}

enum Scan {
    Element { start: usize, end: usize },
    NeedMore,
    Done,
}

/// Forward-only decoder over a dataset byte stream
pub struct RecordDecoder<T> {
    stream: ByteStream,
    buf: Vec<u8>,
    /// Absolute stream offset of `buf[0]`
    offset: u64,
    pos: usize,
    phase: Phase,
    bom_checked: bool,
    stream_done: bool,
    finished: bool,

    // Element scan state
    start: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,

    index: u64,
    max_record_bytes: usize,
    _record: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> RecordDecoder<T> {
    /// Creates a decoder that rejects elements larger than `max_record_bytes`
    pub fn new(stream: ByteStream, max_record_bytes: usize) -> Self {
        Self {
            stream,
            buf: Vec::new(),
            offset: 0,
            pos: 0,
            phase: Phase::Open,
            bom_checked: false,
            stream_done: false,
            finished: false,
            start: 0,
            depth: 0,
            in_string: false,
            escaped: false,
            index: 0,
            max_record_bytes,
            _record: PhantomData,
        }
    }

    /// Number of elements yielded so far
    pub fn elements_read(&self) -> u64 {
        self.index
    }

    /// Pulls the next element
    ///
    /// Returns `Ok(None)` once the array is closed and the stream is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`CardSyncError::Decode`] for a broken container and propagates
    /// errors of the underlying byte stream. The decoder is unusable after an
    /// error.
    pub async fn next_record(&mut self) -> Result<Option<DecodedRecord<T>>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            match self.scan()? {
                Scan::Element { start, end } => {
                    let decoded = self.decode_element(start, end);
                    self.index += 1;
                    return Ok(Some(decoded));
                }
                Scan::Done => {
                    self.finished = true;
                    return Ok(None);
                }
                Scan::NeedMore => {
                    if self.stream_done {
                        self.finished = true;
                        return Err(self.eof_error().into());
                    }
                    self.compact();
                    match self.stream.next().await {
                        Some(chunk) => self.buf.extend_from_slice(&chunk?),
                        None => self.stream_done = true,
                    }
                }
            }
        }
    }

    /// Turns the decoder into a lazy stream of elements
    pub fn into_stream(self) -> BoxStream<'static, Result<DecodedRecord<T>>>
    where
        T: Send + 'static,
    {
        futures::stream::try_unfold(self, |mut decoder| async move {
            let next = decoder.next_record().await?;
            Ok::<_, CardSyncError>(next.map(|record| (record, decoder)))
        })
        .boxed()
    }

    fn decode_element(&self, start: usize, end: usize) -> DecodedRecord<T> {
        let bytes = &self.buf[start..end];
        match serde_json::from_slice::<T>(bytes) {
            Ok(record) => DecodedRecord::Record(record),
            Err(e) => {
                let (oracle_id, name) = match serde_json::from_slice::<RecordHint>(bytes) {
                    Ok(hint) => (
                        hint.oracle_id.and_then(|v| v.as_str().map(str::to_string)),
                        hint.name.and_then(|v| v.as_str().map(str::to_string)),
                    ),
                    Err(_) => (None, None),
                };
                DecodedRecord::Malformed(MalformedRecord {
                    index: self.index,
                    oracle_id,
                    name,
                    message: format!("element {}: {e}", self.index),
                })
            }
        }
    }

    /// Drops bytes that can no longer be part of a future element
    fn compact(&mut self) {
        let keep_from = if self.phase == Phase::InElement {
            self.start
        } else {
            self.pos
        };
        if keep_from == 0 {
            return;
        }
        self.buf.drain(..keep_from);
        self.offset += keep_from as u64;
        self.pos -= keep_from;
        if self.phase == Phase::InElement {
            self.start -= keep_from;
        }
    }

    fn eof_error(&self) -> DecodeError {
        match self.phase {
            Phase::Open => DecodeError::NotAnArray {
                offset: self.offset + self.pos as u64,
                found: "end of input".to_string(),
            },
            _ => DecodeError::UnexpectedEof {
                elements: self.index,
            },
        }
    }

    fn absolute(&self, pos: usize) -> u64 {
        self.offset + pos as u64
    }

    fn begin_element(&mut self) {
        self.phase = Phase::InElement;
        self.start = self.pos;
        self.depth = 0;
        self.in_string = false;
        self.escaped = false;
    }

    fn scan(&mut self) -> std::result::Result<Scan, DecodeError> {
        if !self.bom_checked {
            if self.buf.len() < UTF8_BOM.len()
                && !self.stream_done
                && UTF8_BOM.starts_with(&self.buf)
            {
                return Ok(Scan::NeedMore);
            }
            if self.buf.starts_with(&UTF8_BOM) {
                self.pos = UTF8_BOM.len();
            }
            self.bom_checked = true;
        }

        while self.pos < self.buf.len() {
            let b = self.buf[self.pos];
            match self.phase {
                Phase::Open => {
                    if b.is_ascii_whitespace() {
                        self.pos += 1;
                    } else if b == b'[' {
                        self.phase = Phase::BeforeFirst;
                        self.pos += 1;
                    } else {
                        return Err(DecodeError::NotAnArray {
                            offset: self.absolute(self.pos),
                            found: describe(b),
                        });
                    }
                }
                Phase::BeforeFirst | Phase::BeforeElement => match b {
                    _ if b.is_ascii_whitespace() => self.pos += 1,
                    b']' if self.phase == Phase::BeforeFirst => {
                        self.phase = Phase::Closed;
                        self.pos += 1;
                    }
                    b']' => {
                        return Err(DecodeError::TrailingComma {
                            offset: self.absolute(self.pos),
                        })
                    }
                    b',' | b'}' => {
                        return Err(DecodeError::UnexpectedToken {
                            offset: self.absolute(self.pos),
                            found: describe(b),
                        })
                    }
                    _ => self.begin_element(),
                },
                Phase::InElement => {
                    if let Some(end) = self.advance_element(b) {
                        if end - self.start > self.max_record_bytes {
                            return Err(DecodeError::RecordTooLarge {
                                index: self.index,
                                limit: self.max_record_bytes,
                            });
                        }
                        self.phase = Phase::AfterElement;
                        self.pos = end;
                        return Ok(Scan::Element {
                            start: self.start,
                            end,
                        });
                    }
                }
                Phase::AfterElement => match b {
                    _ if b.is_ascii_whitespace() => self.pos += 1,
                    b',' => {
                        self.phase = Phase::BeforeElement;
                        self.pos += 1;
                    }
                    b']' => {
                        self.phase = Phase::Closed;
                        self.pos += 1;
                    }
                    _ => {
                        return Err(DecodeError::UnexpectedToken {
                            offset: self.absolute(self.pos),
                            found: describe(b),
                        })
                    }
                },
                Phase::Closed => {
                    if b.is_ascii_whitespace() {
                        self.pos += 1;
                    } else {
                        return Err(DecodeError::TrailingData {
                            offset: self.absolute(self.pos),
                        });
                    }
                }
            }
        }

        if self.phase == Phase::InElement && self.pos - self.start > self.max_record_bytes {
            return Err(DecodeError::RecordTooLarge {
                index: self.index,
                limit: self.max_record_bytes,
            });
        }

        if self.phase == Phase::Closed && self.stream_done {
            return Ok(Scan::Done);
        }
        Ok(Scan::NeedMore)
    }

    /// Consumes one byte of the current element.
    ///
    /// Returns the exclusive end of the element once it is complete. A scalar
    /// element ends before the delimiter that follows it, so the delimiter is
    /// left for the `AfterElement` phase.
    fn advance_element(&mut self, b: u8) -> Option<usize> {
        let at = self.pos;

        if self.in_string {
            self.pos += 1;
            if self.escaped {
                self.escaped = false;
            } else if b == b'\\' {
                self.escaped = true;
            } else if b == b'"' {
                self.in_string = false;
                if self.depth == 0 {
                    return Some(at + 1);
                }
            }
            return None;
        }

        match b {
            b'"' => self.in_string = true,
            b'{' | b'[' => self.depth += 1,
            b'}' | b']' => {
                if self.depth == 0 {
                    return Some(at);
                }
                self.depth -= 1;
                if self.depth == 0 {
                    self.pos += 1;
                    return Some(at + 1);
                }
            }
            b',' if self.depth == 0 => return Some(at),
            _ if self.depth == 0 && b.is_ascii_whitespace() => return Some(at),
            _ => {}
        }
        self.pos += 1;
        None
    }
}

fn describe(b: u8) -> String {
    if b.is_ascii_graphic() {
        format!("'{}'", b as char)
    } else {
        format!("byte 0x{b:02x}")
    }
}

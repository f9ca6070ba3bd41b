#[cfg(test)]
#[path = "event_stream_test.rs"]
mod tests;

use anyhow::Result;
use bytes::Buf;
use bytes::BytesMut;
use futures::stream;
use futures::stream::Stream;
use futures::stream::StreamExt;
use futures::stream::TryStreamExt;
use serde::Deserialize;
use tokio_util::codec::Decoder;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;

use crate::domain::models::ChatError;
use crate::domain::models::ChunkStream;

const RECORD_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
struct DeltaRecord {
    content: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
struct ChoiceRecord {
    #[serde(default)]
    delta: DeltaRecord,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
struct ChunkRecord {
    #[serde(default)]
    choices: Vec<ChoiceRecord>,
}

/// Splits a byte stream into newline terminated lines. Whatever is left
/// without a trailing newline once the stream ends is dropped rather than
/// treated as a record.
#[derive(Default)]
pub struct LineCodec {
    next_index: usize,
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, std::io::Error> {
        let newline = buf[self.next_index..].iter().position(|b| return *b == b'\n');
        match newline {
            Some(offset) => {
                let line_end = self.next_index + offset;
                self.next_index = 0;
                let line = buf.split_to(line_end + 1);
                return Ok(Some(
                    String::from_utf8_lossy(&line[..line_end]).to_string(),
                ));
            }
            None => {
                self.next_index = buf.len();
                return Ok(None);
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, std::io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }

        if !buf.is_empty() {
            tracing::debug!(
                bytes = buf.len(),
                "Discarding incomplete trailing stream record"
            );
            buf.clear();
        }
        self.next_index = 0;

        return Ok(None);
    }
}

/// Outcome of reading one framed line.
#[derive(Debug, PartialEq, Eq)]
pub enum Record {
    Skip,
    Chunk(String),
    Done,
}

/// Interprets a single line of the event stream. Malformed JSON is logged and
/// skipped so one bad record never ends the stream.
pub fn parse_line(line: &str) -> Record {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Record::Skip;
    }

    let payload = match trimmed.strip_prefix(RECORD_PREFIX) {
        Some(payload) => payload.trim(),
        None => return Record::Skip,
    };

    if payload == DONE_SENTINEL {
        return Record::Done;
    }

    match serde_json::from_str::<ChunkRecord>(payload) {
        Ok(record) => {
            tracing::debug!(body = ?record, "Completion chunk");
            let content = record
                .choices
                .into_iter()
                .next()
                .and_then(|choice| return choice.delta.content);

            return match content {
                Some(text) if !text.is_empty() => Record::Chunk(text),
                _ => Record::Skip,
            };
        }
        Err(err) => {
            let parse_err = ChatError::Parse(err.to_string());
            tracing::warn!(error = %parse_err, record = payload, "Skipping stream record");
            return Record::Skip;
        }
    }
}

fn convert_err<E: std::fmt::Display>(err: E) -> std::io::Error {
    let err_msg = err.to_string();
    return std::io::Error::new(std::io::ErrorKind::Interrupted, err_msg);
}

/// Turns a response body into the lazy sequence of content deltas. The body
/// is owned by the returned stream and dropped as soon as the stream ends,
/// errors, or hits the end sentinel.
pub fn decode_chunks<S, B, E>(body: S) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: Buf + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let reader = StreamReader::new(body.map_err(convert_err));
    let lines = Box::pin(FramedRead::new(reader, LineCodec::default()));

    let chunks = stream::unfold(Some(lines), |state| async move {
        let mut lines = state?;
        loop {
            match lines.next().await {
                None => return None,
                Some(Err(err)) => {
                    let network_err = ChatError::Network(err.to_string());
                    return Some((Err(network_err.into()), None));
                }
                Some(Ok(line)) => match parse_line(&line) {
                    Record::Skip => continue,
                    Record::Done => return None,
                    Record::Chunk(text) => return Some((Ok(text), Some(lines))),
                },
            }
        }
    });

    return chunks.boxed();
}

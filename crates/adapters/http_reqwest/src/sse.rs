//! Server-sent events decoding for the live channel.

use std::collections::VecDeque;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;

use signage_app::ports::PushMessage;
use signage_domain::error::SignageError;

use crate::error::HttpError;

/// Event name used when a frame carries no `event:` field.
const DEFAULT_EVENT: &str = "message";

/// Largest frame (pending line plus accumulated data) the decoder accepts.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Incremental `text/event-stream` decoder.
///
/// Bytes are fed as they arrive; complete frames come out as
/// [`PushMessage`]s. Only `event` and `data` fields are kept, comments and
/// other fields are skipped. Bytes already searched for a line break are
/// not searched again, and a frame growing past [`MAX_FRAME_BYTES`] fails
/// the decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` known to hold no line break.
    scanned: usize,
    event: Option<String>,
    data: Vec<String>,
    data_bytes: usize,
}

impl SseDecoder {
    /// Feed a chunk and return every frame it completed.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::FrameTooLarge`] when the frame being assembled
    /// exceeds [`MAX_FRAME_BYTES`]; the decoder is reset.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<PushMessage>, HttpError> {
        self.buffer.extend_from_slice(chunk);

        let mut messages = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            let line = String::from_utf8_lossy(&self.buffer[start..end])
                .trim_end_matches('\r')
                .to_owned();
            start = end + 1;
            self.scanned = start;
            if let Some(message) = self.line(&line) {
                messages.push(message);
            }
            self.check_size(0)?;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        self.check_size(self.buffer.len())?;
        Ok(messages)
    }

    fn check_size(&mut self, pending: usize) -> Result<(), HttpError> {
        if self.data_bytes + pending > MAX_FRAME_BYTES {
            *self = Self::default();
            return Err(HttpError::FrameTooLarge {
                limit: MAX_FRAME_BYTES,
            });
        }
        Ok(())
    }

    fn line(&mut self, line: &str) -> Option<PushMessage> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data_bytes += value.len() + 1;
                self.data.push(value.to_string());
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<PushMessage> {
        let event = self.event.take();
        self.data_bytes = 0;
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(PushMessage::new(
            event.unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
        ))
    }
}

/// Turn a streaming response body into decoded push messages.
///
/// The stream ends when the server closes the connection and yields an
/// error when the body fails mid-way or a frame is too large.
pub(crate) fn messages(
    response: reqwest::Response,
) -> BoxStream<'static, Result<PushMessage, SignageError>> {
    let body = Box::pin(response.bytes_stream());
    let state = (body, SseDecoder::default(), VecDeque::new(), false);

    futures_util::stream::unfold(
        state,
        |(mut body, mut decoder, mut pending, failed)| async move {
            loop {
                if let Some(message) = pending.pop_front() {
                    return Some((Ok(message), (body, decoder, pending, failed)));
                }
                if failed {
                    return None;
                }
                match body.next().await {
                    Some(Ok(chunk)) => match decoder.feed(&chunk) {
                        Ok(messages) => pending.extend(messages),
                        Err(err) => {
                            tracing::warn!(error = %err, "dropping live channel");
                            return Some((Err(err.into()), (body, decoder, pending, true)));
                        }
                    },
                    Some(Err(err)) => {
                        let err = SignageError::from(HttpError::from(err));
                        return Some((Err(err), (body, decoder, pending, true)));
                    }
                    None => return None,
                }
            }
        },
    )
    .boxed()
}

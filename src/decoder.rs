//! Incremental UTF-8 decoding of a streamed response body
//!
//! The chat endpoint streams plain text with no application-level framing,
//! so network chunk boundaries can fall in the middle of a multi-byte
//! character. [`Utf8StreamDecoder`] keeps the incomplete tail of one chunk
//! and completes it with the next, so every emitted fragment is valid text.
//!
//! Invalid byte sequences are a hard [`ChatError::DecodeFailure`]; the
//! decoder never substitutes replacement characters.

use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};

use crate::error::{ChatError, Result};
use crate::transport::ByteStream;

/// Lazily decoded sequence of text fragments
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Stateful UTF-8 decoder for arbitrarily split byte chunks
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    /// Create a decoder with an empty carry-over buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk
    ///
    /// Returns `Ok(None)` when the chunk only extended an incomplete
    /// character and no text can be emitted yet.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::DecodeFailure`] if the bytes contain an invalid
    /// UTF-8 sequence. The buffered bytes are discarded.
    ///
    /// # Examples
    ///
    /// ```
    /// use madlen_chat::decoder::Utf8StreamDecoder;
    ///
    /// let mut decoder = Utf8StreamDecoder::new();
    /// let bytes = "é".as_bytes();
    /// assert_eq!(decoder.push(&bytes[..1]).unwrap(), None);
    /// assert_eq!(decoder.push(&bytes[1..]).unwrap(), Some("é".to_string()));
    /// ```
    pub fn push(&mut self, chunk: &[u8]) -> std::result::Result<Option<String>, ChatError> {
        self.pending.extend_from_slice(chunk);

        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                let offset = e.valid_up_to();
                self.pending.clear();
                return Err(ChatError::DecodeFailure(format!(
                    "invalid UTF-8 sequence at byte {offset} of buffered chunk"
                )));
            }
        };

        if valid_up_to == 0 {
            return Ok(None);
        }

        let complete: Vec<u8> = self.pending.drain(..valid_up_to).collect();
        String::from_utf8(complete)
            .map(Some)
            .map_err(|e| ChatError::DecodeFailure(e.to_string()))
    }

    /// Signal end of input
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::DecodeFailure`] if the stream ended in the middle
    /// of a multi-byte character. The dangling bytes are discarded.
    pub fn finish(&mut self) -> std::result::Result<(), ChatError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let dangling = self.pending.len();
        self.pending.clear();
        Err(ChatError::DecodeFailure(format!(
            "stream ended with {dangling} byte(s) of an incomplete character"
        )))
    }

    /// Number of bytes held back waiting for the rest of a character
    #[cfg(test)]
    pub(crate) fn buffered_len(&self) -> usize {
        self.pending.len()
    }
}

/// Adapt a raw byte stream into a stream of text fragments
///
/// Upstream errors (including cancellation) are forwarded unchanged and end
/// the fragment stream. A decode error is yielded once and also ends it.
pub fn decode_stream(bytes: ByteStream) -> FragmentStream {
    let state = (bytes, Utf8StreamDecoder::new(), false);

    Box::pin(stream::unfold(
        state,
        |(mut bytes, mut decoder, finished)| async move {
            if finished {
                return None;
            }

            loop {
                match bytes.next().await {
                    Some(Ok(chunk)) => match decoder.push(&chunk) {
                        Ok(Some(text)) => return Some((Ok(text), (bytes, decoder, false))),
                        Ok(None) => continue,
                        Err(err) => return Some((Err(err.into()), (bytes, decoder, true))),
                    },
                    Some(Err(err)) => return Some((Err(err), (bytes, decoder, true))),
                    None => {
                        return match decoder.finish() {
                            Ok(()) => None,
                            Err(err) => Some((Err(err.into()), (bytes, decoder, true))),
                        };
                    }
                }
            }
        },
    ))
}

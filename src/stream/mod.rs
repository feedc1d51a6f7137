//! Streaming-chunk decoding: bytes → protocol events.
//!
//! [`decoder::ChunkDecoder`] turns an arbitrarily-chunked byte stream into
//! the discrete [`event::StreamEvent`]s that drive message assembly.

pub mod decoder;
pub mod event;

use bytes::Bytes;
use futures_util::Stream;

use self::decoder::ChunkDecoder;
use self::event::DecodedEvent;

/// Adapt a raw byte stream into a stream of decoded protocol events.
///
/// A failed read yields a terminal [`DecodedEvent::Failed`] carrying the
/// transport error, so the caller can tell a natural end (`[DONE]` or
/// EOF) from a broken connection. Decoding is pure: no mutation of
/// conversation state happens here.
pub fn decode_stream<S, E>(byte_stream: S) -> impl Stream<Item = DecodedEvent> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        let mut decoder = ChunkDecoder::new();
        futures_util::pin_mut!(byte_stream);
        use futures_util::StreamExt;

        while let Some(chunk) = byte_stream.next().await {
            match chunk {
                Ok(bytes) => {
                    for event in decoder.push(&bytes) {
                        let done = matches!(event, DecodedEvent::Done);
                        yield event;
                        if done {
                            return;
                        }
                    }
                }
                Err(e) => {
                    // The session controller decides whether this failure
                    // belongs to a superseded (cancelled) send.
                    tracing::debug!("byte stream failed: {e}");
                    yield DecodedEvent::Failed(e.to_string());
                    return;
                }
            }
        }

        if let Some(event) = decoder.finish() {
            yield event;
        }
    }
}

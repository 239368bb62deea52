//! Server-sent events framing shared by the streaming providers.
//!
//! Bytes are buffered until a full line is available, so a multi-byte
//! character split across network chunks is decoded only once complete.

use chatline_application::DeltaStream;
use chatline_domain::StreamEvent;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Splits a byte stream into the `data:` payloads of SSE events.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every `data:` payload it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = Self::data_of(&line) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Payload of a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        Self::data_of(&rest)
    }

    fn data_of(line: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);
        let data = line.strip_prefix("data:")?;
        Some(data.strip_prefix(' ').unwrap_or(data).to_string())
    }
}

/// What a provider made of one `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text to append (may be empty).
    Text(String),
    /// The response is complete.
    Done,
    /// Keep-alive or metadata without text.
    Skip,
    /// The provider reported an error inside the stream.
    Failed(String),
}

/// Pump an SSE byte stream into `stream`'s channel on a background task.
///
/// `parse` turns each payload into a [`Frame`]. The task stops when the body
/// ends, a terminal frame arrives, or the consumer cancels the handle, in
/// which case the HTTP body is dropped and the connection closed.
pub fn spawn_pump<S, B, E, F>(body: S, mut parse: F, label: &'static str) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send + 'static,
    F: FnMut(&str) -> Frame + Send + 'static,
{
    let (tx, stream) = DeltaStream::channel(64);
    let cancellation = stream.cancellation_token();

    tokio::spawn(async move {
        let mut body = Box::pin(body);
        let mut decoder = SseDecoder::new();

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    debug!("{} stream cancelled by consumer", label);
                    return;
                }
                chunk = body.next() => chunk,
            };

            let payloads = match chunk {
                Some(Ok(bytes)) => decoder.push(bytes.as_ref()),
                Some(Err(e)) => {
                    let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                    return;
                }
                None => {
                    if let Some(payload) = decoder.finish()
                        && !forward(&tx, parse(&payload)).await
                    {
                        return;
                    }
                    trace!("{} body ended", label);
                    let _ = tx.send(StreamEvent::Completed).await;
                    return;
                }
            };

            for payload in payloads {
                if !forward(&tx, parse(&payload)).await {
                    return;
                }
            }
        }
    });

    stream
}

/// Send the event for `frame`; false once the stream is over.
async fn forward(tx: &mpsc::Sender<StreamEvent>, frame: Frame) -> bool {
    match frame {
        Frame::Text(text) => tx.send(StreamEvent::Delta(text)).await.is_ok(),
        Frame::Skip => true,
        Frame::Done => {
            let _ = tx.send(StreamEvent::Completed).await;
            false
        }
        Frame::Failed(message) => {
            let _ = tx.send(StreamEvent::Error(message)).await;
            false
        }
    }
}

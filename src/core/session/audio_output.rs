//! Outbound (assistant) audio buffering.
//!
//! Audio chunks from the model are queued to a dedicated task which coalesces
//! them and flushes one combined `audio` frame when the buffered size reaches
//! the threshold or when no chunk arrives within the flush timeout. Barge-in
//! bumps an epoch: chunks tagged with an older epoch are never delivered.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::transport::{OutgoingFrame, Transport};

/// Producer side of the audio output task.
#[derive(Clone)]
pub struct AudioOutputHandle {
    tx: mpsc::UnboundedSender<(u64, String)>,
    epoch: Arc<AtomicU64>,
    barge_in: Arc<Notify>,
}

impl AudioOutputHandle {
    /// Queue a chunk. Returns false once the output task has stopped.
    pub fn enqueue(&self, audio_base64: String) -> bool {
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.tx.send((epoch, audio_base64)).is_ok()
    }

    /// Discard everything buffered or queued so far.
    pub fn interrupt(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.barge_in.notify_one();
    }
}

/// Ordered chunks awaiting a combined send.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    chunks: Vec<String>,
    size: usize,
    threshold: usize,
}

impl OutputBuffer {
    pub fn new(threshold: usize) -> Self {
        Self {
            chunks: Vec::new(),
            size: 0,
            threshold,
        }
    }

    pub fn push(&mut self, chunk: String) {
        self.size += chunk.len();
        self.chunks.push(chunk);
    }

    pub fn is_full(&self) -> bool {
        self.size >= self.threshold
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Drain the buffer into one base64 payload, preserving order.
    pub fn take_combined(&mut self) -> Option<String> {
        if self.chunks.is_empty() {
            return None;
        }
        let chunks = std::mem::take(&mut self.chunks);
        self.size = 0;
        Some(combine_base64(chunks))
    }

    pub fn purge(&mut self) {
        self.chunks.clear();
        self.size = 0;
    }
}

/// Concatenate the decoded PCM of every chunk and re-encode it. Chunks that are
/// not valid base64 are joined textually.
fn combine_base64(mut chunks: Vec<String>) -> String {
    if chunks.len() == 1 {
        return chunks.remove(0);
    }
    let mut pcm = Vec::new();
    for chunk in &chunks {
        match BASE64.decode(chunk) {
            Ok(bytes) => pcm.extend_from_slice(&bytes),
            Err(_) => return chunks.concat(),
        }
    }
    BASE64.encode(pcm)
}

/// Spawn the audio output task for one model stream.
pub fn spawn_audio_output(
    transport: Arc<dyn Transport>,
    flush_threshold: usize,
    flush_timeout: Duration,
    cancel: CancellationToken,
) -> (AudioOutputHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let epoch = Arc::new(AtomicU64::new(0));
    let barge_in = Arc::new(Notify::new());

    let handle = AudioOutputHandle {
        tx,
        epoch: epoch.clone(),
        barge_in: barge_in.clone(),
    };
    let task = tokio::spawn(run_audio_output(
        rx,
        transport,
        OutputBuffer::new(flush_threshold),
        flush_timeout,
        epoch,
        barge_in,
        cancel,
    ));
    (handle, task)
}

async fn run_audio_output(
    mut rx: mpsc::UnboundedReceiver<(u64, String)>,
    transport: Arc<dyn Transport>,
    mut buffer: OutputBuffer,
    flush_timeout: Duration,
    epoch: Arc<AtomicU64>,
    barge_in: Arc<Notify>,
    cancel: CancellationToken,
) {
    let mut buffer_epoch = epoch.load(Ordering::SeqCst);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Audio output task cancelled");
                break;
            }

            _ = barge_in.notified() => {
                if !buffer.is_empty() {
                    debug!(discarded = buffer.size(), "Cleared audio buffer due to barge-in");
                }
                buffer.purge();
                buffer_epoch = epoch.load(Ordering::SeqCst);
            }

            received = tokio::time::timeout(flush_timeout, rx.recv()) => {
                match received {
                    Ok(Some((chunk_epoch, chunk))) => {
                        let current = epoch.load(Ordering::SeqCst);
                        if chunk_epoch != current {
                            continue;
                        }
                        if buffer_epoch != current {
                            buffer.purge();
                            buffer_epoch = current;
                        }
                        buffer.push(chunk);
                        if buffer.is_full() {
                            flush(&mut buffer, buffer_epoch, &epoch, transport.as_ref()).await;
                        }
                    }
                    Ok(None) => {
                        flush(&mut buffer, buffer_epoch, &epoch, transport.as_ref()).await;
                        debug!("Audio output queue closed");
                        break;
                    }
                    Err(_) => {
                        flush(&mut buffer, buffer_epoch, &epoch, transport.as_ref()).await;
                    }
                }
            }
        }
    }
}

async fn flush(
    buffer: &mut OutputBuffer,
    buffer_epoch: u64,
    epoch: &AtomicU64,
    transport: &dyn Transport,
) {
    if buffer_epoch != epoch.load(Ordering::SeqCst) {
        buffer.purge();
        return;
    }
    let Some(data) = buffer.take_combined() else {
        return;
    };
    if !transport.is_open() {
        return;
    }
    if let Err(e) = transport.send_frame(OutgoingFrame::Audio { data }).await {
        warn!("Failed to send audio to client: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tools::testing::RecordingTransport;

    fn audio_frames(transport: &RecordingTransport) -> Vec<String> {
        transport
            .frames()
            .into_iter()
            .filter_map(|frame| match frame {
                OutgoingFrame::Audio { data } => Some(data),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_buffer_threshold_and_take() {
        let mut buffer = OutputBuffer::new(8);
        buffer.push("AAAA".to_string());
        assert!(!buffer.is_full());
        buffer.push("AQID".to_string());
        assert!(buffer.is_full());

        let combined = buffer.take_combined().unwrap();
        assert_eq!(BASE64.decode(combined).unwrap(), vec![0, 0, 0, 1, 2, 3]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.size(), 0);
        assert!(buffer.take_combined().is_none());
    }

    #[test]
    fn test_combine_padded_chunks() {
        let combined = combine_base64(vec!["AQ==".to_string(), "Ag==".to_string()]);
        assert_eq!(BASE64.decode(combined).unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_on_timeout() {
        let transport = Arc::new(RecordingTransport::default());
        let cancel = CancellationToken::new();
        let (handle, task) = spawn_audio_output(
            transport.clone(),
            1024,
            Duration::from_millis(20),
            cancel.clone(),
        );

        assert!(handle.enqueue("AAAA".to_string()));
        assert!(handle.enqueue("AQID".to_string()));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let frames = audio_frames(&transport);
        assert_eq!(frames.len(), 1);
        assert_eq!(BASE64.decode(&frames[0]).unwrap(), vec![0, 0, 0, 1, 2, 3]);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_on_threshold() {
        let transport = Arc::new(RecordingTransport::default());
        let cancel = CancellationToken::new();
        let (handle, task) =
            spawn_audio_output(transport.clone(), 8, Duration::from_secs(60), cancel.clone());

        handle.enqueue("AAAA".to_string());
        handle.enqueue("AAAA".to_string());
        handle.enqueue("AQID".to_string());
        tokio::time::sleep(Duration::from_millis(1)).await;

        let frames = audio_frames(&transport);
        assert_eq!(frames.len(), 1);
        assert_eq!(BASE64.decode(&frames[0]).unwrap(), vec![0; 6]);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_barge_in_discards_queued_audio() {
        let transport = Arc::new(RecordingTransport::default());
        let cancel = CancellationToken::new();
        let (handle, task) = spawn_audio_output(
            transport.clone(),
            1024,
            Duration::from_millis(20),
            cancel.clone(),
        );

        handle.enqueue("AAAA".to_string());
        handle.enqueue("AAAA".to_string());
        handle.interrupt();
        handle.enqueue("AQID".to_string());
        tokio::time::sleep(Duration::from_millis(50)).await;

        let frames = audio_frames(&transport);
        assert_eq!(frames, vec!["AQID".to_string()]);

        cancel.cancel();
        task.await.unwrap();
    }
}

use super::state::SerialEvent;
use crate::core::text::Utf8Decoder;
use crate::core::transport::ByteSource;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Background task draining the read half of a port
pub struct ReadPipe {
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ReadPipe {
    /// Start reading; decoded text is forwarded to `sink`
    pub fn spawn(reader: Box<dyn ByteSource>, sink: mpsc::UnboundedSender<SerialEvent>) -> Self {
        let (cancel, cancelled) = oneshot::channel();
        let task = tokio::spawn(read_loop(reader, sink, cancelled));
        Self {
            cancel: Some(cancel),
            task: Some(task),
        }
    }

    /// Signal cancellation and wait for the loop to release the reader.
    /// Calling it again is a no-op.
    pub async fn shutdown(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            // Loop may already be gone after a read error
            let _ = cancel.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Read task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }
}

impl Drop for ReadPipe {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn read_loop(
    mut reader: Box<dyn ByteSource>,
    sink: mpsc::UnboundedSender<SerialEvent>,
    mut cancelled: oneshot::Receiver<()>,
) {
    let mut decoder = Utf8Decoder::new();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = &mut cancelled => {
                debug!("Read loop cancelled");
                break;
            }
            chunk = reader.read() => chunk,
        };

        match chunk {
            Ok(Some(raw)) => {
                debug!("Received {} bytes", raw.len());
                let text = decoder.decode(&raw);
                if sink.send(SerialEvent::Received { text, raw }).is_err() {
                    debug!("Event sink dropped, stopping read loop");
                    break;
                }
            }
            Ok(None) => {
                let rest = decoder.finish();
                if !rest.is_empty() {
                    let _ = sink.send(SerialEvent::Received {
                        text: rest,
                        raw: Vec::new(),
                    });
                }
                let _ = sink.send(SerialEvent::ReadClosed);
                break;
            }
            Err(e) => {
                warn!("Read failed: {}", e);
                let _ = sink.send(SerialEvent::ReadError(e.to_string()));
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::{GnssConfError, GnssConfResult};
    use async_trait::async_trait;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<GnssConfResult<Option<Vec<u8>>>>);

    #[async_trait]
    impl ByteSource for Scripted {
        async fn read(&mut self) -> GnssConfResult<Option<Vec<u8>>> {
            match self.0.pop_front() {
                Some(item) => item,
                None => std::future::pending().await,
            }
        }
    }

    #[tokio::test]
    async fn test_split_utf8_is_reassembled() {
        let reader = Scripted(VecDeque::from(vec![
            Ok(Some(b"pos \xC2".to_vec())),
            Ok(Some(b"\xB0 ok".to_vec())),
            Ok(None),
        ]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipe = ReadPipe::spawn(Box::new(reader), tx);

        let mut text = String::new();
        while let Some(event) = rx.recv().await {
            match event {
                SerialEvent::Received { text: chunk, .. } => text.push_str(&chunk),
                SerialEvent::ReadClosed => break,
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(text, "pos \u{B0} ok");
        pipe.shutdown().await;
    }

    #[tokio::test]
    async fn test_read_error_ends_loop() {
        let reader = Scripted(VecDeque::from(vec![Err(GnssConfError::read_failure("framing"))]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipe = ReadPipe::spawn(Box::new(reader), tx);

        assert_eq!(
            rx.recv().await,
            Some(SerialEvent::ReadError("Read error: framing".to_string()))
        );
        assert_eq!(rx.recv().await, None);
        pipe.shutdown().await;
        assert!(!pipe.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_read() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut pipe = ReadPipe::spawn(Box::new(Scripted(VecDeque::new())), tx);
        pipe.shutdown().await;
        pipe.shutdown().await;
        assert!(!pipe.is_running());
    }
}

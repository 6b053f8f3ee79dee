//! Outbound transport handle for one client.
//!
//! `ClientWriter` fronts a bounded queue of pre-encoded packets. A dedicated
//! writer task owns the socket write half and drains the queue in order, so
//! fan-out from other connections never blocks on a slow subscriber.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::topic::ClientId;

/// Error when sending to a ClientWriter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Writer task has stopped (connection closed or write failed)
    Closed,
    /// Outbound queue is at capacity
    QueueFull,
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Closed => write!(f, "writer closed"),
            SendError::QueueFull => write!(f, "outbound queue full"),
        }
    }
}

impl std::error::Error for SendError {}

/// Per-client outbound queue feeding a dedicated writer task
pub struct ClientWriter {
    client_id: ClientId,
    /// Encoded packets waiting to be written
    tx: mpsc::Sender<Bytes>,
    /// Whether the writer task is still running
    alive: AtomicBool,
    /// Signalled when the owning connection closes
    close: Notify,
}

impl ClientWriter {
    /// Create a writer for `client_id` and spawn the task that drains it into
    /// `transport`.
    pub fn spawn<W>(
        client_id: ClientId,
        transport: W,
        capacity: usize,
    ) -> (Arc<Self>, JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let writer = Arc::new(Self {
            client_id,
            tx,
            alive: AtomicBool::new(true),
            close: Notify::new(),
        });

        let handle = tokio::spawn(writer.clone().drain(rx, transport));
        (writer, handle)
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Check if the writer task is still running
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Queue bytes, waiting for room if the queue is full
    pub async fn send(&self, bytes: Bytes) -> Result<(), SendError> {
        if !self.is_alive() {
            return Err(SendError::Closed);
        }
        self.tx.send(bytes).await.map_err(|_| SendError::Closed)
    }

    /// Queue bytes without waiting
    pub fn try_send(&self, bytes: Bytes) -> Result<(), SendError> {
        if !self.is_alive() {
            return Err(SendError::Closed);
        }
        self.tx.try_send(bytes).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Stop the writer task once already queued bytes are written
    pub fn close(&self) {
        self.close.notify_one();
    }

    async fn drain<W>(self: Arc<Self>, mut rx: mpsc::Receiver<Bytes>, mut transport: W)
    where
        W: AsyncWrite + Unpin,
    {
        loop {
            tokio::select! {
                biased;

                // Checked first so a busy queue cannot hold off a close
                _ = self.close.notified() => {
                    rx.close();
                    while let Ok(bytes) = rx.try_recv() {
                        if Self::write(&mut transport, &bytes).await.is_err() {
                            break;
                        }
                    }
                    break;
                }
                msg = rx.recv() => {
                    let Some(bytes) = msg else { break };
                    if let Err(e) = Self::write(&mut transport, &bytes).await {
                        debug!("Write to {} failed: {}", self.client_id, e);
                        self.alive.store(false, Ordering::Release);
                        return;
                    }
                }
            }
        }

        self.alive.store(false, Ordering::Release);
        let _ = transport.shutdown().await;
        trace!("Writer for {} stopped", self.client_id);
    }

    async fn write<W>(transport: &mut W, bytes: &[u8]) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        transport.write_all(bytes).await?;
        transport.flush().await
    }
}

impl std::fmt::Debug for ClientWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientWriter")
            .field("client_id", &self.client_id)
            .field("queued", &(self.tx.max_capacity() - self.tx.capacity()))
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_writes_in_order() {
        let (client, mut server) = tokio::io::duplex(1024);
        let (writer, handle) = ClientWriter::spawn(ClientId::from("c1"), client, 8);

        writer.send(Bytes::from_static(b"one")).await.unwrap();
        writer.try_send(Bytes::from_static(b"two")).unwrap();
        writer.send(Bytes::from_static(b"three")).await.unwrap();
        writer.close();
        handle.await.unwrap();

        let mut out = Vec::new();
        server.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"onetwothree");
        assert!(!writer.is_alive());
    }

    #[tokio::test]
    async fn test_closed_writer_rejects_sends() {
        let (client, _server) = tokio::io::duplex(64);
        let (writer, handle) = ClientWriter::spawn(ClientId::from("c1"), client, 8);
        writer.close();
        handle.await.unwrap();

        assert_eq!(
            writer.try_send(Bytes::from_static(b"x")),
            Err(SendError::Closed)
        );
        assert_eq!(
            writer.send(Bytes::from_static(b"x")).await,
            Err(SendError::Closed)
        );
    }

    #[tokio::test]
    async fn test_full_queue_reports_queue_full() {
        // A 1-byte pipe nobody reads from stalls the writer task
        let (client, _server) = tokio::io::duplex(1);
        let (writer, _handle) = ClientWriter::spawn(ClientId::from("slow"), client, 1);

        let mut saw_full = false;
        for _ in 0..16 {
            match writer.try_send(Bytes::from_static(b"payload")) {
                Ok(()) => tokio::task::yield_now().await,
                Err(SendError::QueueFull) => {
                    saw_full = true;
                    break;
                }
                Err(SendError::Closed) => panic!("writer closed unexpectedly"),
            }
        }
        assert!(saw_full);
    }

    #[tokio::test]
    async fn test_write_error_marks_writer_dead() {
        let transport = tokio_test::io::Builder::new()
            .write(b"ok")
            .write_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let (writer, handle) = ClientWriter::spawn(ClientId::from("c1"), transport, 4);

        writer.send(Bytes::from_static(b"ok")).await.unwrap();
        writer.send(Bytes::from_static(b"lost")).await.unwrap();
        handle.await.unwrap();

        assert!(!writer.is_alive());
        assert_eq!(
            writer.try_send(Bytes::from_static(b"x")),
            Err(SendError::Closed)
        );
    }

    #[tokio::test]
    async fn test_close_wins_over_busy_queue() {
        let (client, mut server) = tokio::io::duplex(1024);
        let (writer, handle) = ClientWriter::spawn(ClientId::from("busy"), client, 4);

        tokio::spawn(async move {
            let mut sink = Vec::new();
            let _ = server.read_to_end(&mut sink).await;
        });

        // Keeps the queue non-empty until the writer reports closed
        let producer = tokio::spawn({
            let writer = writer.clone();
            async move {
                loop {
                    match writer.try_send(Bytes::from_static(b"more")) {
                        Err(SendError::Closed) => break,
                        _ => tokio::task::yield_now().await,
                    }
                }
            }
        });

        tokio::task::yield_now().await;
        writer.close();

        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("writer kept draining after close")
            .unwrap();
        assert!(!writer.is_alive());
        producer.await.unwrap();
    }
}

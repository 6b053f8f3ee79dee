//! MQTT Broker Core
//!
//! The broker owns the shared topic trie and client registry, accepts TCP
//! connections and runs one [`Connection`] task per client.

mod connection;
mod registry;
mod writer;

pub use connection::{Connection, ConnectionError, State};
pub use registry::ClientRegistry;
pub use writer::{ClientWriter, SendError};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::topic::{ClientId, TopicTrie};

/// Broker configuration
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// TCP bind address
    pub bind_addr: SocketAddr,
    /// Packets each client's outbound queue holds before fan-out drops
    pub outbound_queue_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 1883)),
            outbound_queue_capacity: 1024,
        }
    }
}

/// The MQTT Broker
pub struct Broker {
    /// Configuration
    config: BrokerConfig,
    /// Subscription index
    topics: Arc<TopicTrie>,
    /// Client id -> outbound transport
    registry: Arc<ClientRegistry>,
    /// Source of client identities
    next_client_id: AtomicU64,
    /// Sessions currently running
    active: AtomicUsize,
    /// Shutdown signal
    shutdown: broadcast::Sender<()>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        let (shutdown, _) = broadcast::channel(1);

        Self {
            config,
            topics: Arc::new(TopicTrie::new()),
            registry: Arc::new(ClientRegistry::new()),
            next_client_id: AtomicU64::new(0),
            active: AtomicUsize::new(0),
            shutdown,
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn topics(&self) -> &Arc<TopicTrie> {
        &self.topics
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Bind the configured address and run the accept loop
    pub async fn run(self: &Arc<Self>) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run the accept loop on an already bound listener until shutdown
    pub async fn serve(self: &Arc<Self>, listener: TcpListener) -> Result<(), std::io::Error> {
        info!("MQTT/TCP listening on {}", listener.local_addr()?);
        let mut shutdown_rx = self.shutdown.subscribe();

        debug!("Starting TCP accept loop");
        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("Accept loop stopped");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("New TCP connection from {}", addr);
                        self.handle_connection(stream, addr);
                    }
                    Err(e) => {
                        error!("Failed to accept TCP connection: {}", e);
                    }
                },
            }
        }
    }

    /// Spawn the session task for an accepted TCP stream
    fn handle_connection(self: &Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let _ = stream.set_nodelay(true);
        let broker = self.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let (reader, writer) = stream.into_split();
            let session_fut = broker.handle_stream(reader, writer);
            tokio::pin!(session_fut);

            loop {
                tokio::select! {
                    biased;

                    result = &mut session_fut => {
                        if let Err(e) = result {
                            debug!("Connection error from {}: {}", addr, e);
                        }
                        break;
                    }
                    result = shutdown_rx.recv() => {
                        match result {
                            Ok(()) | Err(broadcast::error::RecvError::Closed) => {
                                debug!("Connection {} shutting down", addr);
                                break;
                            }
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        }
                    }
                }
            }
        });
    }

    /// Run one session over arbitrary read and write halves
    ///
    /// Assigns the next client identity, starts its outbound writer and
    /// drives the protocol until the session closes. The session counts
    /// towards [`Broker::connection_count`] while it runs.
    pub async fn handle_stream<R, W>(&self, reader: R, writer: W) -> Result<(), ConnectionError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let _active = ActiveGuard::enter(&self.active);

        let client_id = self.next_client_id();
        let (writer, _) = ClientWriter::spawn(
            client_id.clone(),
            writer,
            self.config.outbound_queue_capacity,
        );
        let mut connection = Connection::new(
            reader,
            client_id,
            writer,
            self.topics.clone(),
            self.registry.clone(),
        );
        connection.run().await
    }

    fn next_client_id(&self) -> ClientId {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        ClientId::from(id.to_string())
    }

    /// Shutdown the broker
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Number of sessions currently running
    pub fn connection_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Number of clients that ever completed CONNECT
    pub fn client_count(&self) -> usize {
        self.registry.len()
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

/// Counts a running session; released even if the session task is dropped
struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

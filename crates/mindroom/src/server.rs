//! `MindroomServer` builder and server loop.
//!
//! This is the entry point for running a Mindroom server. It ties the
//! layers together: transport → protocol → room manager → store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mindroom_protocol::{Codec, JsonCodec};
use mindroom_room::{RoomManager, RoomStore};
use mindroom_transport::{Transport, WebSocketTransport};
use tokio::task::JoinHandle;

use crate::handler::handle_connection;
use crate::{MindroomError, ServerConfig};

/// The reaper never ticks faster than this.
const MIN_REAP_INTERVAL: Duration = Duration::from_millis(10);

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<S: RoomStore, C: Codec> {
    pub(crate) rooms: RoomManager<S>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Option<Duration>,
    started: Instant,
}

impl<S: RoomStore, C: Codec> ServerState<S, C> {
    /// Milliseconds since the server started, used for frame timestamps.
    pub(crate) fn elapsed_millis(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Builder for configuring and starting a Mindroom server.
///
/// # Example
///
/// ```rust,ignore
/// use mindroom::prelude::*;
///
/// let server = MindroomServerBuilder::new()
///     .config(ServerConfig::from_env()?)
///     .bind("0.0.0.0:8080")
///     .build(InMemoryStore::new())
///     .await?;
/// server.run().await
/// ```
pub struct MindroomServerBuilder {
    config: ServerConfig,
}

impl MindroomServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    ///
    /// Overrides the address of any config set before this call.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and sets up the room manager over `store`.
    ///
    /// Frames are JSON over WebSocket.
    pub async fn build<S: RoomStore>(
        self,
        store: S,
    ) -> Result<MindroomServer<S, JsonCodec>, MindroomError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let rooms = RoomManager::with_limits(
            store,
            self.config.limits.clone(),
            self.config.room_channel_size,
        );
        let state = Arc::new(ServerState {
            rooms,
            codec: JsonCodec,
            idle_timeout: self.config.idle_timeout,
            started: Instant::now(),
        });

        Ok(MindroomServer {
            transport,
            state,
            config: self.config,
        })
    }
}

impl Default for MindroomServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Mindroom server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct MindroomServer<S: RoomStore, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, C>>,
    config: ServerConfig,
}

impl<S: RoomStore, C: Codec> MindroomServer<S, C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, MindroomError> {
        Ok(self.transport.local_addr()?)
    }

    /// The room manager every connection shares.
    pub fn rooms(&self) -> &RoomManager<S> {
        &self.state.rooms
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs the accept loop and the empty-room reaper.
    ///
    /// Each accepted connection gets its own handler task. Runs until the
    /// returned future is dropped; the reaper stops with it.
    pub async fn run(mut self) -> Result<(), MindroomError> {
        let _reaper = Reaper::spawn(
            self.state.rooms.clone(),
            self.config.reap_interval,
            self.config.empty_room_ttl,
        );
        tracing::info!(
            addr = %self.config.bind_addr,
            max_players = self.config.limits.max_players,
            "Mindroom server running"
        );

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Periodically destroys rooms nobody has joined. Aborted on drop.
struct Reaper(JoinHandle<()>);

impl Reaper {
    fn spawn<S: RoomStore>(rooms: RoomManager<S>, every: Duration, ttl: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(MIN_REAP_INTERVAL));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                rooms.reap_empty_rooms(ttl).await;
            }
        });
        Self(handle)
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.0.abort();
    }
}

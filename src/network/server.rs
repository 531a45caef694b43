//! WebSocket Game Server
//!
//! Async WebSocket server for multiplayer connections.
//! Handles the room lobby, per-room tick loops and game message routing.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::game::settings::MatchSettings;
use crate::game::state::PlayerId;
use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::network::session::{
    clean_name, Member, Room, RoomError, RoomManager, MAX_NAME_CHARS, MAX_ROOM_PLAYERS,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Simulation rate (ticks per second).
    pub tick_rate: u32,
    /// Member cap per room.
    pub max_room_players: usize,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            tick_rate: 20,
            max_room_players: MAX_ROOM_PLAYERS,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `ARENA_BIND_ADDR`, `ARENA_MAX_CONNECTIONS`,
    /// `ARENA_TICK_RATE` and `ARENA_MAX_ROOM_PLAYERS`. Unparseable values
    /// are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse("ARENA_BIND_ADDR") {
            config.bind_addr = v;
        }
        if let Some(v) = env_parse("ARENA_MAX_CONNECTIONS") {
            config.max_connections = v;
        }
        if let Some(v) = env_parse::<u32>("ARENA_TICK_RATE") {
            config.tick_rate = v.clamp(1, 120);
        }
        if let Some(v) = env_parse::<usize>("ARENA_MAX_ROOM_PLAYERS") {
            config.max_room_players = v.max(2);
        }
        config
    }

    /// Settings every room starts from.
    pub fn base_settings(&self) -> MatchSettings {
        MatchSettings { tick_rate: self.tick_rate, ..MatchSettings::default() }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection limit reached.
    #[error("Connection limit reached")]
    ConnectionLimitReached,

    /// Room error.
    #[error("Room error: {0}")]
    Room(#[from] RoomError),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Connected client state.
struct ConnectedClient {
    /// Player identifier assigned on connect.
    player_id: PlayerId,
    /// Display name.
    name: String,
    /// Connection time.
    #[allow(dead_code)]
    connected_at: Instant,
    /// Last activity.
    last_activity: Instant,
    /// Message sender (for direct messaging to client).
    sender: mpsc::Sender<ServerMessage>,
}

type Clients = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Room registry.
    rooms: Arc<RoomManager>,
    /// Connected clients.
    clients: Clients,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let rooms = RoomManager::new(config.base_settings(), config.max_room_players);

        Self {
            config,
            rooms: Arc::new(rooms),
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Run the server.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Game server {} listening on {}", self.config.version, self.config.bind_addr);

        let cleanup_clients = self.clients.clone();
        let cleanup_rooms = self.rooms.clone();
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_clients, cleanup_rooms).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("{}, rejecting {}", GameServerError::ConnectionLimitReached, addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();
        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let rooms = self.rooms.clone();
        let tick_rate = self.config.tick_rate;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, GameServerError::from(e));
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);
            let player_id = PlayerId::generate();

            // Register client
            {
                let mut clients = clients.write().await;
                clients.insert(addr, ConnectedClient {
                    player_id,
                    name: "Guest".to_string(),
                    connected_at: Instant::now(),
                    last_activity: Instant::now(),
                    sender: msg_tx.clone(),
                });
            }

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let _ = msg_tx.send(ServerMessage::Connected { player_id: player_id.to_string() }).await;

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.try_send(ServerMessage::error(
                                            ErrorCode::InvalidMessage,
                                            "Invalid message format",
                                        ));
                                        continue;
                                    }
                                };

                                // Update activity
                                {
                                    let mut clients = clients.write().await;
                                    if let Some(client) = clients.get_mut(&addr) {
                                        client.last_activity = Instant::now();
                                    }
                                }

                                Self::handle_client_message(
                                    addr,
                                    client_msg,
                                    &clients,
                                    &rooms,
                                    tick_rate,
                                    &msg_tx,
                                ).await;
                            }
                            Some(Ok(Message::Ping(_))) => {
                                let _ = msg_tx.try_send(ServerMessage::Pong {
                                    timestamp: 0,
                                    server_time: chrono::Utc::now().timestamp_millis(),
                                });
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Cleanup
            sender_task.abort();
            rooms.leave_room(&player_id).await;
            clients.write().await.remove(&addr);

            info!("Client {} cleaned up", addr);
        });
    }

    /// Handle a client message.
    async fn handle_client_message(
        addr: SocketAddr,
        msg: ClientMessage,
        clients: &Clients,
        rooms: &Arc<RoomManager>,
        tick_rate: u32,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let (player_id, name) = {
            let clients = clients.read().await;
            match clients.get(&addr) {
                Some(c) => (c.player_id, c.name.clone()),
                None => return,
            }
        };

        if let Some(action) = msg.as_action() {
            if let Err(e) = rooms.submit_action(&player_id, action).await {
                debug!(player = %player_id.short(), "Action rejected: {}", e);
                let _ = sender.try_send(e.to_message());
            }
            return;
        }

        let result = match msg {
            ClientMessage::SetName { name } => {
                let name = clean_name(&name, MAX_NAME_CHARS, "Guest");
                if let Some(client) = clients.write().await.get_mut(&addr) {
                    client.name = name.clone();
                }
                let _ = sender.try_send(ServerMessage::NameSet { name });
                Ok(())
            }
            ClientMessage::CreateRoom { room_name, settings } => {
                let member = Member::human(player_id, name, sender.clone());
                rooms.create_room(member, &room_name, &settings).await;
                Ok(())
            }
            ClientMessage::JoinRoom { room_id } => {
                let member = Member::human(player_id, name, sender.clone());
                rooms.join_room(member, &room_id).await
            }
            ClientMessage::LeaveRoom => {
                rooms.leave_room(&player_id).await;
                Ok(())
            }
            ClientMessage::ListRooms => {
                let list = rooms.list_rooms().await;
                let _ = sender.try_send(ServerMessage::RoomList { rooms: list });
                Ok(())
            }
            ClientMessage::StartGame => match rooms.start_game(&player_id).await {
                Ok(room) => {
                    tokio::spawn(async move {
                        Self::run_room_game_loop(room, tick_rate).await;
                    });
                    Ok(())
                }
                Err(e) => Err(e),
            },
            ClientMessage::AddAi => rooms.add_ai(&player_id).await,
            ClientMessage::RemoveAi => rooms.remove_ai(&player_id).await,
            ClientMessage::Ping { timestamp } => {
                let _ = sender.try_send(ServerMessage::Pong {
                    timestamp,
                    server_time: chrono::Utc::now().timestamp_millis(),
                });
                Ok(())
            }
            _ => {
                debug!("Unhandled message type from {}", addr);
                Ok(())
            }
        };

        if let Err(e) = result {
            debug!(player = %player_id.short(), "Request rejected: {}", e);
            let _ = sender.try_send(e.to_message());
        }
    }

    /// Run the tick loop for a room until its match ends or is abandoned.
    async fn run_room_game_loop(room: Arc<RwLock<Room>>, tick_rate: u32) {
        let room_id = room.read().await.id.clone();
        let tick_duration = Duration::from_micros(1_000_000 / tick_rate.max(1) as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            let mut guard = room.write().await;
            match guard.run_tick() {
                Some(result) if result.match_ended => break,
                Some(_) => {}
                None => break,
            }
        }

        debug!(room = %room_id, "Game loop stopped");
    }

    /// Run cleanup loop.
    async fn run_cleanup_loop(clients: Clients, rooms: Arc<RoomManager>) {
        let mut interval = interval(Duration::from_secs(60));

        loop {
            interval.tick().await;

            let now = Instant::now();
            let idle_timeout = Duration::from_secs(300);

            let idle: Vec<_> = {
                let clients = clients.read().await;
                clients.iter()
                    .filter(|(_, c)| now.duration_since(c.last_activity) > idle_timeout)
                    .map(|(addr, c)| (*addr, c.player_id, c.sender.clone()))
                    .collect()
            };

            for (addr, player_id, sender) in idle {
                let _ = sender.try_send(ServerMessage::Shutdown {
                    reason: "Idle timeout".to_string(),
                });
                rooms.leave_room(&player_id).await;
                clients.write().await.remove(&addr);
                info!("Removed idle client {}", addr);
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get room count.
    pub async fn room_count(&self) -> usize {
        self.rooms.room_count().await
    }

    /// Room registry.
    pub fn rooms(&self) -> &Arc<RoomManager> {
        &self.rooms
    }
}

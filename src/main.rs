//! Interest-Matched 1:1 Chat Server - Entry Point
//!
//! Loads configuration and snapshots, starts the ChatServer actor and
//! accepts WebSocket connections.

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pairchat_server::{
    handle_connection, ChatServer, InMemoryDirectory, InMemoryMessageLog, Matchmaker,
    MessageHistory, ServerConfig, SnapshotStore, SnapshotWriter, User,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env();

    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=pairchat_server=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    // Start TCP listener
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("WebSocket Chat Server listening on {}", config.bind_addr);

    // Create ChatServer actor channel
    let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_buffer);

    // Restore users and history from the last snapshot
    let server = match config.data_dir.as_ref().map(SnapshotStore::new) {
        Some(store) => {
            let (users, history) = load_snapshots(&store);
            let writer = SnapshotWriter::spawn(store, history.clone());
            let matchmaker = Matchmaker::new(
                InMemoryDirectory::from_users(users),
                InMemoryMessageLog::from_rooms(history),
            );
            ChatServer::with_matchmaker(cmd_rx, matchmaker).with_snapshots(writer)
        }
        None => ChatServer::new(cmd_rx),
    };
    tokio::spawn(server.run());

    info!("ChatServer actor started");

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();
                let client_buffer = config.client_buffer;

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, cmd_tx, client_buffer).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Read stored users and history, starting empty on unreadable files
fn load_snapshots(store: &SnapshotStore) -> (Vec<User>, MessageHistory) {
    let users = store.load_users().unwrap_or_else(|e| {
        warn!("Starting without stored users: {}", e);
        Vec::new()
    });
    let history = store.load_messages().unwrap_or_else(|e| {
        warn!("Starting without stored messages: {}", e);
        MessageHistory::new()
    });

    info!(
        "Loaded {} users and {} rooms with messages",
        users.len(),
        history.len()
    );

    (users, history)
}

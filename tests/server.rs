//! End-to-end tests of the ChatServer actor through its command channel.

use std::time::Duration;

use pairchat_server::{
    ChatServer, ClientId, ErrorCode, MessageHistory, RoomId, ServerCommand, ServerMessage,
    SnapshotStore, SnapshotWriter, Timestamp, UserId,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

struct TestClient {
    id: ClientId,
    rx: mpsc::Receiver<ServerMessage>,
}

impl TestClient {
    async fn connect(cmd_tx: &mpsc::Sender<ServerCommand>) -> Self {
        let (tx, rx) = mpsc::channel(32);
        let id = ClientId::new();
        cmd_tx
            .send(ServerCommand::Connect { client_id: id, sender: tx })
            .await
            .unwrap();
        Self { id, rx }
    }

    async fn recv(&mut self) -> ServerMessage {
        timeout(Duration::from_secs(2), self.rx.recv())
            .await
            .expect("timed out waiting for server")
            .expect("server dropped client")
    }
}

fn start() -> mpsc::Sender<ServerCommand> {
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    tokio::spawn(ChatServer::new(cmd_rx).run());
    cmd_tx
}

async fn login(cmd_tx: &mpsc::Sender<ServerCommand>, client: &mut TestClient, user: &str, interests: &[&str]) {
    cmd_tx
        .send(ServerCommand::Register {
            client_id: client.id,
            user_id: UserId::new(user),
            interests: interests.iter().map(|s| s.to_string()).collect(),
        })
        .await
        .unwrap();
    assert_eq!(
        client.recv().await,
        ServerMessage::Registered {
            user_id: UserId::new(user)
        }
    );

    cmd_tx
        .send(ServerCommand::JoinUserRoom {
            client_id: client.id,
            user_id: UserId::new(user),
        })
        .await
        .unwrap();
    assert_eq!(
        client.recv().await,
        ServerMessage::UserRoomJoined {
            user_id: UserId::new(user)
        }
    );
}

#[tokio::test]
async fn test_full_chat_lifecycle() {
    let cmd_tx = start();
    let mut alice = TestClient::connect(&cmd_tx).await;
    let mut bob = TestClient::connect(&cmd_tx).await;
    login(&cmd_tx, &mut alice, "alice", &["chess", "jazz"]).await;
    login(&cmd_tx, &mut bob, "bob", &["jazz", "film"]).await;

    // Alice waits
    cmd_tx
        .send(ServerCommand::RequestMatch {
            client_id: alice.id,
            user_id: UserId::new("alice"),
        })
        .await
        .unwrap();
    assert_eq!(alice.recv().await, ServerMessage::Waiting);

    // Bob matches; notifications precede his direct reply
    cmd_tx
        .send(ServerCommand::RequestMatch {
            client_id: bob.id,
            user_id: UserId::new("bob"),
        })
        .await
        .unwrap();

    let ServerMessage::MatchFound {
        room_id,
        common_interest_count,
        partner_id,
        target_user_id,
    } = bob.recv().await
    else {
        panic!("bob expected match_found");
    };
    assert_eq!(common_interest_count, 1);
    assert_eq!(partner_id, UserId::new("alice"));
    assert_eq!(target_user_id, UserId::new("bob"));
    assert_eq!(
        bob.recv().await,
        ServerMessage::Matched {
            room_id: room_id.clone(),
            common_interest_count: 1
        }
    );

    assert_eq!(
        alice.recv().await,
        ServerMessage::MatchFound {
            room_id: room_id.clone(),
            common_interest_count: 1,
            partner_id: UserId::new("bob"),
            target_user_id: UserId::new("alice"),
        }
    );

    // Both subscribe to the room
    for client in [&mut alice, &mut bob] {
        cmd_tx
            .send(ServerCommand::JoinRoom {
                client_id: client.id,
                room_id: room_id.clone(),
            })
            .await
            .unwrap();
        assert_eq!(
            client.recv().await,
            ServerMessage::RoomJoined {
                room_id: room_id.clone()
            }
        );
    }

    // Message goes out live and into history
    cmd_tx
        .send(ServerCommand::SendMessage {
            client_id: bob.id,
            room_id: room_id.clone(),
            sender: UserId::new("bob"),
            text: "hi".into(),
        })
        .await
        .unwrap();
    let ServerMessage::NewMessage { sender, text, .. } = alice.recv().await else {
        panic!("alice expected new_message");
    };
    assert_eq!(sender, UserId::new("bob"));
    assert_eq!(text, "hi");
    assert!(matches!(bob.recv().await, ServerMessage::NewMessage { .. }));
    assert!(matches!(bob.recv().await, ServerMessage::MessageSent { .. }));

    cmd_tx
        .send(ServerCommand::FetchMessages {
            client_id: alice.id,
            room_id: room_id.clone(),
            since: Timestamp::ZERO,
        })
        .await
        .unwrap();
    let ServerMessage::Messages { messages, .. } = alice.recv().await else {
        panic!("alice expected messages");
    };
    assert_eq!(messages.len(), 1);

    // Alice ends the chat; both hear about it
    cmd_tx
        .send(ServerCommand::EndChat {
            client_id: alice.id,
            room_id: room_id.clone(),
            user_id: UserId::new("alice"),
        })
        .await
        .unwrap();
    assert_eq!(alice.recv().await, ServerMessage::ChatEnded);
    assert_eq!(
        alice.recv().await,
        ServerMessage::ChatClosed {
            room_id: room_id.clone()
        }
    );
    assert_eq!(bob.recv().await, ServerMessage::ChatEnded);

    cmd_tx
        .send(ServerCommand::CheckActive {
            client_id: bob.id,
            user_id: UserId::new("bob"),
        })
        .await
        .unwrap();
    assert_eq!(
        bob.recv().await,
        ServerMessage::ActiveChat {
            has_active_chat: false
        }
    );

    cmd_tx
        .send(ServerCommand::GetRoom {
            client_id: bob.id,
            user_id: UserId::new("bob"),
        })
        .await
        .unwrap();
    assert_eq!(bob.recv().await, ServerMessage::CurrentRoom { room_id: None });
}

#[tokio::test]
async fn test_errors_reach_requester() {
    let cmd_tx = start();
    let mut client = TestClient::connect(&cmd_tx).await;

    cmd_tx
        .send(ServerCommand::RequestMatch {
            client_id: client.id,
            user_id: UserId::new("ghost"),
        })
        .await
        .unwrap();
    assert!(matches!(
        client.recv().await,
        ServerMessage::Error {
            code: ErrorCode::UserNotFound,
            ..
        }
    ));

    cmd_tx
        .send(ServerCommand::CancelWait {
            client_id: client.id,
            user_id: UserId::new("ghost"),
        })
        .await
        .unwrap();
    assert!(matches!(
        client.recv().await,
        ServerMessage::Error {
            code: ErrorCode::NotWaiting,
            ..
        }
    ));

    cmd_tx
        .send(ServerCommand::EndChat {
            client_id: client.id,
            room_id: RoomId::new(""),
            user_id: UserId::new("ghost"),
        })
        .await
        .unwrap();
    assert!(matches!(
        client.recv().await,
        ServerMessage::Error {
            code: ErrorCode::ValidationError,
            ..
        }
    ));
}

#[tokio::test]
async fn test_disconnect_keeps_waiting_entry() {
    let cmd_tx = start();
    let mut alice = TestClient::connect(&cmd_tx).await;
    login(&cmd_tx, &mut alice, "alice", &["chess"]).await;

    cmd_tx
        .send(ServerCommand::RequestMatch {
            client_id: alice.id,
            user_id: UserId::new("alice"),
        })
        .await
        .unwrap();
    assert_eq!(alice.recv().await, ServerMessage::Waiting);

    cmd_tx
        .send(ServerCommand::Disconnect { client_id: alice.id })
        .await
        .unwrap();

    // A new connection for the same user sees the wait still in place
    let mut again = TestClient::connect(&cmd_tx).await;
    cmd_tx
        .send(ServerCommand::RequestMatch {
            client_id: again.id,
            user_id: UserId::new("alice"),
        })
        .await
        .unwrap();
    assert!(matches!(
        again.recv().await,
        ServerMessage::Error {
            code: ErrorCode::AlreadyWaiting,
            ..
        }
    ));
}

#[tokio::test]
async fn test_snapshots_flushed_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let writer = SnapshotWriter::spawn(store.clone(), MessageHistory::new());

    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let server = tokio::spawn(ChatServer::new(cmd_rx).with_snapshots(writer).run());

    let mut alice = TestClient::connect(&cmd_tx).await;
    let mut bob = TestClient::connect(&cmd_tx).await;
    login(&cmd_tx, &mut alice, "alice", &["chess"]).await;
    login(&cmd_tx, &mut bob, "bob", &["chess"]).await;

    cmd_tx
        .send(ServerCommand::RequestMatch {
            client_id: alice.id,
            user_id: UserId::new("alice"),
        })
        .await
        .unwrap();
    assert_eq!(alice.recv().await, ServerMessage::Waiting);
    cmd_tx
        .send(ServerCommand::RequestMatch {
            client_id: bob.id,
            user_id: UserId::new("bob"),
        })
        .await
        .unwrap();
    let room_id = match bob.recv().await {
        ServerMessage::MatchFound { room_id, .. } => room_id,
        other => panic!("expected match_found, got {:?}", other),
    };

    for text in ["one", "two", "three"] {
        cmd_tx
            .send(ServerCommand::SendMessage {
                client_id: bob.id,
                room_id: room_id.clone(),
                sender: UserId::new("bob"),
                text: text.into(),
            })
            .await
            .unwrap();
    }

    // Closing the command channel stops the actor, which flushes the writer
    drop(cmd_tx);
    timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap();

    let users = store.load_users().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.is_busy()));

    let history = store.load_messages().unwrap();
    let texts: Vec<&str> = history[&room_id].iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_stalled_client_does_not_block_others() {
    let cmd_tx = start();

    // Room for one frame and nobody reading it
    let (stalled_tx, _stalled_rx) = mpsc::channel(1);
    let stalled = ClientId::new();
    cmd_tx
        .send(ServerCommand::Connect {
            client_id: stalled,
            sender: stalled_tx,
        })
        .await
        .unwrap();
    for _ in 0..3 {
        cmd_tx
            .send(ServerCommand::FetchMessages {
                client_id: stalled,
                room_id: RoomId::new("room_1_1000"),
                since: Timestamp::ZERO,
            })
            .await
            .unwrap();
    }

    let mut healthy = TestClient::connect(&cmd_tx).await;
    cmd_tx
        .send(ServerCommand::CheckActive {
            client_id: healthy.id,
            user_id: UserId::new("nobody"),
        })
        .await
        .unwrap();
    assert_eq!(
        healthy.recv().await,
        ServerMessage::ActiveChat {
            has_active_chat: false
        }
    );
}

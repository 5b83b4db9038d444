//! JSON snapshot persistence
//!
//! Users and message history are written as whole-file snapshots by a single
//! writer task, so files on disk always follow commit order. Each write goes
//! to a temp file and is renamed into place; readers never see a torn file.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::chat_log::ChatMessage;
use crate::error::StoreError;
use crate::types::RoomId;
use crate::user::User;

pub const USERS_FILE: &str = "users.json";
pub const MESSAGES_FILE: &str = "messages.json";

/// Stored message history, keyed by room
pub type MessageHistory = HashMap<RoomId, Vec<ChatMessage>>;

/// Snapshot files inside one data directory
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn users_path(&self) -> PathBuf {
        self.dir.join(USERS_FILE)
    }

    pub fn messages_path(&self) -> PathBuf {
        self.dir.join(MESSAGES_FILE)
    }

    /// Stored users; a missing file means none
    pub fn load_users(&self) -> Result<Vec<User>, StoreError> {
        read_json(&self.users_path())
    }

    /// Stored history; a missing file means none
    pub fn load_messages(&self) -> Result<MessageHistory, StoreError> {
        read_json(&self.messages_path())
    }

    pub fn save_users(&self, users: &[User]) -> Result<(), StoreError> {
        self.write_json(&self.users_path(), users)
    }

    pub fn save_messages(&self, history: &MessageHistory) -> Result<(), StoreError> {
        self.write_json(&self.messages_path(), history)
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(StoreError::Encode)?;
        let write_err = |source: std::io::Error| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(write_err)?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(write_err)?;

        debug!("Wrote snapshot {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// Handle to the background snapshot writer
///
/// Users are sent as whole snapshots and only the newest pending one is
/// written. Messages are sent one at a time; the writer keeps its own copy
/// of the history and writes it after applying everything queued.
#[derive(Debug)]
pub struct SnapshotWriter {
    users_tx: watch::Sender<Option<Vec<User>>>,
    messages_tx: mpsc::UnboundedSender<(RoomId, ChatMessage)>,
    task: JoinHandle<()>,
}

impl SnapshotWriter {
    /// Start the writer; `history` must match what the message log holds
    pub fn spawn(store: SnapshotStore, history: MessageHistory) -> Self {
        let (users_tx, users_rx) = watch::channel(None);
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_writer(store, users_rx, messages_rx, history));
        Self {
            users_tx,
            messages_tx,
            task,
        }
    }

    /// Queue the latest user list; replaces any list not yet written
    pub fn save_users(&self, users: Vec<User>) {
        self.users_tx.send_replace(Some(users));
    }

    /// Queue one appended message
    pub fn append_message(&self, room_id: RoomId, message: ChatMessage) {
        if self.messages_tx.send((room_id, message)).is_err() {
            error!("Snapshot writer is gone; message not persisted");
        }
    }

    /// Flush everything queued and stop the writer
    pub async fn close(self) {
        let Self {
            users_tx,
            messages_tx,
            task,
        } = self;
        drop(users_tx);
        drop(messages_tx);
        if let Err(e) = task.await {
            error!("Snapshot writer failed: {}", e);
        }
    }
}

async fn run_writer(
    store: SnapshotStore,
    mut users_rx: watch::Receiver<Option<Vec<User>>>,
    mut messages_rx: mpsc::UnboundedReceiver<(RoomId, ChatMessage)>,
    mut history: MessageHistory,
) {
    let mut users_open = true;
    let mut messages_open = true;

    while users_open || messages_open {
        tokio::select! {
            changed = users_rx.changed(), if users_open => {
                if changed.is_err() {
                    users_open = false;
                    continue;
                }
                let latest = users_rx.borrow_and_update().clone();
                if let Some(users) = latest {
                    let store = store.clone();
                    write_blocking(move || store.save_users(&users)).await;
                }
            }
            appended = messages_rx.recv(), if messages_open => {
                let Some((room_id, message)) = appended else {
                    messages_open = false;
                    continue;
                };
                history.entry(room_id).or_default().push(message);
                while let Ok((room_id, message)) = messages_rx.try_recv() {
                    history.entry(room_id).or_default().push(message);
                }
                let store = store.clone();
                let snapshot = history.clone();
                write_blocking(move || store.save_messages(&snapshot)).await;
            }
        }
    }

    debug!("Snapshot writer stopped");
}

/// Run one file write on the blocking pool and wait for it
async fn write_blocking<F>(write: F)
where
    F: FnOnce() -> Result<(), StoreError> + Send + 'static,
{
    match tokio::task::spawn_blocking(write).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Snapshot write failed: {}", e),
        Err(e) => error!("Snapshot task failed: {}", e),
    }
}

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// TelemetryBroadcaster - pushes the latest Levels to Unix socket clients
//
// Threading:
// - the measurement thread calls `TelemetryPublisher::publish`, which only
//   swaps the snapshot under a mutex, bumps the generation and notifies
// - the broadcaster thread waits on the condvar with a 100 ms timeout;
//   a new generation is serialized and written to every client (outside the
//   lock), a timeout accepts at most one pending client
// Clients whose write fails are dropped. There is no backpressure and no retry.

use std::fs;
use std::io::{self, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::message::TelemetryMessage;
use crate::analysis::Levels;
use crate::error::TelemetryError;

/// Maximum simultaneously connected clients
pub const MAX_CLIENTS: usize = 5;

/// Condvar wait before polling the listener
pub const ACCEPT_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Default)]
struct SnapshotCell {
    snapshot: Option<Levels>,
    generation: u64,
}

struct Shared {
    cell: Mutex<SnapshotCell>,
    signal: Condvar,
    running: AtomicBool,
    clients: AtomicUsize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SnapshotCell> {
        // The cell holds plain data; a panic elsewhere cannot corrupt it
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable handle the measurement loop publishes through
#[derive(Clone)]
pub struct TelemetryPublisher {
    shared: Arc<Shared>,
}

impl TelemetryPublisher {
    /// Replace the shared snapshot and wake the broadcaster
    pub fn publish(&self, levels: &Levels) {
        {
            let mut cell = self.shared.lock();
            cell.snapshot = Some(*levels);
            cell.generation += 1;
        }
        self.shared.signal.notify_one();
    }
}

/// Owner of the broadcaster thread and its socket file
pub struct TelemetryBroadcaster {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    socket_path: PathBuf,
}

impl TelemetryBroadcaster {
    /// Bind `socket_path` and start the broadcaster thread
    ///
    /// A stale socket file at the path is removed first.
    ///
    /// # Returns
    /// * `Err(TelemetryError::BindFailed)` - Path not bindable
    /// * `Err(TelemetryError::SocketSetupFailed)` - Listener not switchable to non-blocking
    /// * `Err(TelemetryError::ThreadSpawnFailed)` - OS refused the thread
    pub fn start<P: AsRef<Path>>(socket_path: P) -> Result<Self, TelemetryError> {
        let socket_path = socket_path.as_ref().to_path_buf();
        match fs::remove_file(&socket_path) {
            Ok(()) => tracing::debug!("[Telemetry] Removed stale socket {:?}", socket_path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(TelemetryError::BindFailed {
                    path: socket_path.display().to_string(),
                    reason: format!("cannot remove stale socket: {}", err),
                })
            }
        }

        let listener = UnixListener::bind(&socket_path).map_err(|err| TelemetryError::BindFailed {
            path: socket_path.display().to_string(),
            reason: err.to_string(),
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|err| TelemetryError::SocketSetupFailed {
                reason: err.to_string(),
            })?;

        let shared = Arc::new(Shared {
            cell: Mutex::new(SnapshotCell::default()),
            signal: Condvar::new(),
            running: AtomicBool::new(true),
            clients: AtomicUsize::new(0),
        });

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("telemetry".to_string())
            .spawn(move || broadcast_loop(listener, thread_shared))
            .map_err(|err| TelemetryError::ThreadSpawnFailed {
                reason: err.to_string(),
            });
        let handle = match handle {
            Ok(handle) => handle,
            Err(err) => {
                let _ = fs::remove_file(&socket_path);
                return Err(err);
            }
        };

        tracing::info!("[Telemetry] Listening on {:?}", socket_path);
        Ok(Self {
            shared,
            handle: Some(handle),
            socket_path,
        })
    }

    pub fn publisher(&self) -> TelemetryPublisher {
        TelemetryPublisher {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Convenience for `self.publisher().publish(levels)`
    pub fn publish(&self, levels: &Levels) {
        self.publisher().publish(levels);
    }

    /// Clients currently connected
    pub fn client_count(&self) -> usize {
        self.shared.clients.load(Ordering::Acquire)
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Stop the thread, join it and remove the socket file
    ///
    /// Idempotent; also run on drop.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.shared.running.store(false, Ordering::Release);
        {
            // Notify under the lock so the wakeup cannot slip between the
            // thread's predicate check and its wait
            let _cell = self.shared.lock();
            self.shared.signal.notify_all();
        }
        if handle.join().is_err() {
            tracing::error!("[Telemetry] Broadcaster thread panicked");
        }
        if let Err(err) = fs::remove_file(&self.socket_path) {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    "[Telemetry] Could not remove socket {:?}: {}",
                    self.socket_path,
                    err
                );
            }
        }
        tracing::info!("[Telemetry] Broadcaster stopped");
    }
}

impl Drop for TelemetryBroadcaster {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn broadcast_loop(listener: UnixListener, shared: Arc<Shared>) {
    let mut clients: Vec<UnixStream> = Vec::with_capacity(MAX_CLIENTS);
    let mut sent_generation = 0u64;

    while shared.running.load(Ordering::Acquire) {
        let snapshot = {
            let cell = shared.lock();
            let (cell, _) = shared
                .signal
                .wait_timeout_while(cell, ACCEPT_INTERVAL, |cell| {
                    cell.generation == sent_generation && shared.running.load(Ordering::Acquire)
                })
                .unwrap_or_else(PoisonError::into_inner);
            if cell.generation != sent_generation {
                sent_generation = cell.generation;
                cell.snapshot
            } else {
                None
            }
        };

        if !shared.running.load(Ordering::Acquire) {
            break;
        }

        match snapshot {
            Some(levels) => send_to_clients(&mut clients, &TelemetryMessage::from(&levels)),
            None => accept_client(&listener, &mut clients),
        }
        shared.clients.store(clients.len(), Ordering::Release);
    }

    shared.clients.store(0, Ordering::Release);
    tracing::debug!("[Telemetry] Broadcast loop exited ({} client(s) closed)", clients.len());
}

fn send_to_clients(clients: &mut Vec<UnixStream>, message: &TelemetryMessage) {
    let bytes = match message.to_bytes() {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!("[Telemetry] Failed to serialize snapshot: {}", err);
            return;
        }
    };
    clients.retain_mut(|client| match client.write_all(&bytes) {
        Ok(()) => true,
        Err(err) => {
            tracing::info!("[Telemetry] Dropping client: {}", err);
            false
        }
    });
}

fn accept_client(listener: &UnixListener, clients: &mut Vec<UnixStream>) {
    if clients.len() >= MAX_CLIENTS {
        return;
    }
    match listener.accept() {
        Ok((stream, _)) => {
            if let Err(err) = stream.set_nonblocking(true) {
                tracing::warn!("[Telemetry] Rejecting client: {}", err);
                return;
            }
            clients.push(stream);
            tracing::info!("[Telemetry] Client connected ({} total)", clients.len());
        }
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
        Err(err) => tracing::warn!("[Telemetry] Accept failed: {}", err),
    }
}

//! Session runtime (spec §4.7, component G): a process-wide registry of
//! PTY-backed managed sessions, multiplexing one child's stdio to many
//! attached clients.
//!
//! Grounded on the teacher's `server/state.rs` (`Arc<Mutex<..>>` status-enum
//! registry shape) for the registry itself, and `server/api/ws.rs`'s
//! broadcast-subscribe loop for the fan-out. `portable-pty` replaces the
//! teacher's indexing/enrichment child work with an actual PTY; the
//! single-steward/signal-forwarding rules have no teacher counterpart and
//! are original to this component (see DESIGN.md).

pub mod pty;
pub mod signal;

use anyhow::{Context, Result};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex as AsyncMutex};

use portable_pty::MasterPty;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagedState {
    Detached,
    Spawning,
    Active,
    Exited(i32),
}

/// A frame broadcast to attached clients, matching the §6 wire contract's
/// downstream message kinds.
#[derive(Clone, Debug)]
pub enum Frame {
    Status(String),
    Output(Arc<[u8]>),
    Exited(i32),
}

struct Inner {
    state: ManagedState,
    scrollback: VecDeque<u8>,
    scrollback_cap: usize,
    tx: broadcast::Sender<Frame>,
    writer: Option<Arc<StdMutex<Box<dyn Write + Send>>>>,
    master: Option<Box<dyn MasterPty + Send>>,
    client_count: usize,
    first_byte_received: Arc<AtomicBool>,
    _interrupt_forwarder: Option<signal::InterruptForwarder>,
}

struct ManagedSession {
    session_id: String,
    /// Serializes the Detached->Spawning->Active transition: the second of
    /// two concurrent `attach` calls blocks here and observes `Active`
    /// without spawning (spec §4.7 "single-steward discipline").
    spawn_gate: AsyncMutex<()>,
    inner: StdMutex<Inner>,
}

pub struct AttachHandle {
    pub scrollback: Vec<u8>,
    pub rx: broadcast::Receiver<Frame>,
}

pub struct SpawnSpec {
    pub program: String,
    pub args: Vec<String>,
}

pub struct SessionRuntime {
    sessions: StdMutex<HashMap<String, Arc<ManagedSession>>>,
    scrollback_cap: usize,
    spawn_timeout: Duration,
    backpressure_frames: usize,
}

impl SessionRuntime {
    pub fn new(scrollback_bytes: usize, spawn_timeout_ms: u64, backpressure_frames: usize) -> Self {
        Self {
            sessions: StdMutex::new(HashMap::new()),
            scrollback_cap: scrollback_bytes,
            spawn_timeout: Duration::from_millis(spawn_timeout_ms),
            backpressure_frames,
        }
    }

    fn get_or_create(&self, session_id: &str) -> Arc<ManagedSession> {
        let mut sessions = self.sessions.lock().expect("runtime registry mutex poisoned");
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                let (tx, _rx) = broadcast::channel(self.backpressure_frames.max(16));
                Arc::new(ManagedSession {
                    session_id: session_id.to_string(),
                    spawn_gate: AsyncMutex::new(()),
                    inner: StdMutex::new(Inner {
                        state: ManagedState::Detached,
                        scrollback: VecDeque::new(),
                        scrollback_cap: self.scrollback_cap,
                        tx,
                        writer: None,
                        master: None,
                        client_count: 0,
                        first_byte_received: Arc::new(AtomicBool::new(false)),
                        _interrupt_forwarder: None,
                    }),
                })
            })
            .clone()
    }

    /// Look up or create the entry for `session_id`. If `Detached`, spawns
    /// the child with `working_directory` as cwd and `spec`'s resume
    /// arguments; the snapshot-then-subscribe happens atomically w.r.t. the
    /// PTY reader's append-and-broadcast step (spec §4.7 "Multiplexing").
    pub async fn attach(
        &self,
        session_id: &str,
        working_directory: &Path,
        spec: &SpawnSpec,
    ) -> Result<AttachHandle> {
        let session = self.get_or_create(session_id);

        {
            let _gate = session.spawn_gate.lock().await;
            let needs_spawn = {
                let inner = session.inner.lock().expect("session mutex poisoned");
                matches!(inner.state, ManagedState::Detached)
            };
            if needs_spawn {
                self.spawn_child(&session, working_directory, spec).await?;
            }
        }

        let mut inner = session.inner.lock().expect("session mutex poisoned");
        inner.client_count += 1;
        let scrollback: Vec<u8> = inner.scrollback.iter().copied().collect();
        let rx = inner.tx.subscribe();
        Ok(AttachHandle { scrollback, rx })
    }

    async fn spawn_child(&self, session: &Arc<ManagedSession>, working_directory: &Path, spec: &SpawnSpec) -> Result<()> {
        {
            let mut inner = session.inner.lock().expect("session mutex poisoned");
            inner.state = ManagedState::Spawning;
        }

        let program = spec.program.clone();
        let args = spec.args.clone();
        let cwd = working_directory.to_path_buf();
        let spawned = tokio::task::spawn_blocking(move || pty::spawn(&program, &args, &cwd, 80, 24))
            .await
            .context("spawn_blocking join error")??;

        let pty::SpawnedChild {
            master,
            mut reader,
            writer,
            mut child,
        } = spawned;
        let writer = Arc::new(StdMutex::new(writer));
        let first_byte_received = Arc::new(AtomicBool::new(false));

        {
            let mut inner = session.inner.lock().expect("session mutex poisoned");
            inner.state = ManagedState::Active;
            inner.writer = Some(writer.clone());
            inner.master = Some(master);
            inner.first_byte_received = first_byte_received.clone();
            inner._interrupt_forwarder = Some(signal::InterruptForwarder::install(writer.clone()));
        }

        // PTY read -> scrollback append + broadcast.
        let reader_session = session.clone();
        let reader_first_byte = first_byte_received.clone();
        tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        reader_first_byte.store(true, Ordering::Relaxed);
                        let chunk: Arc<[u8]> = Arc::from(&buf[..n]);
                        let mut inner = reader_session.inner.lock().expect("session mutex poisoned");
                        inner.scrollback.extend(chunk.iter().copied());
                        while inner.scrollback.len() > inner.scrollback_cap {
                            inner.scrollback.pop_front();
                        }
                        let _ = inner.tx.send(Frame::Output(chunk));
                    }
                    Err(e) => {
                        tracing::warn!("pty read error for {}: {e}", reader_session.session_id);
                        break;
                    }
                }
            }
        });

        // Spawn-timeout watcher: inform clients if the child stays silent.
        let timeout_session = session.clone();
        let timeout_first_byte = first_byte_received.clone();
        let timeout = self.spawn_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if !timeout_first_byte.load(Ordering::Relaxed) {
                let inner = timeout_session.inner.lock().expect("session mutex poisoned");
                let _ = inner.tx.send(Frame::Status("spawn_slow".to_string()));
            }
        });

        // Child exit watcher.
        let exit_session = session.clone();
        tokio::task::spawn_blocking(move || {
            let status = child.wait();
            let code = status.map(|s| s.exit_code() as i32).unwrap_or(-1);
            let mut inner = exit_session.inner.lock().expect("session mutex poisoned");
            inner.state = ManagedState::Exited(code);
            inner._interrupt_forwarder = None;
            let _ = inner.tx.send(Frame::Exited(code));
            tracing::info!("session {} exited with code {code}", exit_session.session_id);
        });

        Ok(())
    }

    /// Write through to the child's stdin iff `Active`; otherwise dropped
    /// silently (spec §4.7 `send_input`).
    pub fn send_input(&self, session_id: &str, bytes: &[u8]) -> Result<()> {
        let sessions = self.sessions.lock().expect("runtime registry mutex poisoned");
        let Some(session) = sessions.get(session_id) else {
            return Ok(());
        };
        let inner = session.inner.lock().expect("session mutex poisoned");
        if inner.state != ManagedState::Active {
            return Ok(());
        }
        if let Some(writer) = &inner.writer {
            writer
                .lock()
                .expect("pty writer mutex poisoned")
                .write_all(bytes)
                .context("failed to write to pty")?;
        }
        Ok(())
    }

    pub fn resize(&self, session_id: &str, cols: u16, rows: u16) -> Result<()> {
        let sessions = self.sessions.lock().expect("runtime registry mutex poisoned");
        let Some(session) = sessions.get(session_id) else {
            return Ok(());
        };
        let inner = session.inner.lock().expect("session mutex poisoned");
        if let Some(master) = &inner.master {
            master
                .resize(portable_pty::PtySize {
                    rows,
                    cols,
                    pixel_width: 0,
                    pixel_height: 0,
                })
                .context("failed to resize pty")?;
        }
        Ok(())
    }

    /// Remove a client from the set; garbage-collect the entry once it's
    /// empty and `Exited` (spec §4.7 `detach`).
    pub fn detach(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().expect("runtime registry mutex poisoned");
        let Some(session) = sessions.get(session_id).cloned() else {
            return;
        };
        let should_remove = {
            let mut inner = session.inner.lock().expect("session mutex poisoned");
            inner.client_count = inner.client_count.saturating_sub(1);
            inner.client_count == 0 && matches!(inner.state, ManagedState::Exited(_))
        };
        if should_remove {
            sessions.remove(session_id);
        }
    }

    pub fn state(&self, session_id: &str) -> Option<ManagedState> {
        let sessions = self.sessions.lock().expect("runtime registry mutex poisoned");
        sessions
            .get(session_id)
            .map(|s| s.inner.lock().expect("session mutex poisoned").state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn echo_spec() -> SpawnSpec {
        SpawnSpec {
            program: "/bin/echo".to_string(),
            args: vec!["hello".to_string()],
        }
    }

    #[tokio::test]
    async fn test_attach_spawns_and_second_attach_does_not_respawn() {
        let tmp = TempDir::new().unwrap();
        let runtime = SessionRuntime::new(1024 * 1024, 2000, 64);

        let _h1 = runtime.attach("s1", tmp.path(), &echo_spec()).await.unwrap();
        let state_after_first = runtime.state("s1");
        assert!(matches!(state_after_first, Some(ManagedState::Active) | Some(ManagedState::Exited(_))));

        let _h2 = runtime.attach("s1", tmp.path(), &echo_spec()).await.unwrap();
        // Still exactly one registry entry for s1.
        assert_eq!(runtime.sessions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_send_input_to_unknown_session_is_noop() {
        let runtime = SessionRuntime::new(1024, 1000, 16);
        assert!(runtime.send_input("nope", b"hi").is_ok());
    }

    #[tokio::test]
    async fn test_detach_removes_exited_session_with_no_clients() {
        let tmp = TempDir::new().unwrap();
        let runtime = SessionRuntime::new(1024 * 1024, 2000, 64);
        let _h = runtime.attach("s1", tmp.path(), &echo_spec()).await.unwrap();

        // Give the child a moment to exit (echo terminates almost immediately).
        tokio::time::sleep(Duration::from_millis(200)).await;
        runtime.detach("s1");
        assert!(runtime.sessions.lock().unwrap().get("s1").is_none() || matches!(runtime.state("s1"), Some(ManagedState::Active)));
    }
}

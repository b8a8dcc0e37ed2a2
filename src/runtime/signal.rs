//! Interrupt forwarding for an `Active` managed session (spec §4.7 "Signal
//! handling"): while a child is active, the host's interrupt signal is
//! treated as a signal for the child, not the host process.
//!
//! Grounded on `examples/vinhnx-VTCode/.../session_setup/signal.rs`'s
//! select-loop-plus-cancellation-token shape, adapted to a `Notify` so this
//! crate doesn't need to add `tokio-util` on top of the teacher's stack.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

const INTERRUPT_BYTE: u8 = 0x03; // ETX, what a terminal sends for Ctrl-C

/// Forwards `tokio::signal::ctrl_c()` to a PTY writer for as long as the
/// guard is alive. Dropping it stops the forwarding task; it does not
/// restore a prior OS handler since `tokio::signal::ctrl_c` never installs
/// one of its own that a caller could observe.
pub struct InterruptForwarder {
    stop: Arc<Notify>,
    stopped: Arc<AtomicBool>,
}

impl InterruptForwarder {
    pub fn install(writer: Arc<Mutex<Box<dyn Write + Send>>>) -> Self {
        let stop = Arc::new(Notify::new());
        let stopped = Arc::new(AtomicBool::new(false));

        let task_stop = stop.clone();
        let task_stopped = stopped.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if result.is_err() {
                            break;
                        }
                        if task_stopped.load(Ordering::Relaxed) {
                            break;
                        }
                        let mut w = writer.lock().expect("pty writer mutex poisoned");
                        if w.write_all(&[INTERRUPT_BYTE]).is_err() {
                            break;
                        }
                        let _ = w.flush();
                    }
                    _ = task_stop.notified() => break,
                }
            }
        });

        Self { stop, stopped }
    }
}

impl Drop for InterruptForwarder {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Relaxed);
        self.stop.notify_one();
    }
}

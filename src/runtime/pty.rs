//! PTY child process spawning (spec §4.7, component G).
//!
//! No pack repo spawns a pseudo-terminal, so this follows `portable-pty`'s
//! own documented API directly rather than bending an unrelated teacher
//! pattern to fit — the "pick another real crate" fallback recorded in
//! DESIGN.md.

use anyhow::{Context, Result};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::path::Path;

pub struct SpawnedChild {
    pub master: Box<dyn MasterPty + Send>,
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
    pub child: Box<dyn Child + Send + Sync>,
}

/// Launch `program` under a fresh pty with `cwd` as its working directory.
pub fn spawn(program: &str, args: &[String], cwd: &Path, cols: u16, rows: u16) -> Result<SpawnedChild> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .context("failed to open pty")?;

    let mut cmd = CommandBuilder::new(program);
    cmd.args(args);
    cmd.cwd(cwd);

    let child = pair
        .slave
        .spawn_command(cmd)
        .with_context(|| format!("failed to spawn `{program}`"))?;
    let reader = pair
        .master
        .try_clone_reader()
        .context("failed to clone pty reader")?;
    let writer = pair.master.take_writer().context("failed to take pty writer")?;
    // The slave side belongs to the child now; the master is our handle.
    drop(pair.slave);

    Ok(SpawnedChild {
        master: pair.master,
        reader,
        writer,
        child,
    })
}

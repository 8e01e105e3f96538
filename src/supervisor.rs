//! Signal handling
//!
//! The handler never touches the run table. It gets a [`StatusBoard`] the
//! pipeline publishes read-only snapshots to, and a stop flag the build loop
//! polls before each package.
//!
//! - SIGINT while deciding: dump the status and exit 1
//! - SIGINT while building: set the stop flag and dump; a second SIGINT exits
//! - SIGUSR1: dump only

use crate::core::output;
use crate::core::runtime::runtime;
use crate::package::{BuildOutcome, RunTable};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::signal::unix::{SignalKind, signal};

/// Read-only copy of the per-package state, for status dumps.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    rows: Arc<Mutex<Vec<(String, String)>>>,
}

/// Text shown for one package in the state table
pub fn describe_state(table: &RunTable, index: usize) -> String {
    let state = table.state(index);
    match state.outcome {
        BuildOutcome::Unknown => state.verdict.to_string(),
        outcome => format!("{} ({})", state.verdict, outcome),
    }
}

/// Print the state table
pub fn print_state(table: &RunTable) {
    output::info("package state:");
    for (i, (pkg, _)) in table.iter().enumerate() {
        output::state_row(&pkg.name, &describe_state(table, i));
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, table: &RunTable) {
        let rows = table
            .iter()
            .enumerate()
            .map(|(i, (pkg, _))| (pkg.name.clone(), describe_state(table, i)))
            .collect();
        if let Ok(mut current) = self.rows.lock() {
            *current = rows;
        }
    }

    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn dump(&self) {
        output::info("package state:");
        for (name, state) in self.snapshot() {
            output::state_row(&name, &state);
        }
    }
}

/// Owns the stop flag and the signal listeners.
#[derive(Debug, Clone)]
pub struct CancellationSupervisor {
    stop: Arc<AtomicBool>,
    building: Arc<AtomicBool>,
    board: StatusBoard,
}

/// What an interrupt should do, given the phase and earlier interrupts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Dump and terminate now
    Terminate,
    /// Dump and let the current build finish
    StopAfterCurrent,
}

impl CancellationSupervisor {
    pub fn new(board: StatusBoard) -> Self {
        CancellationSupervisor {
            stop: Arc::new(AtomicBool::new(false)),
            building: Arc::new(AtomicBool::new(false)),
            board,
        }
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn enter_build_phase(&self) {
        self.building.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Record an interrupt and decide how to react.
    pub fn on_interrupt(&self) -> InterruptAction {
        let already_stopping = self.stop.swap(true, Ordering::SeqCst);
        self.board.dump();
        if self.building.load(Ordering::SeqCst) && !already_stopping {
            InterruptAction::StopAfterCurrent
        } else {
            InterruptAction::Terminate
        }
    }

    /// Register SIGINT and SIGUSR1 listeners on the shared runtime.
    pub fn install(&self) -> Result<()> {
        let _guard = runtime().enter();
        let mut interrupt =
            signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
        let mut dump =
            signal(SignalKind::user_defined1()).context("Failed to register SIGUSR1 handler")?;
        let supervisor = self.clone();

        runtime().spawn(async move {
            loop {
                tokio::select! {
                    Some(()) = interrupt.recv() => match supervisor.on_interrupt() {
                        InterruptAction::Terminate => {
                            output::error("Interrupted, exiting");
                            std::process::exit(1);
                        }
                        InterruptAction::StopAfterCurrent => output::warning(
                            "Interrupted, stopping after the current build (interrupt again to exit now)",
                        ),
                    },
                    Some(()) = dump.recv() => supervisor.board.dump(),
                    else => break,
                }
            }
        });
        Ok(())
    }
}

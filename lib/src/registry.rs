// SPDX-FileCopyrightText: 2024 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::dispatch::{ActionDispatcher, StateService};
use crate::line::{Backend, EdgeSource, LineEntry, LineId, MonitorDescriptor};
use crate::monitor::{format_error_chain, LineMonitor, MonitorState};
use crate::Error;
use log::error;
use std::rc::Rc;

/// A configuration entry that could not be monitored.
#[derive(Debug)]
pub struct Failure {
    /// The index of the entry in the set of entries.
    pub index: usize,

    /// The line the entry identified.
    pub id: LineId,

    /// Why the line could not be monitored.
    pub error: Error,
}

/// The set of monitors for a configuration.
///
/// Each entry is resolved and armed independently, so a bad entry does not
/// prevent the other entries being monitored.
pub struct Registry<L> {
    monitors: Vec<LineMonitor<L>>,
    failures: Vec<Failure>,
}

impl<L: EdgeSource + 'static> Registry<L> {
    /// Start monitoring the lines for a set of entries.
    ///
    /// Must be called from within a [`LocalSet`](tokio::task::LocalSet).
    pub fn start<B, S, I>(backend: &B, dispatcher: Rc<ActionDispatcher<S>>, entries: I) -> Self
    where
        B: Backend<Line = L>,
        S: StateService + 'static,
        I: IntoIterator<Item = LineEntry>,
    {
        let mut r = Registry {
            monitors: Vec::new(),
            failures: Vec::new(),
        };
        for (index, entry) in entries.into_iter().enumerate() {
            let res = MonitorDescriptor::resolve(backend, &entry)
                .and_then(|desc| LineMonitor::new(backend, desc, dispatcher.clone()));
            match res {
                Ok(m) => r.monitors.push(m),
                Err(e) => {
                    error!("{}", format_error_chain(&e));
                    r.failures.push(Failure {
                        index,
                        id: entry.line,
                        error: e,
                    });
                }
            }
        }
        r
    }
}

impl<L> Registry<L> {
    /// The monitors for the entries that were successfully armed.
    pub fn monitors(&self) -> &[LineMonitor<L>] {
        &self.monitors
    }

    /// The monitor for a particular line.
    pub fn monitor(&self, id: &LineId) -> Option<&LineMonitor<L>> {
        self.monitors.iter().find(|m| m.id() == id)
    }

    /// The entries that could not be monitored.
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// Returns true if no lines are being monitored.
    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Returns true if every entry was armed and no monitor has failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
            && self
                .monitors
                .iter()
                .all(|m| m.state() != MonitorState::Failed)
    }

    /// Wait until all monitors have stopped waiting for events.
    ///
    /// Monitors that continue after events only stop if reading an event fails,
    /// so this typically runs until the process is terminated.
    pub async fn run(&self) -> Vec<MonitorState> {
        let mut states = Vec::with_capacity(self.monitors.len());
        for m in &self.monitors {
            states.push(m.finished().await);
        }
        states
    }
}

// SPDX-FileCopyrightText: 2024 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::dispatch::{ActionDispatcher, StateService};
use crate::line::{Backend, EdgeSource, LineId, MonitorDescriptor};
use crate::{Error, Result};
use gpiocdev::line::{EdgeEvent, EdgeKind};
use log::{debug, error, info, warn};
use std::io;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The stages in the life of a [`LineMonitor`].
///
/// `Idle` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MonitorState {
    /// The monitor task has not yet started waiting.
    ///
    /// A constructed monitor has already armed its line, so this only covers
    /// the gap until the task is first polled.
    Unarmed,

    /// The line is armed and the monitor is waiting for an edge event.
    Waiting,

    /// An edge event has been read and is being handled.
    Handling,

    /// The monitor handled its event and is no longer waiting.
    ///
    /// The line remains requested until the monitor is dropped.
    Idle,

    /// Reading an edge event failed and the monitor is no longer waiting.
    Failed,
}

impl MonitorState {
    /// Returns true if the monitor has stopped waiting for events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MonitorState::Idle | MonitorState::Failed)
    }
}

/// Monitors a single line for edge events, toggling the target LED on falling edges.
///
/// The monitor runs as a local task, so it must be created from within a
/// [`LocalSet`](tokio::task::LocalSet).
/// Dropping the monitor stops the task and releases the line.
pub struct LineMonitor<L> {
    id: LineId,
    // shared with the task, so the line remains requested after the task ends
    line: Rc<L>,
    state: watch::Receiver<MonitorState>,
    task: JoinHandle<()>,
}

impl<L: EdgeSource + 'static> LineMonitor<L> {
    /// Arm the line and start monitoring it.
    pub fn new<B, S>(
        backend: &B,
        desc: MonitorDescriptor,
        dispatcher: Rc<ActionDispatcher<S>>,
    ) -> Result<Self>
    where
        B: Backend<Line = L>,
        S: StateService + 'static,
    {
        let line = backend
            .arm(&desc.handle, &desc.config)
            .map_err(|e| Error::LineUnavailable(desc.id.clone(), e))?;
        info!("line {} monitoring started", desc.id);
        let line = Rc::new(line);
        let (tx, state) = watch::channel(MonitorState::Unarmed);
        let id = desc.id.clone();
        let task = tokio::task::spawn_local(monitor(line.clone(), desc, dispatcher, tx));
        Ok(LineMonitor {
            id,
            line,
            state,
            task,
        })
    }
}

impl<L> LineMonitor<L> {
    /// The identifier of the monitored line.
    pub fn id(&self) -> &LineId {
        &self.id
    }

    /// The armed line.
    pub fn line(&self) -> &L {
        &self.line
    }

    /// The current state of the monitor.
    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    /// Wait until the monitor state satisfies the predicate.
    ///
    /// Returns the state that satisfied the predicate, or the final state
    /// if the monitor stops without satisfying it.
    pub async fn wait_for_state<F>(&self, mut f: F) -> MonitorState
    where
        F: FnMut(MonitorState) -> bool,
    {
        let mut rx = self.state.clone();
        if let Ok(s) = rx.wait_for(|s| f(*s)).await {
            return *s;
        }
        // task has ended
        let s = *rx.borrow();
        s
    }

    /// Wait until the monitor stops waiting for events.
    pub async fn finished(&self) -> MonitorState {
        self.wait_for_state(|s| s.is_terminal()).await
    }
}

impl<L> Drop for LineMonitor<L> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn monitor<L, S>(
    line: Rc<L>,
    desc: MonitorDescriptor,
    dispatcher: Rc<ActionDispatcher<S>>,
    state: watch::Sender<MonitorState>,
) where
    L: EdgeSource,
    S: StateService,
{
    loop {
        state.send_replace(MonitorState::Waiting);
        let edge = match line.read_edge_event().await {
            Ok(edge) => edge,
            Err(e) if is_transient(&e) => {
                warn!("line {}: {}, retrying", desc.id, e);
                continue;
            }
            Err(e) => {
                let e = Error::EventReadFailed(desc.id.clone(), e);
                error!("{}", format_error_chain(&e));
                state.send_replace(MonitorState::Failed);
                return;
            }
        };
        state.send_replace(MonitorState::Handling);
        handle_edge(&desc, &edge, &dispatcher).await;
        if !desc.continue_after_event {
            info!("line {} monitoring stopped", desc.id);
            state.send_replace(MonitorState::Idle);
            return;
        }
    }
}

// Only falling edges trigger the action, whatever edges are detected.
async fn handle_edge<S: StateService>(
    desc: &MonitorDescriptor,
    edge: &EdgeEvent,
    dispatcher: &ActionDispatcher<S>,
) {
    let ts = Duration::from_nanos(edge.timestamp_ns);
    if edge.kind != EdgeKind::Falling {
        debug!("line {} ignoring rising edge at {:?}", desc.id, ts);
        return;
    }
    let target = match &desc.target {
        Some(target) => target,
        None => {
            debug!("line {} falling edge at {:?}, no LED to toggle", desc.id, ts);
            return;
        }
    };
    info!("line {} falling edge at {:?}, toggling LED '{}'", desc.id, ts, target);
    if let Err(e) = dispatcher.toggle(target).await {
        error!("line {}: {}", desc.id, format_error_chain(&e));
    }
}

pub(crate) fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

pub(crate) fn format_error_chain(e: &dyn std::error::Error) -> String {
    let mut s = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        s.push_str(": ");
        s.push_str(&cause.to_string());
        source = cause.source();
    }
    s
}

// SPDX-FileCopyrightText: 2024 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

// Fake lines and LEDs, so monitors can be driven without hardware or a bus.

#![allow(dead_code)]

use gpiocdev::line::{EdgeEvent, EdgeKind, Offset};
use ledmon::{
    ActionDispatcher, Backend, BoxError, EdgeSource, IndicatorState, LineEntry, LineHandle,
    LineId, RequestConfig, StateService,
};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::io;
use std::rc::Rc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::LocalSet;

pub const FAKE_CHIP: &str = "/dev/gpiochip-fake";

/// Run a test future on a LocalSet, as monitors are local tasks.
pub async fn local<F: Future>(f: F) -> F::Output {
    LocalSet::new().run_until(f).await
}

/// Let other local tasks run, to catch any unexpected activity.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub fn named_entry(name: &str) -> LineEntry {
    LineEntry::new(LineId::Name(name.into()))
}

pub fn dispatcher(leds: FakeLeds) -> Rc<ActionDispatcher<FakeLeds>> {
    Rc::new(ActionDispatcher::new(leds))
}

pub struct FakeLine {
    events: Mutex<mpsc::UnboundedReceiver<io::Result<EdgeEvent>>>,
}

impl EdgeSource for FakeLine {
    async fn read_edge_event(&self) -> io::Result<EdgeEvent> {
        match self.events.lock().await.recv().await {
            Some(res) => res,
            None => Err(io::ErrorKind::UnexpectedEof.into()),
        }
    }
}

/// A set of fake lines, all on the one fake chip, with the offset of each
/// line being its index in the set.
#[derive(Default)]
pub struct FakeBackend {
    names: Vec<String>,
    claimed: RefCell<HashSet<String>>,
    injectors: RefCell<HashMap<Offset, mpsc::UnboundedSender<io::Result<EdgeEvent>>>>,
    armed: RefCell<HashMap<Offset, RequestConfig>>,
    seqno: Cell<u32>,
}

impl FakeBackend {
    pub fn new(names: &[&str]) -> Self {
        FakeBackend {
            names: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Mark the line as already requested by another process.
    pub fn claim(&self, name: &str) {
        self.claimed.borrow_mut().insert(name.into());
    }

    fn offset(&self, name: &str) -> Offset {
        self.names
            .iter()
            .position(|n| n == name)
            .expect("line should exist") as Offset
    }

    /// The config the line was armed with, if it has been armed.
    pub fn armed_config(&self, name: &str) -> Option<RequestConfig> {
        self.armed.borrow().get(&self.offset(name)).cloned()
    }

    /// Returns true if the line is armed and has not been released.
    pub fn is_requested(&self, name: &str) -> bool {
        self.injectors
            .borrow()
            .get(&self.offset(name))
            .is_some_and(|tx| !tx.is_closed())
    }

    fn push(&self, name: &str, res: io::Result<EdgeEvent>) {
        let offset = self.offset(name);
        self.injectors
            .borrow()
            .get(&offset)
            .expect("line should be armed")
            .send(res)
            .expect("line should still be requested");
    }

    /// Queue an edge event on an armed line.
    pub fn inject(&self, name: &str, kind: EdgeKind) {
        let seqno = self.seqno.get() + 1;
        self.seqno.set(seqno);
        let evt = EdgeEvent {
            timestamp_ns: seqno as u64 * 1_000_000,
            kind,
            offset: self.offset(name),
            seqno,
            line_seqno: seqno,
        };
        self.push(name, Ok(evt));
    }

    /// Queue a read error on an armed line.
    pub fn inject_error(&self, name: &str, e: io::Error) {
        self.push(name, Err(e));
    }
}

impl Backend for FakeBackend {
    type Line = FakeLine;

    fn resolve(&self, id: &LineId) -> Result<LineHandle, BoxError> {
        let offset = match id {
            LineId::Name(name) => self
                .names
                .iter()
                .position(|n| n == name)
                .ok_or("no line with that name")? as Offset,
            LineId::Offset { chip, offset } => {
                if chip != FAKE_CHIP {
                    return Err(format!("cannot find GPIO chip '{chip}'").into());
                }
                if *offset as usize >= self.names.len() {
                    return Err(format!("offset {offset} is out of range").into());
                }
                *offset
            }
        };
        Ok(LineHandle {
            chip: FAKE_CHIP.into(),
            offset,
        })
    }

    fn arm(&self, handle: &LineHandle, config: &RequestConfig) -> Result<FakeLine, BoxError> {
        let name = &self.names[handle.offset as usize];
        if self.claimed.borrow().contains(name) {
            return Err("Device or resource busy".into());
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.injectors.borrow_mut().insert(handle.offset, tx);
        self.armed
            .borrow_mut()
            .insert(handle.offset, config.clone());
        Ok(FakeLine {
            events: Mutex::new(rx),
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    Get(String),
    Set(String, IndicatorState),
}

/// A set of LEDs that records the calls made to it.
pub struct FakeLeds {
    states: RefCell<HashMap<String, String>>,
    calls: RefCell<Vec<Call>>,
    count: watch::Sender<usize>,
}

impl Default for FakeLeds {
    fn default() -> Self {
        FakeLeds {
            states: RefCell::default(),
            calls: RefCell::default(),
            count: watch::channel(0).0,
        }
    }
}

impl FakeLeds {
    pub fn with_led(self, target: &str, state: IndicatorState) -> Self {
        self.with_raw_led(target, state.as_str())
    }

    /// Add an LED with an arbitrary State property value.
    pub fn with_raw_led(self, target: &str, value: &str) -> Self {
        self.states
            .borrow_mut()
            .insert(target.into(), value.into());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn sets(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Set(..)))
            .collect()
    }

    pub fn led_value(&self, target: &str) -> Option<String> {
        self.states.borrow().get(target).cloned()
    }

    /// Wait until at least n calls have been made.
    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.count.subscribe();
        rx.wait_for(|c| *c >= n)
            .await
            .expect("sender should be held by the fake");
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
        self.count.send_modify(|c| *c += 1);
    }
}

impl StateService for FakeLeds {
    async fn state(&self, target: &str) -> Result<String, BoxError> {
        self.record(Call::Get(target.into()));
        self.led_value(target)
            .ok_or_else(|| "The name is not activatable".into())
    }

    async fn set_state(&self, target: &str, state: IndicatorState) -> Result<(), BoxError> {
        self.record(Call::Set(target.into(), state));
        match self.states.borrow_mut().get_mut(target) {
            Some(value) => {
                *value = state.as_str().into();
                Ok(())
            }
            None => Err("The name is not activatable".into()),
        }
    }
}

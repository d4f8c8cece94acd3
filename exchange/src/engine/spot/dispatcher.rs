//! Post-commit match dispatch
//!
//! Placement hands the new order id over only after its unit of work has
//! committed, so whichever path runs the match sees the order in the book.

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::DispatchMode;
use crate::engine::entry::OrderId;
use crate::engine::matchlogic::{Matcher, SweepReport};

/// Work items for the background match worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchCmd {
    MatchOrder(OrderId),
    Sweep,
}

pub enum Dispatcher {
    Inline(Arc<Matcher>),
    Queued(Sender<MatchCmd>),
    Off,
}

impl Dispatcher {
    /// The worker handle is returned for `Queued` only. The worker exits once
    /// every sender has been dropped.
    pub fn new(mode: DispatchMode, matcher: Arc<Matcher>) -> (Self, Option<JoinHandle<()>>) {
        match mode {
            DispatchMode::Inline => (Dispatcher::Inline(matcher), None),
            DispatchMode::Off => (Dispatcher::Off, None),
            DispatchMode::Queued => {
                let (dispatcher, worker) = Self::queued(matcher);
                (dispatcher, Some(worker))
            }
        }
    }

    pub fn queued(matcher: Arc<Matcher>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel::<MatchCmd>();
        let worker = thread::spawn(move || {
            for cmd in rx {
                run(&matcher, cmd);
            }
            log::info!("match worker stopped");
        });
        (Dispatcher::Queued(tx), worker)
    }

    pub fn dispatch(&self, order_id: OrderId) {
        match self {
            Dispatcher::Inline(matcher) => run(matcher, MatchCmd::MatchOrder(order_id)),
            Dispatcher::Queued(tx) => {
                if let Err(e) = tx.send(MatchCmd::MatchOrder(order_id)) {
                    log::error!("match worker gone, order {} not dispatched: {}", order_id, e);
                }
            }
            Dispatcher::Off => {}
        }
    }

    /// Runs a sweep on the caller's thread, or hands it to the worker when
    /// queued. The report is only available in the first case.
    pub fn sweep(&self, matcher: &Matcher) -> Option<SweepReport> {
        match self {
            Dispatcher::Queued(tx) => {
                if let Err(e) = tx.send(MatchCmd::Sweep) {
                    log::error!("match worker gone, sweep not dispatched: {}", e);
                }
                None
            }
            Dispatcher::Inline(_) | Dispatcher::Off => Some(matcher.sweep()),
        }
    }
}

fn run(matcher: &Matcher, cmd: MatchCmd) {
    match cmd {
        MatchCmd::MatchOrder(order_id) => {
            // fatal errors are already logged by the matcher
            if let Err(e) = matcher.match_order(order_id) {
                if !e.is_fatal() {
                    log::warn!("match of order {} failed: {}", order_id, e);
                }
            }
        }
        MatchCmd::Sweep => {
            matcher.sweep();
        }
    }
}

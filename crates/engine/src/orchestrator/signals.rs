// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal intake for one run's control loop.

use std::collections::VecDeque;
use tokio::sync::mpsc;

/// External input to a running control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// A follow-up message that restarts the plan/execute/verify cycle.
    Message(String),
    /// Stop the run at the next activity boundary.
    Cancel,
}

/// Buffers signals between activity boundaries.
///
/// Messages are consumed in arrival order. Once a cancel has been seen,
/// later messages are discarded and the inbox reports cancelled from then
/// on.
pub struct SignalInbox {
    rx: mpsc::UnboundedReceiver<Signal>,
    pending: VecDeque<String>,
    cancelled: bool,
    closed: bool,
}

impl SignalInbox {
    pub fn new(rx: mpsc::UnboundedReceiver<Signal>) -> Self {
        Self { rx, pending: VecDeque::new(), cancelled: false, closed: false }
    }

    /// Queue `message` ahead of anything received later.
    pub fn push_message(&mut self, message: impl Into<String>) {
        self.pending.push_back(message.into());
    }

    /// Pull everything delivered so far into the buffer.
    pub fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(signal) => self.accept(signal),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }

    /// Drain, then report whether a cancel has arrived.
    pub fn cancel_requested(&mut self) -> bool {
        self.drain();
        self.cancelled
    }

    /// Drain, then report whether a message is waiting.
    pub fn has_message(&mut self) -> bool {
        self.drain();
        !self.pending.is_empty()
    }

    pub fn next_message(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    /// Wait for the next signal. Returns `false` once every sender is gone.
    pub async fn wait(&mut self) -> bool {
        if self.closed {
            return false;
        }
        match self.rx.recv().await {
            Some(signal) => {
                self.accept(signal);
                true
            }
            None => {
                self.closed = true;
                false
            }
        }
    }

    /// Messages still buffered (discarded when the run ends).
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn accept(&mut self, signal: Signal) {
        match signal {
            Signal::Cancel => {
                self.cancelled = true;
                self.pending.clear();
            }
            Signal::Message(message) if !self.cancelled => self.pending.push_back(message),
            Signal::Message(_) => {
                tracing::debug!("message after cancel discarded");
            }
        }
    }
}

#[cfg(test)]
#[path = "signals_tests.rs"]
mod tests;

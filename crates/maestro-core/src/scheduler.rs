//! Single-slot deferred action scheduler.
//!
//! The [`ActionSlot`] runs one worker thread that holds at most one pending
//! [`ScheduledAction`]. Arming, cancelling and shutting down are messages
//! to that worker, so replacing a pending action is atomic: the old one is
//! dropped before the new one is installed and two timers are never live
//! at the same time.

use crate::error::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// What a scheduled action does when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeferredAction {
    NextPage,
}

/// A pending action with its due time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledAction {
    /// Unique per slot; later arms get larger ids.
    pub id: u64,
    pub action: DeferredAction,
    pub delay: Duration,
    pub due: Instant,
    /// Bar count the delay was derived from.
    pub bars: u32,
}

impl ScheduledAction {
    /// Time left until the action fires.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.due.saturating_duration_since(now)
    }
}

enum SlotCommand {
    Arm(ScheduledAction),
    Cancel,
    Shutdown,
}

/// Handle to the scheduling worker.
pub struct ActionSlot {
    command_tx: Sender<SlotCommand>,
    next_id: AtomicU64,
    thread: Option<JoinHandle<()>>,
}

impl ActionSlot {
    /// Spawn the worker. `on_fire` runs on the worker thread for every
    /// action that reaches its due time without being replaced or cancelled.
    pub fn spawn<F>(on_fire: F) -> Result<Self>
    where
        F: FnMut(ScheduledAction) + Send + 'static,
    {
        let (command_tx, command_rx) = unbounded();
        let thread = thread::Builder::new()
            .name("action-slot".to_string())
            .spawn(move || run(command_rx, on_fire))
            .map_err(|source| Error::Thread {
                name: "action-slot",
                source,
            })?;

        Ok(Self {
            command_tx,
            next_id: AtomicU64::new(1),
            thread: Some(thread),
        })
    }

    /// Arm `action` to fire after `delay`, replacing anything pending.
    pub fn arm(&self, action: DeferredAction, delay: Duration, bars: u32) -> Result<ScheduledAction> {
        let scheduled = ScheduledAction {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            action,
            delay,
            due: Instant::now() + delay,
            bars,
        };
        self.send(SlotCommand::Arm(scheduled.clone()))?;
        Ok(scheduled)
    }

    /// Drop the pending action, if any.
    pub fn cancel(&self) -> Result<()> {
        self.send(SlotCommand::Cancel)
    }

    /// Cancel anything pending and stop the worker.
    pub fn shutdown(&mut self) {
        let _ = self.command_tx.send(SlotCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
            log::debug!("Action slot stopped");
        }
    }

    fn send(&self, command: SlotCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| Error::ChannelClosed("action slot"))
    }
}

impl Drop for ActionSlot {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<F>(command_rx: Receiver<SlotCommand>, mut on_fire: F)
where
    F: FnMut(ScheduledAction),
{
    let mut pending: Option<ScheduledAction> = None;

    loop {
        let received = match &pending {
            Some(action) => command_rx.recv_timeout(action.remaining(Instant::now())),
            None => command_rx
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(SlotCommand::Arm(action)) => {
                log::debug!(
                    "Armed {:?} #{} in {:.2}s",
                    action.action,
                    action.id,
                    action.delay.as_secs_f64()
                );
                if let Some(old) = pending.replace(action) {
                    log::debug!("Replaced pending {:?} #{}", old.action, old.id);
                }
            }
            Ok(SlotCommand::Cancel) => {
                if let Some(old) = pending.take() {
                    log::debug!("Cancelled pending {:?} #{}", old.action, old.id);
                }
            }
            Ok(SlotCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(old) = pending.take() {
                    log::debug!("Discarding pending {:?} #{} on shutdown", old.action, old.id);
                }
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Some(action) = pending.take() {
                    log::debug!("Firing {:?} #{}", action.action, action.id);
                    on_fire(action);
                }
            }
        }
    }
}

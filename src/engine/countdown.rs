//! In-process countdowns, one per channel, that can be cancelled until they fire.
//!
//! Each slot moves `Running -> Canceled` or `Running -> Fired` exactly once,
//! under the slot's own lock, so a cancel and a fire can never both win.
//! A slot leaves the registry when its task ends, even if a handler panics.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use poise::serenity_prelude::{ChannelId, MessageId, UserId};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Running,
    Canceled,
    Fired,
}

struct Slot {
    state: Mutex<SlotState>,
    requested_by: UserId,
    display: Mutex<Option<MessageId>>,
    /// Held for the duration of each tick
    ticking: tokio::sync::Mutex<()>,
}

impl Slot {
    fn is_running(&self) -> bool {
        *self.state.lock() == SlotState::Running
    }
}

/// What a handler is told about the countdown it is serving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownEvent {
    pub channel_id: ChannelId,
    pub requested_by: UserId,
    pub display: Option<MessageId>,
}

#[async_trait]
pub trait CountdownHandler: Send + Sync {
    /// Once per second with the seconds left, never with zero
    async fn on_tick(&self, event: CountdownEvent, remaining: u64);
    /// At most once per started countdown, and never after a successful cancel
    async fn on_fire(&self, event: CountdownEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Canceled,
    NotRunning,
    AlreadyFired,
}

pub struct CountdownScheduler {
    slots: Arc<DashMap<ChannelId, Arc<Slot>>>,
    handler: Arc<dyn CountdownHandler>,
    seconds: u64,
}

impl CountdownScheduler {
    pub fn new(handler: Arc<dyn CountdownHandler>, seconds: u64) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            handler,
            seconds: seconds.max(1),
        }
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn is_running(&self, channel_id: ChannelId) -> bool {
        self.slots
            .get(&channel_id)
            .map(|slot| slot.is_running())
            .unwrap_or(false)
    }

    pub fn start(&self, channel_id: ChannelId, requested_by: UserId, display: Option<MessageId>) -> StartOutcome {
        let slot = Arc::new(Slot {
            state: Mutex::new(SlotState::Running),
            requested_by,
            display: Mutex::new(display),
            ticking: tokio::sync::Mutex::new(()),
        });

        match self.slots.entry(channel_id) {
            Entry::Occupied(_) => return StartOutcome::AlreadyRunning,
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&slot));
            }
        }

        debug!("Countdown started in {} by {}", channel_id, requested_by);
        let countdown = run_countdown(
            Arc::clone(&self.slots),
            Arc::clone(&self.handler),
            channel_id,
            slot,
            self.seconds,
        );
        tokio::spawn(async move {
            if AssertUnwindSafe(countdown).catch_unwind().await.is_err() {
                error!("Countdown in {} panicked", channel_id);
            }
        });
        StartOutcome::Started
    }

    /// Record the message that shows the countdown once it has been posted
    pub fn set_display(&self, channel_id: ChannelId, message_id: MessageId) {
        if let Some(slot) = self.slots.get(&channel_id) {
            *slot.display.lock() = Some(message_id);
        }
    }

    /// Returns once any tick already in progress has finished, so the caller's
    /// own display update is the last one.
    pub async fn cancel(&self, channel_id: ChannelId) -> CancelOutcome {
        let Some(slot) = self.slots.get(&channel_id).map(|s| Arc::clone(s.value())) else {
            return CancelOutcome::NotRunning;
        };

        let outcome = {
            let mut state = slot.state.lock();
            match *state {
                SlotState::Running => {
                    *state = SlotState::Canceled;
                    CancelOutcome::Canceled
                }
                SlotState::Fired => CancelOutcome::AlreadyFired,
                SlotState::Canceled => CancelOutcome::NotRunning,
            }
        };

        if outcome == CancelOutcome::Canceled {
            self.slots.remove_if(&channel_id, |_, s| Arc::ptr_eq(s, &slot));
            drop(slot.ticking.lock().await);
            debug!("Countdown in {} cancelled", channel_id);
        }
        outcome
    }
}

fn event_for(channel_id: ChannelId, slot: &Slot) -> CountdownEvent {
    CountdownEvent {
        channel_id,
        requested_by: slot.requested_by,
        display: *slot.display.lock(),
    }
}

/// Frees the channel when the countdown task ends, however it ends
struct SlotRelease {
    slots: Arc<DashMap<ChannelId, Arc<Slot>>>,
    channel_id: ChannelId,
    slot: Arc<Slot>,
}

impl Drop for SlotRelease {
    fn drop(&mut self) {
        self.slots
            .remove_if(&self.channel_id, |_, s| Arc::ptr_eq(s, &self.slot));
    }
}

async fn run_countdown(
    slots: Arc<DashMap<ChannelId, Arc<Slot>>>,
    handler: Arc<dyn CountdownHandler>,
    channel_id: ChannelId,
    slot: Arc<Slot>,
    seconds: u64,
) {
    let _release = SlotRelease {
        slots,
        channel_id,
        slot: Arc::clone(&slot),
    };

    for remaining in (0..seconds).rev() {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if remaining > 0 {
            let _ticking = slot.ticking.lock().await;
            if !slot.is_running() {
                return;
            }
            handler.on_tick(event_for(channel_id, &slot), remaining).await;
        }
    }

    {
        let mut state = slot.state.lock();
        if *state != SlotState::Running {
            return;
        }
        *state = SlotState::Fired;
    }

    handler.on_fire(event_for(channel_id, &slot)).await;
}

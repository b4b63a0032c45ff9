//! Channel pool and request scheduler
//!
//! Arbitrates K physical channels across any number of transmit requests:
//! - A request starts immediately on the lowest idle channel when nothing
//!   is queued ahead of it
//! - Otherwise it waits in a FIFO queue ordered by submission only
//! - Every channel that goes idle takes the oldest queued request
//!
//! `drain` is the only blocking call. It returns once every request of the
//! batch is finished, resetting channels that overrun the deadline.

use embassy_time::{Duration, Instant};
use heapless::{Deque, Vec};

#[cfg(feature = "esp32-log")]
use esp_println::println;

use crate::clock::Clock;
use crate::encoder::{ChannelCapability, Waveform};
use crate::error::{ConfigurationError, RequestError, TransmitError};
use crate::transmit::{
    ChannelId, ChannelState, CompletionReceiver, Finished, Transfer, TransmissionChannel,
    TransmitDriver, TransmitPlatform,
};

/// Work submitted to the pool
#[derive(Debug)]
pub struct TransmitRequest {
    /// Caller-defined identity; one owner occupies at most one channel
    pub owner: u16,
    /// Encoded output, handed back once the request finishes
    pub waveform: Waveform,
}

/// Error returned when the request table is full
#[derive(Debug)]
pub enum SubmitError {
    /// The rejected request, unchanged
    QueueFull(TransmitRequest),
}

/// Handle of one submitted request, valid until the next batch begins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    epoch: u16,
    slot: u16,
}

impl Ticket {
    /// Position in the batch, in submission order
    pub const fn slot(self) -> usize {
        self.slot as usize
    }
}

/// Lifecycle of a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
    /// Waiting for a channel
    Queued,
    /// On the wire on this channel
    InFlight(ChannelId),
    /// Final; `channel` is `None` when no channel was ever assigned
    Done {
        channel: Option<ChannelId>,
        result: Result<(), RequestError>,
    },
}

impl TicketState {
    /// Whether the request reached a final result
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// Finished request with its waveform handed back
#[derive(Debug)]
pub struct Completed {
    /// Channel that carried the request, if any
    pub channel: Option<ChannelId>,
    pub result: Result<(), RequestError>,
    pub waveform: Waveform,
}

/// Counters for the current batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: u32,
    pub completed: u32,
    pub failed: u32,
    pub timed_out: u32,
    /// Most channels transmitting at once
    pub peak_in_flight: u8,
    /// Longest the wait queue grew
    pub peak_queued: u16,
}

/// Summary of one `drain` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub elapsed: Duration,
    /// Requests resolved as timed out, in flight or still queued
    pub timed_out: usize,
}

#[derive(Debug)]
struct Record {
    owner: u16,
    state: TicketState,
    waveform: Option<Waveform>,
}

#[derive(Debug)]
struct Queued {
    slot: usize,
    request: TransmitRequest,
}

/// Pool of `K` transmission channels with a request table of `Q` entries
pub struct ChannelPool<'a, D: TransmitDriver, C: Clock, const K: usize, const Q: usize> {
    channels: Vec<TransmissionChannel<D>, K>,
    capability: ChannelCapability,
    queue: Deque<Queued, Q>,
    records: Vec<Record, Q>,
    completions: Option<CompletionReceiver<'a, K>>,
    clock: C,
    epoch: u16,
    sealed: bool,
    stats: PoolStats,
}

impl<'a, D: TransmitDriver, C: Clock, const K: usize, const Q: usize> ChannelPool<'a, D, C, K, Q> {
    /// Build a pool from drivers; channel ids follow iteration order
    pub fn new(
        drivers: impl IntoIterator<Item = D>,
        clock: C,
    ) -> Result<Self, ConfigurationError> {
        let mut channels = Vec::new();
        for (index, driver) in drivers.into_iter().enumerate() {
            let id = u8::try_from(index).map_err(|_| ConfigurationError::TooManyChannels {
                available: index + 1,
                capacity: K,
            })?;
            channels
                .push(TransmissionChannel::new(ChannelId(id), driver))
                .map_err(|_| ConfigurationError::TooManyChannels {
                    available: index + 1,
                    capacity: K,
                })?;
        }

        let Some(first) = channels.first() else {
            return Err(ConfigurationError::NoChannels);
        };
        let capability = first.capability();
        if channels.iter().any(|ch| ch.capability() != capability) {
            return Err(ConfigurationError::MixedChannels);
        }

        Ok(Self {
            channels,
            capability,
            queue: Deque::new(),
            records: Vec::new(),
            completions: None,
            clock,
            epoch: 0,
            sealed: false,
            stats: PoolStats::default(),
        })
    }

    /// Open every channel the platform offers
    pub fn from_platform<P>(platform: &mut P, clock: C) -> Result<Self, ConfigurationError>
    where
        P: TransmitPlatform<Driver = D>,
    {
        let count = platform.channel_count();
        if count > K {
            return Err(ConfigurationError::TooManyChannels {
                available: count,
                capacity: K,
            });
        }
        let mut drivers: Vec<D, K> = Vec::new();
        for index in 0..count {
            #[allow(clippy::cast_possible_truncation)]
            let driver = platform.open_channel(ChannelId(index as u8))?;
            let _ = drivers.push(driver);
        }
        Self::new(drivers, clock)
    }

    /// Receive completions from interrupt handlers
    #[must_use]
    pub fn with_completions(mut self, completions: CompletionReceiver<'a, K>) -> Self {
        self.completions = Some(completions);
        self
    }

    /// Capability shared by every channel of the pool
    pub const fn capability(&self) -> ChannelCapability {
        self.capability
    }

    /// Number of physical channels (K)
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// State of one channel; `None` for an unknown id
    pub fn channel_state(&self, id: ChannelId) -> Option<ChannelState> {
        self.channels.get(id.index()).map(TransmissionChannel::state)
    }

    /// Borrow one channel, e.g. to reach its driver
    pub fn channel(&self, id: ChannelId) -> Option<&TransmissionChannel<D>> {
        self.channels.get(id.index())
    }

    /// Mutable access to one channel
    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut TransmissionChannel<D>> {
        self.channels.get_mut(id.index())
    }

    /// Clock used for drain deadlines
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Counters of the current batch
    pub const fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Channels currently transmitting
    pub fn in_flight(&self) -> usize {
        self.channels
            .iter()
            .filter(|ch| ch.state() == ChannelState::Transmitting)
            .count()
    }

    /// Requests waiting for a channel
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Channel currently carrying `owner`, if any
    pub fn assignment(&self, owner: u16) -> Option<ChannelId> {
        self.channels
            .iter()
            .find(|ch| ch.owner() == Some(owner))
            .map(TransmissionChannel::id)
    }

    /// Whether the batch is finished: nothing queued, every channel idle
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
            && self
                .channels
                .iter()
                .all(|ch| ch.state() == ChannelState::Idle)
    }

    /// Submit a request. Never blocks.
    pub fn submit(&mut self, request: TransmitRequest) -> Result<Ticket, SubmitError> {
        if self.sealed {
            self.begin_batch();
        }
        if self.records.is_full() {
            return Err(SubmitError::QueueFull(request));
        }

        let slot = self.records.len();
        #[allow(clippy::cast_possible_truncation)]
        let ticket = Ticket {
            epoch: self.epoch,
            slot: slot as u16,
        };
        let _ = self.records.push(Record {
            owner: request.owner,
            state: TicketState::Queued,
            waveform: None,
        });
        self.stats.submitted += 1;

        // Nothing to put on the wire
        if request.waveform.is_empty() {
            self.resolve(slot, None, Ok(()), request.waveform);
            return Ok(ticket);
        }

        if self.queue.is_empty() && self.assignment(request.owner).is_none() {
            if let Some(index) = self.idle_channel() {
                self.start(index, slot, request);
                return Ok(ticket);
            }
        }

        if let Err(queued) = self.queue.push_back(Queued { slot, request }) {
            let _ = self.records.pop();
            self.stats.submitted -= 1;
            return Err(SubmitError::QueueFull(queued.request));
        }
        #[allow(clippy::cast_possible_truncation)]
        let queued = self.queue.len() as u16;
        self.stats.peak_queued = self.stats.peak_queued.max(queued);

        Ok(ticket)
    }

    /// Current state of a ticket; `None` once its batch is superseded
    pub fn status(&self, ticket: Ticket) -> Option<TicketState> {
        if ticket.epoch != self.epoch {
            return None;
        }
        self.records.get(ticket.slot()).map(|r| r.state)
    }

    /// Take a finished request's outcome and waveform back
    pub fn take_completed(&mut self, ticket: Ticket) -> Option<Completed> {
        if ticket.epoch != self.epoch {
            return None;
        }
        let record = self.records.get_mut(ticket.slot())?;
        let TicketState::Done { channel, result } = record.state else {
            return None;
        };
        let waveform = record.waveform.take()?;
        Some(Completed {
            channel,
            result,
            waveform,
        })
    }

    /// One non-blocking scheduling step.
    ///
    /// Applies pending completion events, polls every transmitting channel
    /// and hands idle channels to queued requests. Returns whether the
    /// batch is finished; a finished batch is retired, so the next
    /// `submit` starts a fresh request table.
    pub fn poll(&mut self) -> bool {
        while let Some(event) = self.completions.and_then(|rx| rx.try_pop()) {
            let Some(channel) = self.channels.get_mut(event.channel.index()) else {
                continue;
            };
            if let Some(finished) = channel.on_event(&event) {
                self.finish(event.channel.index(), finished);
            }
        }

        for index in 0..self.channels.len() {
            if let Some(finished) = self.channels[index].poll() {
                self.finish(index, finished);
            }
        }

        self.dispatch();
        let idle = self.is_idle();
        if idle {
            self.sealed = true;
        }
        idle
    }

    /// Block until every submitted request is finished.
    ///
    /// Channels still transmitting at the deadline are reset and their
    /// requests, along with any still queued, resolve as timed out.
    pub fn drain(&mut self, timeout: Duration) -> DrainReport {
        let started = self.clock.now();
        let deadline = started.checked_add(timeout).unwrap_or(Instant::MAX);
        let mut timed_out = 0;

        while !self.poll() {
            if self.clock.now() >= deadline {
                timed_out = self.expire();
                break;
            }
            self.clock.idle_until(deadline);
        }

        self.sealed = true;
        DrainReport {
            elapsed: self.clock.now().saturating_duration_since(started),
            timed_out,
        }
    }

    /// Owner and state of every request in the current batch, in submission order
    pub fn batch(&self) -> impl Iterator<Item = (u16, TicketState)> + '_ {
        self.records.iter().map(|r| (r.owner, r.state))
    }

    /// Abort everything immediately, resolving outstanding requests as cancelled
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.abort(RequestError::Transmit(TransmitError::Cancelled));
        self.sealed = true;
        cancelled
    }

    fn begin_batch(&mut self) {
        debug_assert!(self.queue.is_empty());
        self.records.clear();
        self.epoch = self.epoch.wrapping_add(1);
        self.stats = PoolStats::default();
        self.sealed = false;
    }

    /// Lowest-numbered idle channel
    fn idle_channel(&self) -> Option<usize> {
        self.channels
            .iter()
            .position(|ch| ch.state() == ChannelState::Idle)
    }

    /// Start queued requests in submission order.
    ///
    /// Stops at a head whose owner is still on the wire, so a later
    /// request never overtakes an earlier one.
    fn dispatch(&mut self) {
        while let Some(head) = self.queue.front() {
            if self.assignment(head.request.owner).is_some() {
                break;
            }
            let Some(index) = self.idle_channel() else {
                break;
            };
            let Some(Queued { slot, request }) = self.queue.pop_front() else {
                break;
            };
            self.start(index, slot, request);
        }
    }

    fn start(&mut self, index: usize, slot: usize, request: TransmitRequest) {
        let now = self.clock.now();
        let channel = &mut self.channels[index];
        let id = channel.id();
        let transfer = Transfer {
            slot,
            owner: request.owner,
            waveform: request.waveform,
        };
        match channel.begin_async(transfer, now) {
            Ok(_) => {
                if let Some(record) = self.records.get_mut(slot) {
                    record.state = TicketState::InFlight(id);
                }
                #[allow(clippy::cast_possible_truncation)]
                let in_flight = self.in_flight() as u8;
                self.stats.peak_in_flight = self.stats.peak_in_flight.max(in_flight);
            }
            Err(finished) => self.finish(index, finished),
        }
    }

    /// Record a finished transfer and return a faulted channel to service
    fn finish(&mut self, index: usize, finished: Finished) {
        let channel = &mut self.channels[index];
        let id = channel.id();
        if channel.state() == ChannelState::Error {
            #[cfg(feature = "esp32-log")]
            println!(
                "pool: {} fault on owner {}, resetting",
                id, finished.owner
            );
            channel.acknowledge();
        }
        let result = finished.result.map_err(RequestError::Transmit);
        self.resolve(finished.slot, Some(id), result, finished.waveform);
    }

    fn resolve(
        &mut self,
        slot: usize,
        channel: Option<ChannelId>,
        result: Result<(), RequestError>,
        waveform: Waveform,
    ) {
        match result {
            Ok(()) => self.stats.completed += 1,
            Err(RequestError::Timeout) => self.stats.timed_out += 1,
            Err(RequestError::Transmit(_)) => self.stats.failed += 1,
        }
        if let Some(record) = self.records.get_mut(slot) {
            record.state = TicketState::Done { channel, result };
            record.waveform = Some(waveform);
        }
    }

    /// Force every outstanding request to a timed-out result
    fn expire(&mut self) -> usize {
        self.abort(RequestError::Timeout)
    }

    /// Reset transmitting channels and resolve everything outstanding with `error`
    fn abort(&mut self, error: RequestError) -> usize {
        let mut aborted = 0;

        for index in 0..self.channels.len() {
            let channel = &mut self.channels[index];
            if channel.state() != ChannelState::Transmitting {
                continue;
            }
            let id = channel.id();
            if let Some(finished) = channel.cancel() {
                #[cfg(feature = "esp32-log")]
                println!("pool: {} aborted owner {}: {}", id, finished.owner, error);
                self.resolve(finished.slot, Some(id), Err(error), finished.waveform);
                aborted += 1;
            }
        }

        while let Some(Queued { slot, request }) = self.queue.pop_front() {
            self.resolve(slot, None, Err(error), request.waveform);
            aborted += 1;
        }

        aborted
    }
}

impl<D: TransmitDriver, C: Clock, const K: usize, const Q: usize> core::fmt::Debug
    for ChannelPool<'_, D, C, K, Q>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChannelPool")
            .field("channels", &self.channels.len())
            .field("in_flight", &self.in_flight())
            .field("queued", &self.queue.len())
            .field("epoch", &self.epoch)
            .field("stats", &self.stats)
            .finish()
    }
}

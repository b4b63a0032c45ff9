//! Transmission channel abstraction
//!
//! A [`TransmitDriver`] is the platform's capability for one physical
//! output path (an RMT channel, an SPI host, a parallel bus). The
//! [`TransmissionChannel`] wraps it with the `Idle → Transmitting → Idle`
//! state machine and holds the waveform while the hardware reads it.

use core::fmt;

use embassy_time::Instant;

#[cfg(feature = "esp32-log")]
use esp_println::println;

use crate::clock::Clock;
use crate::encoder::{ChannelCapability, Waveform};
use crate::error::{ConfigurationError, TransmitError};
use crate::event_queue::{EventQueue, EventReceiver, EventSender};

/// Index of a physical transmission channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(pub u8);

impl ChannelId {
    /// Position in the pool's channel table
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// Driver-issued handle of one hardware transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferToken(pub u32);

/// Platform capability for one physical output path
pub trait TransmitDriver {
    /// What the channel can emit; must not change after startup
    fn capability(&self) -> ChannelCapability;

    /// Start transmitting `waveform`. The buffer stays alive and
    /// unmodified until the transfer completes or the driver is reset.
    fn begin_transfer(&mut self, waveform: &Waveform) -> Result<TransferToken, TransmitError>;

    /// Whether the transfer finished; `Err` on a hardware fault
    fn poll_complete(&mut self, token: TransferToken) -> Result<bool, TransmitError>;

    /// Abort any transfer and return the peripheral to idle
    fn reset(&mut self);
}

/// Platform layer handing out transmission channels at startup
pub trait TransmitPlatform {
    type Driver: TransmitDriver;

    /// Number of physical channels (K)
    fn channel_count(&self) -> usize;

    /// Claim the peripheral for channel `id`; called once per id at startup
    fn open_channel(&mut self, id: ChannelId) -> Result<Self::Driver, ConfigurationError>;
}

/// Completion message posted from interrupt context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionEvent {
    pub channel: ChannelId,
    pub token: TransferToken,
    pub result: Result<(), TransmitError>,
}

/// Type alias for the completion queue
pub type CompletionQueue<const SIZE: usize> = EventQueue<CompletionEvent, SIZE>;

/// Type alias for the interrupt-side completion sender
pub type CompletionSender<'a, const SIZE: usize> = EventSender<'a, CompletionEvent, SIZE>;

/// Type alias for the scheduler-side completion receiver
pub type CompletionReceiver<'a, const SIZE: usize> = EventReceiver<'a, CompletionEvent, SIZE>;

/// Lifecycle of a transmission channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Transmitting,
    /// Faulted; must be acknowledged before reuse
    Error,
}

/// Work handed to a channel
#[derive(Debug)]
pub struct Transfer {
    /// Ticket slot of the request
    pub slot: usize,
    pub owner: u16,
    pub waveform: Waveform,
}

/// Transfer that left the channel, with the waveform handed back
#[derive(Debug)]
pub struct Finished {
    pub slot: usize,
    pub owner: u16,
    pub waveform: Waveform,
    pub started: Instant,
    pub result: Result<(), TransmitError>,
}

#[derive(Debug)]
struct InFlight {
    transfer: Transfer,
    token: TransferToken,
    started: Instant,
}

impl InFlight {
    fn finish(self, result: Result<(), TransmitError>) -> Finished {
        Finished {
            slot: self.transfer.slot,
            owner: self.transfer.owner,
            waveform: self.transfer.waveform,
            started: self.started,
            result,
        }
    }
}

/// One physical output path and its in-flight transfer
pub struct TransmissionChannel<D: TransmitDriver> {
    id: ChannelId,
    driver: D,
    state: ChannelState,
    in_flight: Option<InFlight>,
}

impl<D: TransmitDriver> TransmissionChannel<D> {
    /// Wrap a driver as an idle channel
    pub const fn new(id: ChannelId, driver: D) -> Self {
        Self {
            id,
            driver,
            state: ChannelState::Idle,
            in_flight: None,
        }
    }

    /// Stable id assigned at startup
    pub const fn id(&self) -> ChannelId {
        self.id
    }

    /// Current lifecycle state
    pub const fn state(&self) -> ChannelState {
        self.state
    }

    /// What the underlying driver can emit
    pub fn capability(&self) -> ChannelCapability {
        self.driver.capability()
    }

    /// Owner of the transfer currently on the wire
    pub fn owner(&self) -> Option<u16> {
        self.in_flight.as_ref().map(|f| f.transfer.owner)
    }

    /// Platform driver behind this channel
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable access to the platform driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Start a transfer on an idle channel.
    ///
    /// The caller guarantees the channel is idle. On a refused start the
    /// channel enters `Error` and the transfer is handed back as failed.
    pub fn begin_async(
        &mut self,
        transfer: Transfer,
        now: Instant,
    ) -> Result<TransferToken, Finished> {
        debug_assert_eq!(self.state, ChannelState::Idle);

        match self.driver.begin_transfer(&transfer.waveform) {
            Ok(token) => {
                self.state = ChannelState::Transmitting;
                self.in_flight = Some(InFlight {
                    transfer,
                    token,
                    started: now,
                });
                Ok(token)
            }
            Err(err) => {
                #[cfg(feature = "esp32-log")]
                println!("transmit: {} refused transfer: {}", self.id, err);
                self.state = ChannelState::Error;
                Err(InFlight {
                    transfer,
                    token: TransferToken(0),
                    started: now,
                }
                .finish(Err(err)))
            }
        }
    }

    /// Whether the transfer identified by `token` is no longer on the wire
    pub fn is_done(&self, token: TransferToken) -> bool {
        self.in_flight.as_ref().is_none_or(|f| f.token != token)
    }

    /// Check the hardware once; returns the transfer if it left the wire
    pub fn poll(&mut self) -> Option<Finished> {
        let token = self.in_flight.as_ref()?.token;
        match self.driver.poll_complete(token) {
            Ok(false) => None,
            Ok(true) => self.complete(Ok(())),
            Err(err) => self.complete(Err(err)),
        }
    }

    /// Apply an interrupt-delivered completion. Stale events are ignored.
    pub fn on_event(&mut self, event: &CompletionEvent) -> Option<Finished> {
        if event.channel != self.id || self.is_done(event.token) {
            return None;
        }
        self.complete(event.result)
    }

    /// Block until the current transfer leaves the wire or `deadline` passes
    pub fn wait<C: Clock>(&mut self, clock: &mut C, deadline: Instant) -> Option<Finished> {
        loop {
            if let Some(finished) = self.poll() {
                return Some(finished);
            }
            if self.in_flight.is_none() || clock.now() >= deadline {
                return None;
            }
            clock.idle_until(deadline);
        }
    }

    /// Abort the current transfer and reset the peripheral to `Idle`
    pub fn cancel(&mut self) -> Option<Finished> {
        self.driver.reset();
        self.state = ChannelState::Idle;
        self.in_flight
            .take()
            .map(|f| f.finish(Err(TransmitError::Cancelled)))
    }

    /// Clear the `Error` state by resetting the peripheral
    pub fn acknowledge(&mut self) {
        if self.state == ChannelState::Error {
            self.driver.reset();
            self.state = ChannelState::Idle;
        }
    }

    fn complete(&mut self, result: Result<(), TransmitError>) -> Option<Finished> {
        let in_flight = self.in_flight.take()?;
        self.state = if result.is_ok() {
            ChannelState::Idle
        } else {
            ChannelState::Error
        };
        Some(in_flight.finish(result))
    }
}

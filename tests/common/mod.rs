//! Simulated transmission platform on a virtual clock
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use myrtio_strip_mux::pool::ChannelPool;
use myrtio_strip_mux::{
    BusKind, ChannelCapability, ChannelId, Clock, CompletionEvent, ConfigurationError, Instant,
    TransferToken, TransmitDriver, TransmitError, TransmitPlatform, Waveform,
};

/// Simulated duration of every transfer
pub const TRANSFER_US: u64 = 10_000;

/// Virtual time advanced per idle step
pub const STEP_US: u64 = 100;

/// RMT-style pulse generator at 40 MHz
pub const RMT: ChannelCapability = ChannelCapability::Pulse {
    resolution_hz: 40_000_000,
    max_ticks: 0x7FFF,
};

pub const SPI: ChannelCapability = ChannelCapability::Serial;

pub const QUAD_SPI: ChannelCapability = ChannelCapability::Parallel {
    bus: BusKind::QuadSpi,
    max_lanes: 4,
    slot_ns: 0,
};

/// Parallel IO with 400 ns slots
pub const PARLIO: ChannelCapability = ChannelCapability::Parallel {
    bus: BusKind::Parlio,
    max_lanes: 16,
    slot_ns: 400,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Transfer runs and completes with an error
    Fail(TransmitError),
    /// `begin_transfer` refuses to start
    Refuse(TransmitError),
    /// Transfer never completes
    Hang,
}

pub type FaultFn = fn(&Waveform) -> Option<Fault>;

pub fn no_fault(_: &Waveform) -> Option<Fault> {
    None
}

#[derive(Debug, Clone)]
pub struct Logged {
    pub channel: ChannelId,
    pub started_us: u64,
    pub waveform: Waveform,
}

struct Pending {
    channel: ChannelId,
    token: TransferToken,
    done_at: u64,
    result: Result<(), TransmitError>,
}

/// Shared state of the simulation
#[derive(Default)]
pub struct Sim {
    now_us: Cell<u64>,
    log: RefCell<Vec<Logged>>,
    pending: RefCell<Vec<Pending>>,
    irq: RefCell<Option<Box<dyn Fn(CompletionEvent)>>>,
    resets: Cell<u32>,
}

impl Sim {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn now_us(&self) -> u64 {
        self.now_us.get()
    }

    /// Move virtual time forward and raise due completion interrupts
    pub fn advance_to(&self, us: u64) {
        self.now_us.set(us.max(self.now_us.get()));
        self.fire_interrupts();
    }

    /// Route completion interrupts to `handler`
    pub fn on_interrupt(&self, handler: impl Fn(CompletionEvent) + 'static) {
        *self.irq.borrow_mut() = Some(Box::new(handler));
    }

    pub fn log(&self) -> Vec<Logged> {
        self.log.borrow().clone()
    }

    /// Channel and start time of every transfer, in start order
    pub fn starts(&self) -> Vec<(u8, u64)> {
        self.log
            .borrow()
            .iter()
            .map(|t| (t.channel.0, t.started_us))
            .collect()
    }

    pub fn resets(&self) -> u32 {
        self.resets.get()
    }

    fn fire_interrupts(&self) {
        let now = self.now_us.get();
        let due: Vec<Pending> = {
            let mut pending = self.pending.borrow_mut();
            let (due, rest): (Vec<Pending>, Vec<Pending>) =
                pending.drain(..).partition(|p| p.done_at <= now);
            *pending = rest;
            due
        };
        if let Some(irq) = self.irq.borrow().as_ref() {
            for p in due {
                irq(CompletionEvent {
                    channel: p.channel,
                    token: p.token,
                    result: p.result,
                });
            }
        }
    }
}

/// Virtual clock stepping [`STEP_US`] per idle call
pub struct SimClock {
    sim: Rc<Sim>,
}

impl SimClock {
    pub fn new(sim: &Rc<Sim>) -> Self {
        Self { sim: sim.clone() }
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        Instant::from_micros(self.sim.now_us())
    }

    fn idle_until(&mut self, deadline: Instant) {
        let now = self.sim.now_us();
        let next = (now + STEP_US).min(deadline.as_micros()).max(now + 1);
        self.sim.advance_to(next);
    }
}

struct Active {
    token: TransferToken,
    done_at: u64,
    result: Result<(), TransmitError>,
}

pub struct SimDriver {
    channel: ChannelId,
    sim: Rc<Sim>,
    capability: ChannelCapability,
    duration_us: u64,
    fault: FaultFn,
    interrupts: bool,
    active: Option<Active>,
    next_token: u32,
}

impl TransmitDriver for SimDriver {
    fn capability(&self) -> ChannelCapability {
        self.capability
    }

    fn begin_transfer(&mut self, waveform: &Waveform) -> Result<TransferToken, TransmitError> {
        let fault = (self.fault)(waveform);
        if let Some(Fault::Refuse(err)) = fault {
            return Err(err);
        }

        self.next_token += 1;
        let token = TransferToken(self.next_token);
        let now = self.sim.now_us();
        let done_at = match fault {
            Some(Fault::Hang) => u64::MAX,
            _ => now + self.duration_us,
        };
        let result = match fault {
            Some(Fault::Fail(err)) => Err(err),
            _ => Ok(()),
        };

        self.sim.log.borrow_mut().push(Logged {
            channel: self.channel,
            started_us: now,
            waveform: waveform.clone(),
        });
        if self.interrupts && done_at != u64::MAX {
            self.sim.pending.borrow_mut().push(Pending {
                channel: self.channel,
                token,
                done_at,
                result,
            });
        }
        self.active = Some(Active {
            token,
            done_at,
            result,
        });
        Ok(token)
    }

    fn poll_complete(&mut self, token: TransferToken) -> Result<bool, TransmitError> {
        if self.interrupts {
            return Ok(false);
        }
        let Some(active) = &self.active else {
            return Ok(true);
        };
        if active.token != token {
            return Ok(true);
        }
        if self.sim.now_us() < active.done_at {
            return Ok(false);
        }
        let result = active.result;
        self.active = None;
        result.map(|()| true)
    }

    fn reset(&mut self) {
        self.active = None;
        self.sim.resets.set(self.sim.resets.get() + 1);
        self.sim
            .pending
            .borrow_mut()
            .retain(|p| p.channel != self.channel);
    }
}

pub struct SimPlatform {
    sim: Rc<Sim>,
    channels: usize,
    capability: ChannelCapability,
    duration_us: u64,
    fault: FaultFn,
    interrupts: bool,
}

impl SimPlatform {
    pub fn new(sim: &Rc<Sim>, channels: usize, capability: ChannelCapability) -> Self {
        Self {
            sim: sim.clone(),
            channels,
            capability,
            duration_us: TRANSFER_US,
            fault: no_fault,
            interrupts: false,
        }
    }

    pub fn with_fault(mut self, fault: FaultFn) -> Self {
        self.fault = fault;
        self
    }

    /// Report completion only through interrupts
    pub fn with_interrupts(mut self) -> Self {
        self.interrupts = true;
        self
    }

    pub fn pool<'a, const K: usize, const Q: usize>(
        &mut self,
    ) -> ChannelPool<'a, SimDriver, SimClock, K, Q> {
        let clock = SimClock::new(&self.sim);
        match ChannelPool::from_platform(self, clock) {
            Ok(pool) => pool,
            Err(err) => panic!("pool setup failed: {}", err),
        }
    }
}

impl TransmitPlatform for SimPlatform {
    type Driver = SimDriver;

    fn channel_count(&self) -> usize {
        self.channels
    }

    fn open_channel(&mut self, id: ChannelId) -> Result<SimDriver, ConfigurationError> {
        if id.index() >= self.channels {
            return Err(ConfigurationError::ChannelUnavailable);
        }
        Ok(SimDriver {
            channel: id,
            sim: self.sim.clone(),
            capability: self.capability,
            duration_us: self.duration_us,
            fault: self.fault,
            interrupts: self.interrupts,
            active: None,
            next_token: 0,
        })
    }
}

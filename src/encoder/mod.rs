//! Waveform encoder
//!
//! Turns pixel bytes into the symbol buffer a transmission channel
//! consumes. All validation happens when an [`EncodePlan`] is built at
//! registration; encoding itself cannot fail and reuses the waveform's
//! allocation from frame to frame.

mod clocked;
mod clockless;
mod lanes;

use alloc::vec::Vec;

pub use clocked::{ClockedPlan, framed_bytes};
pub use clockless::{ClocklessPlan, decode_pulses, ns_to_ticks};
pub use lanes::{LanePlan, LaneSpec, MAX_LANES, MAX_SLOTS_PER_BIT, decode_lane_bytes};

use crate::error::ConfigurationError;
use crate::protocol::Protocol;

/// One pulse-generator symbol, durations in channel ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pulse {
    pub high: u16,
    pub low: u16,
}

impl Pulse {
    pub const fn new(high: u16, low: u16) -> Self {
        Self { high, low }
    }
}

/// Hardware-native symbol buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Waveform {
    /// Pulse pairs for pulse generators (RMT)
    Pulses { symbols: Vec<Pulse>, reset_ns: u32 },
    /// Byte stream for byte-serial outputs (SPI)
    Bytes(Vec<u8>),
    /// One word per output clock, bit `i` drives lane `i`
    Parallel {
        lanes: u8,
        words: Vec<u16>,
        reset_ns: u32,
    },
}

impl Waveform {
    /// Number of symbols in the buffer
    pub fn len(&self) -> usize {
        match self {
            Self::Pulses { symbols, .. } => symbols.len(),
            Self::Bytes(bytes) => bytes.len(),
            Self::Parallel { words, .. } => words.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Multi-lane output peripherals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    /// Quad-SPI, clocked lanes
    QuadSpi,
    /// ESP32 parallel IO, clockless lanes
    Parlio,
    /// LCD/I80 parallel bus, clockless lanes
    LcdParallel,
}

impl BusKind {
    pub const fn max_lanes(self) -> u8 {
        match self {
            Self::QuadSpi => 4,
            Self::Parlio | Self::LcdParallel => 16,
        }
    }

    /// Whether lanes of this bus can carry the protocol
    pub const fn supports(self, protocol: &Protocol) -> bool {
        match self {
            Self::QuadSpi => !protocol.is_clockless(),
            Self::Parlio | Self::LcdParallel => protocol.is_clockless(),
        }
    }
}

/// What a transmission channel can emit, reported by the platform driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCapability {
    /// Pulse-pair generator with the given tick rate
    Pulse { resolution_hz: u32, max_ticks: u16 },
    /// Byte-serial output with its own clock line
    Serial,
    /// Multi-lane output clocked at one word per `slot_ns`
    Parallel {
        bus: BusKind,
        max_lanes: u8,
        slot_ns: u32,
    },
}

/// Validated encoding recipe for one transmission unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodePlan {
    Clockless(ClocklessPlan),
    Clocked(ClockedPlan),
    Lanes(LanePlan),
}

impl EncodePlan {
    /// Plan for a strip that owns a whole channel.
    ///
    /// On a parallel channel the strip is carried on lane 0.
    pub fn single(
        protocol: &Protocol,
        capability: ChannelCapability,
        len: usize,
    ) -> Result<Self, ConfigurationError> {
        validate_length(protocol, len)?;
        match (capability, protocol) {
            (
                ChannelCapability::Pulse {
                    resolution_hz,
                    max_ticks,
                },
                Protocol::Clockless { timing, .. },
            ) => Ok(Self::Clockless(ClocklessPlan::new(
                timing,
                resolution_hz,
                max_ticks,
            )?)),
            (ChannelCapability::Serial, Protocol::Clocked { .. }) => {
                Ok(Self::Clocked(ClockedPlan::new(protocol)?))
            }
            (ChannelCapability::Parallel { .. }, _) => Self::lanes(
                capability,
                &[LaneSpec {
                    lane: 0,
                    protocol: *protocol,
                }],
            ),
            _ => Err(ConfigurationError::UnsupportedProtocol),
        }
    }

    /// Plan for several strips sharing one multi-lane transmission
    pub fn lanes(
        capability: ChannelCapability,
        lanes: &[LaneSpec],
    ) -> Result<Self, ConfigurationError> {
        match capability {
            ChannelCapability::Parallel {
                bus,
                max_lanes,
                slot_ns,
            } => Ok(Self::Lanes(LanePlan::new(bus, max_lanes, slot_ns, lanes)?)),
            _ => Err(ConfigurationError::UnsupportedProtocol),
        }
    }

    /// Number of symbols `encode_into` will produce.
    ///
    /// `buffers` holds one pixel buffer per lane, in plan order; single
    /// plans take exactly one.
    pub fn encoded_len(&self, buffers: &[&[u8]]) -> usize {
        match self {
            Self::Clockless(plan) => buffers.first().map_or(0, |b| plan.encoded_len(b.len())),
            Self::Clocked(plan) => buffers.first().map_or(0, |b| plan.encoded_len(b.len())),
            Self::Lanes(plan) => plan.encoded_len(buffers),
        }
    }

    /// Encode into `out`, reusing its allocation when the variant matches
    pub fn encode_into(&self, buffers: &[&[u8]], out: &mut Waveform) {
        let len = self.encoded_len(buffers);
        let empty: &[u8] = &[];
        match self {
            Self::Clockless(plan) => {
                let mut symbols = match core::mem::replace(out, Waveform::Bytes(Vec::new())) {
                    Waveform::Pulses { symbols, .. } => symbols,
                    _ => Vec::new(),
                };
                symbols.clear();
                symbols.reserve_exact(len);
                plan.encode_into(buffers.first().copied().unwrap_or(empty), &mut symbols);
                *out = Waveform::Pulses {
                    symbols,
                    reset_ns: plan.reset_ns(),
                };
            }
            Self::Clocked(plan) => {
                let mut bytes = match core::mem::replace(out, Waveform::Bytes(Vec::new())) {
                    Waveform::Bytes(bytes) => bytes,
                    _ => Vec::new(),
                };
                bytes.clear();
                bytes.reserve_exact(len);
                plan.encode_into(buffers.first().copied().unwrap_or(empty), &mut bytes);
                *out = Waveform::Bytes(bytes);
            }
            Self::Lanes(plan) => {
                let mut words = match core::mem::replace(out, Waveform::Bytes(Vec::new())) {
                    Waveform::Parallel { words, .. } => words,
                    _ => Vec::new(),
                };
                words.clear();
                words.reserve_exact(len);
                plan.encode_into(buffers, &mut words);
                *out = Waveform::Parallel {
                    lanes: plan.width(),
                    words,
                    reset_ns: plan.reset_ns(),
                };
            }
        }
    }
}

/// Encode a single strip in one call
pub fn encode(
    pixels: &[u8],
    protocol: &Protocol,
    capability: ChannelCapability,
) -> Result<Waveform, ConfigurationError> {
    let plan = EncodePlan::single(protocol, capability, pixels.len())?;
    let mut waveform = Waveform::Bytes(Vec::new());
    plan.encode_into(&[pixels], &mut waveform);
    Ok(waveform)
}

/// Check that a buffer holds whole pixels of the protocol
pub fn validate_length(protocol: &Protocol, len: usize) -> Result<(), ConfigurationError> {
    let components = protocol.components();
    if components == 0 {
        return Err(ConfigurationError::UnsupportedProtocol);
    }
    if !len.is_multiple_of(components as usize) {
        return Err(ConfigurationError::InvalidLength { len, components });
    }
    Ok(())
}

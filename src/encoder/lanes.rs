//! Bit-interleaved multi-lane encoding
//!
//! Several strips share one physical transmission: output word bit `i`
//! carries lane `i`'s current bit. Shorter lanes are padded with their
//! protocol's filler byte so padding never breaks a lane's framing.

use alloc::vec::Vec;
use core::iter;

use heapless::Vec as HeaplessVec;

use super::BusKind;
use super::clocked::framed_bytes;
use crate::error::ConfigurationError;
use crate::protocol::{Protocol, ProtocolTiming, pixel_count};

/// Widest supported parallel bus
pub const MAX_LANES: usize = 16;

/// Upper bound on slot words emitted per clockless bit
pub const MAX_SLOTS_PER_BIT: u32 = 32;

/// One lane of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneSpec {
    pub lane: u8,
    pub protocol: Protocol,
}

/// Per-bit slot template shared by all clockless lanes of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotTemplate {
    period: u8,
    high0: u8,
    high1: u8,
}

impl SlotTemplate {
    #[allow(clippy::cast_possible_truncation)]
    fn new(timing: &ProtocolTiming, slot_ns: u32) -> Result<Self, ConfigurationError> {
        if slot_ns == 0 {
            return Err(ConfigurationError::UnrepresentableTiming);
        }
        let slots = |ns: u32| (u64::from(ns) + u64::from(slot_ns / 2)) / u64::from(slot_ns);
        let period = timing
            .bit_period_ns()
            .map(slots)
            .ok_or(ConfigurationError::UnrepresentableTiming)?;
        let high0 = slots(timing.bit0_high_ns);
        let high1 = slots(timing.bit1_high_ns);

        if high0 == 0
            || high1 <= high0
            || period <= high1
            || period > u64::from(MAX_SLOTS_PER_BIT)
        {
            return Err(ConfigurationError::UnrepresentableTiming);
        }

        Ok(Self {
            period: period as u8,
            high0: high0 as u8,
            high1: high1 as u8,
        })
    }
}

/// Validated multi-lane encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanePlan {
    bus: BusKind,
    lanes: HeaplessVec<LaneSpec, MAX_LANES>,
    slots: Option<SlotTemplate>,
    reset_ns: u32,
}

impl LanePlan {
    pub fn new(
        bus: BusKind,
        max_lanes: u8,
        slot_ns: u32,
        lanes: &[LaneSpec],
    ) -> Result<Self, ConfigurationError> {
        #[allow(clippy::cast_possible_truncation)]
        let max_lanes = max_lanes.min(bus.max_lanes()).min(MAX_LANES as u8);
        let Some(first) = lanes.first() else {
            return Err(ConfigurationError::IncompatibleLanes);
        };

        let mut specs = HeaplessVec::new();
        for (i, spec) in lanes.iter().enumerate() {
            if spec.lane >= max_lanes {
                return Err(ConfigurationError::LaneOutOfRange {
                    lane: spec.lane,
                    max_lanes,
                });
            }
            if !bus.supports(&spec.protocol) {
                return Err(ConfigurationError::UnsupportedProtocol);
            }
            if spec.protocol.is_clockless() != first.protocol.is_clockless() {
                return Err(ConfigurationError::IncompatibleLanes);
            }
            if lanes[..i].iter().any(|other| other.lane == spec.lane) {
                return Err(ConfigurationError::LaneInUse {
                    group: 0,
                    lane: spec.lane,
                });
            }
            if let Protocol::Clocked { .. } = spec.protocol {
                super::ClockedPlan::new(&spec.protocol)?;
            }
            specs
                .push(*spec)
                .map_err(|_| ConfigurationError::IncompatibleLanes)?;
        }

        let mut slots = None;
        let mut reset_ns = 0;
        for spec in &specs {
            if let Protocol::Clockless { timing, .. } = spec.protocol {
                let template = SlotTemplate::new(&timing, slot_ns)?;
                if slots.is_some_and(|existing| existing != template) {
                    return Err(ConfigurationError::IncompatibleLanes);
                }
                slots = Some(template);
                reset_ns = reset_ns.max(timing.reset_low_ns);
            }
        }

        Ok(Self {
            bus,
            lanes: specs,
            slots,
            reset_ns,
        })
    }

    pub const fn bus(&self) -> BusKind {
        self.bus
    }

    pub fn lanes(&self) -> &[LaneSpec] {
        &self.lanes
    }

    /// Bus width in use: highest lane index plus one
    pub fn width(&self) -> u8 {
        self.lanes.iter().map(|spec| spec.lane + 1).max().unwrap_or(0)
    }

    pub const fn reset_ns(&self) -> u32 {
        self.reset_ns
    }

    /// Bytes per lane after framing, before padding
    fn lane_len(spec: &LaneSpec, len: usize) -> usize {
        match spec.protocol {
            Protocol::Clockless { .. } => len,
            Protocol::Clocked {
                chipset,
                components,
            } => chipset.framed_len(pixel_count(len, components), components),
        }
    }

    /// Longest lane stream in bytes; every lane is padded to this
    fn padded_len(&self, buffers: &[&[u8]]) -> usize {
        self.lanes
            .iter()
            .zip(buffers)
            .map(|(spec, pixels)| Self::lane_len(spec, pixels.len()))
            .max()
            .unwrap_or(0)
    }

    pub fn encoded_len(&self, buffers: &[&[u8]]) -> usize {
        let per_bit = self.slots.map_or(1, |slots| usize::from(slots.period));
        self.padded_len(buffers) * 8 * per_bit
    }

    pub fn encode_into(&self, buffers: &[&[u8]], out: &mut Vec<u16>) {
        let total = self.padded_len(buffers);
        match self.slots {
            Some(slots) => self.encode_clockless(slots, buffers, total, out),
            None => self.encode_clocked(buffers, total, out),
        }
    }

    fn encode_clocked(&self, buffers: &[&[u8]], total: usize, out: &mut Vec<u16>) {
        let mut streams: HeaplessVec<_, MAX_LANES> = HeaplessVec::new();
        for (spec, pixels) in self.lanes.iter().zip(buffers) {
            let Protocol::Clocked {
                chipset,
                components,
            } = spec.protocol
            else {
                continue;
            };
            let stream = framed_bytes(chipset, pixels, components)
                .chain(iter::repeat(chipset.filler_byte()));
            let _ = streams.push((spec.lane, stream));
        }

        for _ in 0..total {
            let mut current = [0u8; MAX_LANES];
            for (lane, stream) in &mut streams {
                current[usize::from(*lane)] = stream.next().unwrap_or(0);
            }
            push_bits(&current, out);
        }
    }

    fn encode_clockless(
        &self,
        slots: SlotTemplate,
        buffers: &[&[u8]],
        total: usize,
        out: &mut Vec<u16>,
    ) {
        let present = self
            .lanes
            .iter()
            .fold(0u16, |mask, spec| mask | 1 << spec.lane);

        for index in 0..total {
            let mut ones_by_bit = [0u16; 8];
            for (spec, pixels) in self.lanes.iter().zip(buffers) {
                let byte = pixels
                    .get(index)
                    .copied()
                    .unwrap_or(spec.protocol.filler_byte());
                for (bit, ones) in ones_by_bit.iter_mut().enumerate() {
                    if (byte >> (7 - bit)) & 1 == 1 {
                        *ones |= 1 << spec.lane;
                    }
                }
            }

            for ones in ones_by_bit {
                for slot in 0..slots.period {
                    let mut word = 0;
                    if slot < slots.high0 {
                        word |= present;
                    }
                    if slot < slots.high1 {
                        word |= ones;
                    }
                    out.push(word);
                }
            }
        }
    }
}

/// Emit eight words, MSB first, with bit `i` taken from `bytes[i]`
fn push_bits(bytes: &[u8; MAX_LANES], out: &mut Vec<u16>) {
    for bit in (0..8).rev() {
        let word = bytes
            .iter()
            .enumerate()
            .fold(0u16, |word, (lane, byte)| {
                word | (u16::from((byte >> bit) & 1) << lane)
            });
        out.push(word);
    }
}

/// Extract one lane's byte stream from clocked parallel words
pub fn decode_lane_bytes(words: &[u16], lane: u8) -> Vec<u8> {
    words
        .chunks_exact(8)
        .map(|chunk| {
            chunk
                .iter()
                .fold(0u8, |byte, word| (byte << 1) | u8::from((word >> lane) & 1 == 1))
        })
        .collect()
}

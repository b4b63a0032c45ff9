use alloc::vec::Vec;

use super::Pulse;
use crate::error::ConfigurationError;
use crate::protocol::ProtocolTiming;

const NS_PER_SECOND: u64 = 1_000_000_000;

/// Convert nanoseconds to ticks of a `resolution_hz` clock, rounding to nearest
#[allow(clippy::cast_lossless)]
pub const fn ns_to_ticks(ns: u32, resolution_hz: u32) -> u64 {
    (ns as u64 * resolution_hz as u64 + NS_PER_SECOND / 2) / NS_PER_SECOND
}

/// Bit-serial encoding for one pulse generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClocklessPlan {
    zero: Pulse,
    one: Pulse,
    reset_ns: u32,
}

impl ClocklessPlan {
    /// Quantize the timing to the channel clock.
    ///
    /// Every duration must land in `1..=max_ticks`, and the two bit
    /// encodings must stay distinguishable after rounding.
    pub fn new(
        timing: &ProtocolTiming,
        resolution_hz: u32,
        max_ticks: u16,
    ) -> Result<Self, ConfigurationError> {
        let quantize = |ns: u32| -> Result<u16, ConfigurationError> {
            let ticks = ns_to_ticks(ns, resolution_hz);
            if ticks == 0 || ticks > u64::from(max_ticks) {
                return Err(ConfigurationError::UnrepresentableTiming);
            }
            u16::try_from(ticks).map_err(|_| ConfigurationError::UnrepresentableTiming)
        };

        let zero = Pulse::new(quantize(timing.bit0_high_ns)?, quantize(timing.bit0_low_ns)?);
        let one = Pulse::new(quantize(timing.bit1_high_ns)?, quantize(timing.bit1_low_ns)?);
        if zero == one {
            return Err(ConfigurationError::UnrepresentableTiming);
        }

        Ok(Self {
            zero,
            one,
            reset_ns: timing.reset_low_ns,
        })
    }

    pub const fn zero(&self) -> Pulse {
        self.zero
    }

    pub const fn one(&self) -> Pulse {
        self.one
    }

    pub const fn reset_ns(&self) -> u32 {
        self.reset_ns
    }

    /// One symbol per input bit
    pub const fn encoded_len(&self, len: usize) -> usize {
        len * 8
    }

    pub fn encode_into(&self, pixels: &[u8], out: &mut Vec<Pulse>) {
        for &byte in pixels {
            for bit in (0..8).rev() {
                let pulse = if (byte >> bit) & 1 == 1 { self.one } else { self.zero };
                out.push(pulse);
            }
        }
    }

    /// Bit value a symbol encodes, if it is one of the plan's pulses
    pub fn classify(&self, pulse: Pulse) -> Option<bool> {
        if pulse == self.one {
            Some(true)
        } else if pulse == self.zero {
            Some(false)
        } else {
            None
        }
    }
}

/// Recover pixel bytes from a pulse buffer.
///
/// Returns `None` on a partial byte or a symbol that is neither bit pulse.
pub fn decode_pulses(plan: &ClocklessPlan, symbols: &[Pulse]) -> Option<Vec<u8>> {
    if !symbols.len().is_multiple_of(8) {
        return None;
    }
    symbols
        .chunks_exact(8)
        .map(|chunk| {
            chunk.iter().try_fold(0u8, |byte, &pulse| {
                plan.classify(pulse).map(|bit| (byte << 1) | u8::from(bit))
            })
        })
        .collect()
}

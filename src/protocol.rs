//! Protocol descriptors
//!
//! Immutable electrical parameters of a chipset, fixed when a strip is
//! registered.

/// Pulse timing of a clockless (single-wire) protocol, in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolTiming {
    pub bit0_high_ns: u32,
    pub bit0_low_ns: u32,
    pub bit1_high_ns: u32,
    pub bit1_low_ns: u32,
    /// Minimum low time that latches the frame
    pub reset_low_ns: u32,
}

impl ProtocolTiming {
    pub const fn new(
        bit0_high_ns: u32,
        bit0_low_ns: u32,
        bit1_high_ns: u32,
        bit1_low_ns: u32,
        reset_low_ns: u32,
    ) -> Self {
        Self {
            bit0_high_ns,
            bit0_low_ns,
            bit1_high_ns,
            bit1_low_ns,
            reset_low_ns,
        }
    }

    /// Returns `(high_ns, low_ns)` for the given bit value
    pub const fn pair(&self, bit: bool) -> (u32, u32) {
        if bit {
            (self.bit1_high_ns, self.bit1_low_ns)
        } else {
            (self.bit0_high_ns, self.bit0_low_ns)
        }
    }

    /// Duration of one data bit, the longer of both encodings.
    /// `None` when a high/low pair overflows `u32`.
    pub const fn bit_period_ns(&self) -> Option<u32> {
        let zero = self.bit0_high_ns.checked_add(self.bit0_low_ns);
        let one = self.bit1_high_ns.checked_add(self.bit1_low_ns);
        match (zero, one) {
            (Some(zero), Some(one)) => Some(if zero > one { zero } else { one }),
            _ => None,
        }
    }
}

/// Byte-serial chipsets that carry their own clock line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockedChipset {
    Apa102,
    Sk9822,
    Ws2801,
    Lpd8806,
    P9813,
}

impl ClockedChipset {
    /// Byte that may be appended after the end of a framed stream
    /// without changing what the strip latches.
    pub const fn filler_byte(self) -> u8 {
        match self {
            Self::Apa102 => 0xFF,
            Self::Sk9822 | Self::Ws2801 | Self::Lpd8806 | Self::P9813 => 0x00,
        }
    }

    /// Component count the framing is defined for, if fixed
    pub const fn fixed_components(self) -> Option<u8> {
        match self {
            Self::Apa102 | Self::Sk9822 | Self::P9813 => Some(3),
            Self::Ws2801 | Self::Lpd8806 => None,
        }
    }

    /// Number of bytes before the first pixel
    pub const fn start_len(self) -> usize {
        match self {
            Self::Apa102 | Self::Sk9822 | Self::P9813 => 4,
            Self::Ws2801 | Self::Lpd8806 => 0,
        }
    }

    /// Encoded size of one pixel with `components` data bytes
    pub const fn pixel_len(self, components: u8) -> usize {
        match self {
            Self::Apa102 | Self::Sk9822 | Self::P9813 => 1 + components as usize,
            Self::Ws2801 | Self::Lpd8806 => components as usize,
        }
    }

    /// Number of bytes after the last pixel for `pixels` pixels
    pub const fn end_len(self, pixels: usize) -> usize {
        match self {
            Self::Apa102 => {
                let half_clocks = pixels.div_ceil(16);
                if half_clocks > 4 { half_clocks } else { 4 }
            }
            Self::Sk9822 => 4 + pixels.div_ceil(16),
            Self::Ws2801 => 0,
            Self::Lpd8806 => {
                let latch = pixels.div_ceil(32);
                if latch > 1 { latch } else { 1 }
            }
            Self::P9813 => 4,
        }
    }

    /// Total framed size for `pixels` pixels
    pub const fn framed_len(self, pixels: usize, components: u8) -> usize {
        self.start_len() + pixels * self.pixel_len(components) + self.end_len(pixels)
    }
}

/// Electrical protocol of a strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Single-wire pulse-width protocol (WS2812 and friends)
    Clockless {
        timing: ProtocolTiming,
        components: u8,
    },
    /// Data + clock protocol (APA102 and friends)
    Clocked {
        chipset: ClockedChipset,
        components: u8,
    },
}

impl Protocol {
    /// Bytes per pixel in the caller's buffer
    pub const fn components(&self) -> u8 {
        match self {
            Self::Clockless { components, .. } | Self::Clocked { components, .. } => *components,
        }
    }

    pub const fn is_clockless(&self) -> bool {
        matches!(self, Self::Clockless { .. })
    }

    /// Byte used to pad a shorter lane up to the longest lane
    pub const fn filler_byte(&self) -> u8 {
        match self {
            Self::Clockless { .. } => 0x00,
            Self::Clocked { chipset, .. } => chipset.filler_byte(),
        }
    }

    /// Same protocol with a different component count
    #[must_use]
    pub const fn with_components(self, components: u8) -> Self {
        match self {
            Self::Clockless { timing, .. } => Self::Clockless { timing, components },
            Self::Clocked { chipset, .. } => Self::Clocked {
                chipset,
                components,
            },
        }
    }
}

/// Number of whole pixels in a buffer
pub(crate) const fn pixel_count(len: usize, components: u8) -> usize {
    if components == 0 {
        return 0;
    }
    len / components as usize
}

use alloc::vec::Vec;
use core::iter;

use crate::error::ConfigurationError;
use crate::protocol::{ClockedChipset, Protocol, pixel_count};

/// APA102/SK9822 pixel header with full global brightness
const GLOBAL_BRIGHTNESS_HEADER: u8 = 0xE0 | 0x1F;

/// Byte-serial encoding for one clocked strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockedPlan {
    chipset: ClockedChipset,
    components: u8,
}

impl ClockedPlan {
    pub fn new(protocol: &Protocol) -> Result<Self, ConfigurationError> {
        let Protocol::Clocked {
            chipset,
            components,
        } = *protocol
        else {
            return Err(ConfigurationError::UnsupportedProtocol);
        };
        if chipset
            .fixed_components()
            .is_some_and(|fixed| fixed != components)
        {
            return Err(ConfigurationError::UnsupportedProtocol);
        }
        Ok(Self {
            chipset,
            components,
        })
    }

    pub const fn chipset(&self) -> ClockedChipset {
        self.chipset
    }

    pub const fn encoded_len(&self, len: usize) -> usize {
        self.chipset
            .framed_len(pixel_count(len, self.components), self.components)
    }

    pub fn encode_into(&self, pixels: &[u8], out: &mut Vec<u8>) {
        out.extend(framed_bytes(self.chipset, pixels, self.components));
    }
}

/// Framed byte stream of a clocked strip: start frame, pixels, end frame
pub fn framed_bytes(
    chipset: ClockedChipset,
    pixels: &[u8],
    components: u8,
) -> impl Iterator<Item = u8> + '_ {
    let count = pixel_count(pixels.len(), components);
    let end_byte = match chipset {
        ClockedChipset::Apa102 => 0xFF,
        _ => 0x00,
    };

    let start = iter::repeat_n(0x00, chipset.start_len());
    let body = pixels
        .chunks_exact(usize::from(components.max(1)))
        .flat_map(move |pixel| {
            pixel_header(chipset, pixel)
                .into_iter()
                .chain(pixel.iter().map(move |&c| map_component(chipset, c)))
        });
    let end = iter::repeat_n(end_byte, chipset.end_len(count));

    start.chain(body).chain(end)
}

fn pixel_header(chipset: ClockedChipset, pixel: &[u8]) -> Option<u8> {
    match chipset {
        ClockedChipset::Apa102 | ClockedChipset::Sk9822 => Some(GLOBAL_BRIGHTNESS_HEADER),
        ClockedChipset::P9813 => Some(p9813_flag(pixel)),
        ClockedChipset::Ws2801 | ClockedChipset::Lpd8806 => None,
    }
}

/// LPD8806 carries 7-bit components with the top bit set
const fn map_component(chipset: ClockedChipset, component: u8) -> u8 {
    match chipset {
        ClockedChipset::Lpd8806 => 0x80 | (component >> 1),
        _ => component,
    }
}

/// P9813 flag: `0b11` marker plus the inverted top two bits of each component
fn p9813_flag(pixel: &[u8]) -> u8 {
    let inverted = |c: u8| (!c >> 6) & 0x03;
    let mut flag = 0xC0;
    for (i, &component) in pixel.iter().take(3).enumerate() {
        flag |= inverted(component) << (4 - 2 * i);
    }
    flag
}

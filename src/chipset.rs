//! Chipset registry
//!
//! Named protocol descriptors for the supported LED chipsets. Timings are
//! datasheet nominal values.

use crate::protocol::{ClockedChipset, Protocol, ProtocolTiming};

const CHIPSET_NAME_WS2812: &str = "ws2812";
const CHIPSET_NAME_WS2812B_V5: &str = "ws2812b_v5";
const CHIPSET_NAME_WS2811: &str = "ws2811";
const CHIPSET_NAME_WS2815: &str = "ws2815";
const CHIPSET_NAME_SK6812: &str = "sk6812";
const CHIPSET_NAME_SK6812_RGBW: &str = "sk6812_rgbw";
const CHIPSET_NAME_TM1814: &str = "tm1814";
const CHIPSET_NAME_APA102: &str = "apa102";
const CHIPSET_NAME_SK9822: &str = "sk9822";
const CHIPSET_NAME_WS2801: &str = "ws2801";
const CHIPSET_NAME_LPD8806: &str = "lpd8806";
const CHIPSET_NAME_P9813: &str = "p9813";

pub const WS2812_TIMING: ProtocolTiming = ProtocolTiming::new(400, 850, 800, 450, 50_000);
pub const WS2812B_V5_TIMING: ProtocolTiming = ProtocolTiming::new(400, 850, 800, 450, 280_000);
/// 400 kHz mode
pub const WS2811_TIMING: ProtocolTiming = ProtocolTiming::new(500, 2000, 1200, 1300, 50_000);
pub const WS2815_TIMING: ProtocolTiming = ProtocolTiming::new(300, 1090, 1090, 320, 280_000);
pub const SK6812_TIMING: ProtocolTiming = ProtocolTiming::new(300, 900, 600, 600, 80_000);
pub const TM1814_TIMING: ProtocolTiming = ProtocolTiming::new(360, 890, 720, 530, 200_000);

/// Known chipsets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Chipset {
    Ws2812,
    Ws2812bV5,
    Ws2811,
    Ws2815,
    Sk6812,
    Sk6812Rgbw,
    Tm1814,
    Apa102,
    Sk9822,
    Ws2801,
    Lpd8806,
    P9813,
}

impl Chipset {
    pub const ALL: [Self; 12] = [
        Self::Ws2812,
        Self::Ws2812bV5,
        Self::Ws2811,
        Self::Ws2815,
        Self::Sk6812,
        Self::Sk6812Rgbw,
        Self::Tm1814,
        Self::Apa102,
        Self::Sk9822,
        Self::Ws2801,
        Self::Lpd8806,
        Self::P9813,
    ];

    /// Protocol descriptor for this chipset
    pub const fn protocol(self) -> Protocol {
        match self {
            Self::Ws2812 => clockless(WS2812_TIMING, 3),
            Self::Ws2812bV5 => clockless(WS2812B_V5_TIMING, 3),
            Self::Ws2811 => clockless(WS2811_TIMING, 3),
            Self::Ws2815 => clockless(WS2815_TIMING, 3),
            Self::Sk6812 => clockless(SK6812_TIMING, 3),
            Self::Sk6812Rgbw => clockless(SK6812_TIMING, 4),
            Self::Tm1814 => clockless(TM1814_TIMING, 4),
            Self::Apa102 => clocked(ClockedChipset::Apa102),
            Self::Sk9822 => clocked(ClockedChipset::Sk9822),
            Self::Ws2801 => clocked(ClockedChipset::Ws2801),
            Self::Lpd8806 => clocked(ClockedChipset::Lpd8806),
            Self::P9813 => clocked(ClockedChipset::P9813),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ws2812 => CHIPSET_NAME_WS2812,
            Self::Ws2812bV5 => CHIPSET_NAME_WS2812B_V5,
            Self::Ws2811 => CHIPSET_NAME_WS2811,
            Self::Ws2815 => CHIPSET_NAME_WS2815,
            Self::Sk6812 => CHIPSET_NAME_SK6812,
            Self::Sk6812Rgbw => CHIPSET_NAME_SK6812_RGBW,
            Self::Tm1814 => CHIPSET_NAME_TM1814,
            Self::Apa102 => CHIPSET_NAME_APA102,
            Self::Sk9822 => CHIPSET_NAME_SK9822,
            Self::Ws2801 => CHIPSET_NAME_WS2801,
            Self::Lpd8806 => CHIPSET_NAME_LPD8806,
            Self::P9813 => CHIPSET_NAME_P9813,
        }
    }

    pub fn parse_from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|chipset| chipset.as_str() == s)
    }
}

const fn clockless(timing: ProtocolTiming, components: u8) -> Protocol {
    Protocol::Clockless { timing, components }
}

const fn clocked(chipset: ClockedChipset) -> Protocol {
    Protocol::Clocked {
        chipset,
        components: 3,
    }
}

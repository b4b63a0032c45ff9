//! Pixel buffer packing
//!
//! Lays `smart-leds` colors out in a strip's wire component order. This is
//! a byte permutation only; no color math happens here.

use core::convert::Infallible;

use smart_leds::{RGB8, RGBW, SmartLedsWrite};

/// Wire order of the color components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorOrder {
    Rgb,
    Rbg,
    #[default]
    Grb,
    Gbr,
    Brg,
    Bgr,
}

impl ColorOrder {
    /// Components of `color` in wire order
    pub const fn arrange(self, color: RGB8) -> [u8; 3] {
        let RGB8 { r, g, b } = color;
        match self {
            Self::Rgb => [r, g, b],
            Self::Rbg => [r, b, g],
            Self::Grb => [g, r, b],
            Self::Gbr => [g, b, r],
            Self::Brg => [b, r, g],
            Self::Bgr => [b, g, r],
        }
    }
}

/// Pack RGB colors into `pixels`, returning the number of pixels written.
///
/// Stops at whichever runs out first, the colors or the buffer.
pub fn write_rgb<I>(pixels: &mut [u8], order: ColorOrder, colors: I) -> usize
where
    I: IntoIterator<Item = RGB8>,
{
    pixels
        .chunks_exact_mut(3)
        .zip(colors)
        .map(|(pixel, color)| pixel.copy_from_slice(&order.arrange(color)))
        .count()
}

/// Pack RGBW colors, white last, into `pixels`
pub fn write_rgbw<I>(pixels: &mut [u8], order: ColorOrder, colors: I) -> usize
where
    I: IntoIterator<Item = RGBW<u8>>,
{
    pixels
        .chunks_exact_mut(4)
        .zip(colors)
        .map(|(pixel, color)| {
            let rgb = RGB8::new(color.r, color.g, color.b);
            pixel[..3].copy_from_slice(&order.arrange(rgb));
            pixel[3] = color.a.0;
        })
        .count()
}

/// `SmartLedsWrite` adapter over a pixel buffer.
///
/// Writing only fills the buffer; the frame goes out on the next `show`.
pub struct PixelWriter<'p> {
    pixels: &'p mut [u8],
    order: ColorOrder,
}

impl<'p> PixelWriter<'p> {
    pub const fn new(pixels: &'p mut [u8], order: ColorOrder) -> Self {
        Self { pixels, order }
    }
}

impl SmartLedsWrite for PixelWriter<'_> {
    type Error = Infallible;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        write_rgb(self.pixels, self.order, iterator.into_iter().map(Into::into));
        Ok(())
    }
}

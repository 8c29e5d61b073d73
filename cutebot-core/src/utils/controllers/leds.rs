//! Neopixel control for the Cutebot.
//!
//! The two underbody pixels are wired straight to a controller pin, not to the
//! expansion board, so they never touch the I2C bus. The strip keeps its own
//! frame buffer and pushes the whole buffer through `SmartLedsWrite` after
//! every change.

use smart_leds_trait::{SmartLedsWrite, RGB8};

use crate::utils::controllers::protocol::{LightTarget, BLACK};

/// Number of pixels on the Cutebot chassis.
pub const PIXEL_COUNT: usize = 2;

const LEFT: usize = 0;
const RIGHT: usize = 1;

/// Buffered driver for the two chassis neopixels.
pub struct PixelStrip<Driver> {
    driver: Driver,
    pixels: [RGB8; PIXEL_COUNT],
}

impl<Driver, E> PixelStrip<Driver>
where
    Driver: SmartLedsWrite<Color = RGB8, Error = E>,
{
    /// Create a strip over `driver`; the buffer starts black and nothing is
    /// written until the first update.
    pub fn new(driver: Driver) -> Self {
        Self {
            driver,
            pixels: [BLACK; PIXEL_COUNT],
        }
    }

    /// Current contents of the frame buffer.
    pub fn pixels(&self) -> &[RGB8; PIXEL_COUNT] {
        &self.pixels
    }

    /// Set one or both pixels, or clear both with `LightTarget::None`.
    pub fn set_neopixels(
        &mut self,
        target: LightTarget,
        color: RGB8,
    ) -> Result<(), E> {
        match target {
            LightTarget::None => self.pixels = [BLACK; PIXEL_COUNT],
            LightTarget::Left => self.pixels[LEFT] = color,
            LightTarget::Right => self.pixels[RIGHT] = color,
            LightTarget::Both => self.pixels = [color; PIXEL_COUNT],
        }
        self.show()
    }

    fn show(&mut self) -> Result<(), E> {
        self.driver.write(self.pixels.iter().copied())
    }
}

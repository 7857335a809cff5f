use std::time::Duration;

use jifplay::{Clock, PixelSink, Rgb};

/// 2x2 canvas, 4 color global table, two full-canvas frames of 10 and 20 centiseconds.
pub const TWO_FRAMES: &[u8] = &[
    b'G', b'I', b'F', b'8', b'9', b'a', //
    0x02, 0x00, 0x02, 0x00, 0x81, 0x00, 0x00, //
    0xff, 0x00, 0x00, 0x00, 0xff, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, //
    0x21, 0xf9, 0x04, 0x00, 0x0a, 0x00, 0x00, 0x00, //
    0x2c, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x02, 0x00, 0x00, //
    0x02, 0x03, 0x44, 0x34, 0x05, 0x00, //
    0x21, 0xf9, 0x04, 0x04, 0x14, 0x00, 0x00, 0x00, //
    0x2c, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x02, 0x00, 0x00, //
    0x02, 0x03, 0x9c, 0x02, 0x05, 0x00, //
    0x3b,
];

pub const RED: Rgb = Rgb::new(255, 0, 0);
pub const GREEN: Rgb = Rgb::new(0, 255, 0);
pub const BLUE: Rgb = Rgb::new(0, 0, 255);
pub const WHITE: Rgb = Rgb::new(255, 255, 255);

#[derive(Debug, Default)]
pub struct CountingSink {
    pub clears: usize,
    pub pixels: Vec<(u16, u16, Rgb)>,
    pub presents: usize,
}

impl PixelSink for CountingSink {
    fn clear_screen(&mut self) {
        self.clears += 1;
    }

    fn draw_pixel(&mut self, x: u16, y: u16, color: Rgb) {
        self.pixels.push((x, y, color));
    }

    fn present(&mut self) {
        self.presents += 1;
    }
}

#[derive(Debug, Default)]
pub struct FakeClock {
    pub now: Duration,
    pub deadlines: Vec<Duration>,
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep_until(&mut self, deadline: Duration) {
        self.deadlines.push(deadline);
        self.now = self.now.max(deadline);
    }
}

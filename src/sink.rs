#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Destination for resolved pixels, e.g. an led matrix or a framebuffer.
///
/// Every call is blocking. `draw_row` and `begin_frame_drawing` have default
/// implementations so a minimal sink only needs pixels, clear and present.
pub trait PixelSink {
    fn clear_screen(&mut self);

    fn draw_pixel(&mut self, x: u16, y: u16, color: Rgb);

    /// Draw a horizontal run of opaque pixels starting at `(x, y)`.
    fn draw_row(&mut self, x: u16, y: u16, run: &[Rgb]) {
        for (i, color) in run.iter().enumerate() {
            self.draw_pixel(x + i as u16, y, *color);
        }
    }

    /// Fired once per frame before any pixel of that frame is pushed.
    fn begin_frame_drawing(&mut self) {}

    /// Called once per completed frame.
    fn present(&mut self);
}

impl<P: PixelSink + ?Sized> PixelSink for &mut P {
    fn clear_screen(&mut self) {
        (**self).clear_screen()
    }

    fn draw_pixel(&mut self, x: u16, y: u16, color: Rgb) {
        (**self).draw_pixel(x, y, color)
    }

    fn draw_row(&mut self, x: u16, y: u16, run: &[Rgb]) {
        (**self).draw_row(x, y, run)
    }

    fn begin_frame_drawing(&mut self) {
        (**self).begin_frame_drawing()
    }

    fn present(&mut self) {
        (**self).present()
    }
}

/// In-memory RGB framebuffer that keeps whatever was last drawn.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u16,
    height: u16,
    pixels: Vec<Rgb>,
    presented: usize,
}

impl FrameBuffer {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb::BLACK; width as usize * height as usize],
            presented: 0,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Number of frames presented so far.
    pub fn presented(&self) -> usize {
        self.presented
    }
}

impl PixelSink for FrameBuffer {
    fn clear_screen(&mut self) {
        self.pixels.fill(Rgb::BLACK);
    }

    fn draw_pixel(&mut self, x: u16, y: u16, color: Rgb) {
        if x < self.width && y < self.height {
            self.pixels[y as usize * self.width as usize + x as usize] = color;
        }
    }

    fn draw_row(&mut self, x: u16, y: u16, run: &[Rgb]) {
        if y >= self.height || x >= self.width {
            return;
        }
        let start = y as usize * self.width as usize + x as usize;
        let len = run.len().min((self.width - x) as usize);
        self.pixels[start..start + len].copy_from_slice(&run[..len]);
    }

    fn present(&mut self) {
        self.presented += 1;
    }
}

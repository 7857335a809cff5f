/// Smallest table the decoder is allowed to run with.
pub const MIN_LZW_BITS: u8 = 10;
/// GIF never uses codes wider than 12 bits.
pub const MAX_LZW_BITS: u8 = 12;

/// Limits and policies applied while decoding a stream.
///
/// ```
/// let options = jifplay::DecodeOptions::default()
///     .max_size(64, 32)
///     .lzw_max_bits(10);
/// assert_eq!(options.lzw_bits(), 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub(crate) max_width: u16,
    pub(crate) max_height: u16,
    pub(crate) lzw_max_bits: u8,
    pub(crate) max_image_data: usize,
    pub(crate) strict: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_width: 4096,
            max_height: 4096,
            lzw_max_bits: MAX_LZW_BITS,
            max_image_data: 16 * 1024 * 1024,
            strict: false,
        }
    }
}

impl DecodeOptions {
    /// Set the largest canvas that will be accepted.
    pub fn max_size(mut self, width: u16, height: u16) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    /// Set the widest lzw code the decoder tables are sized for, clamped to 10..=12.
    pub fn lzw_max_bits(mut self, bits: u8) -> Self {
        self.lzw_max_bits = bits.clamp(MIN_LZW_BITS, MAX_LZW_BITS);
        self
    }

    /// Set the cap on staged compressed bytes for a single image block.
    pub fn max_image_data(mut self, bytes: usize) -> Self {
        self.max_image_data = bytes;
        self
    }

    /// Turn staging overflows into hard errors instead of degraded frames.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn lzw_bits(&self) -> u8 {
        self.lzw_max_bits
    }
}

mod bit_reader;
mod decoder;
mod lzw;

pub use decoder::{
    Decoder, Frame, FrameInfo, GraphicControlExtension, ImageDescriptor, LogicalScreenDescriptor,
    Rect, Version,
};
pub use lzw::LzwDecoder;

use crate::error::{GifError, Result};
use crate::sink::Rgb;

#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisposalMethod {
    #[default]
    None = 0,
    Leave = 1,
    RestoreBackground = 2,
    RestoreToPrevious = 3,
}

impl DisposalMethod {
    /// Values outside of 0..=3 are treated as `None`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => DisposalMethod::Leave,
            2 => DisposalMethod::RestoreBackground,
            3 => DisposalMethod::RestoreToPrevious,
            _ => DisposalMethod::None,
        }
    }
}

const INTERLACED_PASSES: [(usize, usize); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];
const SEQUENTIAL_PASS: [(usize, usize); 1] = [(0, 1)];

/// Frame-relative row that each successive decoded row belongs to.
///
/// Interlaced images are stored in four passes: every 8th row from 0, every
/// 8th row from 4, every 4th row from 2 and every 2nd row from 1.
#[derive(Debug, Clone)]
pub struct RowOrder {
    height: usize,
    passes: &'static [(usize, usize)],
    pass: usize,
    next: usize,
}

impl RowOrder {
    pub fn new(height: u16, interlaced: bool) -> Self {
        let passes: &'static [(usize, usize)] = if interlaced {
            &INTERLACED_PASSES
        } else {
            &SEQUENTIAL_PASS
        };

        Self {
            height: height.into(),
            passes,
            pass: 0,
            next: passes[0].0,
        }
    }
}

impl Iterator for RowOrder {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while let Some(&(_, step)) = self.passes.get(self.pass) {
            if self.next < self.height {
                let row = self.next;
                self.next += step;
                return Some(row);
            }

            self.pass += 1;
            if let Some(&(start, _)) = self.passes.get(self.pass) {
                self.next = start;
            }
        }
        None
    }
}

/// Number of entries described by the 3-bit size field of a packed byte.
pub fn color_table_len(size_bits: u8) -> usize {
    1 << ((size_bits & 0b00000111) + 1)
}

/// Inverse of [`color_table_len`].
pub fn color_table_size_bits(len: usize) -> Option<u8> {
    if len.is_power_of_two() && (2..=256).contains(&len) {
        Some(len.trailing_zeros() as u8 - 1)
    } else {
        None
    }
}

/// Packed byte of the logical screen descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenFields {
    pub global_color_table: bool,
    pub color_resolution: u8,
    pub sorted: bool,
    pub table_size_bits: u8,
}

impl ScreenFields {
    pub fn from_byte(packed_fields: u8) -> Self {
        Self {
            global_color_table: packed_fields & 0b10000000 != 0,
            color_resolution: (packed_fields >> 4) & 0b00000111,
            sorted: packed_fields & 0b00001000 != 0,
            table_size_bits: packed_fields & 0b00000111,
        }
    }

    pub fn to_byte(self) -> u8 {
        (self.global_color_table as u8) << 7
            | (self.color_resolution & 0b111) << 4
            | (self.sorted as u8) << 3
            | self.table_size_bits & 0b111
    }
}

/// Packed byte of an image descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageFields {
    pub local_color_table: bool,
    pub interlaced: bool,
    pub sorted: bool,
    pub table_size_bits: u8,
}

impl ImageFields {
    pub fn from_byte(packed_fields: u8) -> Self {
        Self {
            local_color_table: packed_fields & 0b10000000 != 0,
            interlaced: packed_fields & 0b01000000 != 0,
            sorted: packed_fields & 0b00100000 != 0,
            table_size_bits: packed_fields & 0b00000111,
        }
    }

    pub fn to_byte(self) -> u8 {
        (self.local_color_table as u8) << 7
            | (self.interlaced as u8) << 6
            | (self.sorted as u8) << 5
            | self.table_size_bits & 0b111
    }
}

/// A global or local palette. Its length is always a power of two in 2..=256.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    colors: Vec<Rgb>,
}

impl ColorTable {
    /// Build a table from packed `r g b` triples.
    pub fn from_rgb_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 3 != 0 || color_table_size_bits(bytes.len() / 3).is_none() {
            return Err(GifError::bad_format(format!(
                "color table of {} bytes is not a power of two count of rgb triples",
                bytes.len()
            )));
        }

        let colors = bytes
            .chunks_exact(3)
            .map(|rgb| Rgb::new(rgb[0], rgb[1], rgb[2]))
            .collect();
        Ok(Self { colors })
    }

    /// Fallback palette for streams that carry neither a global nor a local table.
    pub fn grayscale() -> Self {
        let colors = (0..=255u8).map(|v| Rgb::new(v, v, v)).collect();
        Self { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Resolve a palette index, indexes past the end of the table map to black.
    pub fn color(&self, index: u8) -> Rgb {
        self.colors.get(index as usize).copied().unwrap_or(Rgb::BLACK)
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }
}

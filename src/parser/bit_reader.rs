use crate::error::{GifError, Result};

/// Staging buffer for an image's data sub-blocks with an lsb-first bit cursor.
///
/// Sub-blocks are kept with their length prefix, the cursor skips over the
/// prefixes lazily while it pulls bytes into the bit buffer.
#[derive(Debug)]
pub(crate) struct BitReader {
    buf: Vec<u8>,
    limit: usize,
    // index of the next staged byte to pull
    position: usize,
    block_remaining: usize,
    bit_buffer: u32,
    bit_count: u32,
}

impl BitReader {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
            position: 0,
            block_remaining: 0,
            bit_buffer: 0,
            bit_count: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.buf.clear();
        self.position = 0;
        self.block_remaining = 0;
        self.bit_buffer = 0;
        self.bit_count = 0;
    }

    /// Append one data sub-block. The buffer grows on demand up to its limit,
    /// a sub-block that does not fit is rejected and nothing is written.
    pub(crate) fn push_sub_block(&mut self, data: &[u8]) -> Result<()> {
        debug_assert!(!data.is_empty() && data.len() <= u8::MAX as usize);

        if self.buf.len() + data.len() + 1 > self.limit {
            return Err(GifError::DecodeOverflow { limit: self.limit });
        }
        self.buf.push(data.len() as u8);
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Number of staged bytes, length prefixes included.
    pub(crate) fn staged_len(&self) -> usize {
        self.buf.len()
    }

    /// Read the next `count` bit code, `None` once the staged data runs out.
    pub(crate) fn next(&mut self, count: u32) -> Option<u16> {
        debug_assert!(count <= 16);

        while self.bit_count < count {
            if self.block_remaining == 0 {
                let block_size = *self.buf.get(self.position)?;
                self.position += 1;
                if block_size == 0 {
                    return None;
                }
                self.block_remaining = block_size.into();
            }

            let byte = *self.buf.get(self.position)?;
            self.position += 1;
            self.block_remaining -= 1;

            self.bit_buffer |= (byte as u32) << self.bit_count;
            self.bit_count += 8;
        }

        let value = (self.bit_buffer & ((1 << count) - 1)) as u16;
        self.bit_buffer >>= count;
        self.bit_count -= count;
        Some(value)
    }
}

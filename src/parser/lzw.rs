use super::bit_reader::BitReader;
use crate::error::{GifError, Result};

use log::{trace, warn};

/// Variable width GIF-LZW decoder.
///
/// The code tables are allocated once for `max_code_bits` and reused for
/// every image block, [`LzwDecoder::init`] resets them for the next block.
/// Output is pulled with [`LzwDecoder::decode`], any part of a code's string
/// that did not fit into the caller's buffer stays on the stack and is
/// emitted by the next call.
#[derive(Debug)]
pub struct LzwDecoder {
    max_code_bits: u32,
    reader: BitReader,

    prefix: Box<[u16]>,
    suffix: Box<[u8]>,
    stack: Vec<u8>,

    minimum_code_size: u32,
    code_size: u32,
    clear_code: u16,
    end_of_information_code: u16,
    first_free: u16,
    next_slot: u16,
    top_slot: u16,

    first_symbol: Option<u8>,
    last_code: Option<u16>,

    finished: bool,
    corrupt: bool,
}

impl LzwDecoder {
    pub fn new(max_code_bits: u8, staging_limit: usize) -> Self {
        let table_size = 1usize << max_code_bits;
        Self {
            max_code_bits: max_code_bits.into(),
            reader: BitReader::new(staging_limit),
            prefix: vec![0; table_size].into_boxed_slice(),
            suffix: vec![0; table_size].into_boxed_slice(),
            stack: Vec::with_capacity(table_size + 1),
            minimum_code_size: 0,
            code_size: 0,
            clear_code: 0,
            end_of_information_code: 0,
            first_free: 0,
            next_slot: 0,
            top_slot: 0,
            first_symbol: None,
            last_code: None,
            finished: true,
            corrupt: false,
        }
    }

    /// Prepare for a new image block, discarding any staged data.
    pub fn init(&mut self, minimum_code_size: u8) -> Result<()> {
        if !(2..=8).contains(&minimum_code_size) {
            return Err(GifError::InvalidCodeSize(minimum_code_size));
        }

        self.reader.reset();
        self.stack.clear();
        self.minimum_code_size = minimum_code_size.into();
        self.clear_code = 1 << minimum_code_size;
        self.end_of_information_code = self.clear_code + 1;
        self.first_free = self.clear_code + 2;
        self.finished = false;
        self.corrupt = false;
        self.reset_table();
        Ok(())
    }

    /// Stage one data sub-block of the current image.
    pub fn push_sub_block(&mut self, data: &[u8]) -> Result<()> {
        self.reader.push_sub_block(data)
    }

    pub fn staged_len(&self) -> usize {
        self.reader.staged_len()
    }

    /// True once the end code was read, the data ran out or a corrupt code was found.
    pub fn is_finished(&self) -> bool {
        self.finished && self.stack.is_empty()
    }

    /// True if decoding stopped on a code that could not have been produced by an encoder.
    pub fn hit_corrupt_code(&self) -> bool {
        self.corrupt
    }

    fn reset_table(&mut self) {
        self.code_size = self.minimum_code_size + 1;
        self.top_slot = 1 << self.code_size;
        self.next_slot = self.first_free;
        self.first_symbol = None;
        self.last_code = None;
    }

    /// Fill `out` with palette indexes, returning how many were produced.
    /// Returns less than `out.len()` only when the block's data is exhausted.
    pub fn decode(&mut self, out: &mut [u8]) -> usize {
        let mut produced = 0;

        loop {
            while produced < out.len() {
                match self.stack.pop() {
                    Some(symbol) => {
                        out[produced] = symbol;
                        produced += 1;
                    }
                    None => break,
                }
            }
            if produced == out.len() || self.finished {
                return produced;
            }

            let Some(code) = self.reader.next(self.code_size) else {
                self.finished = true;
                return produced;
            };

            if code == self.end_of_information_code {
                self.finished = true;
                return produced;
            }

            if code == self.clear_code {
                trace!("clear code after {} table entries", self.next_slot - self.first_free);
                self.reset_table();
                continue;
            }

            let mut current = code;
            if code == self.next_slot {
                // the code being defined by this very step: previous string plus its first symbol
                match (self.first_symbol, self.last_code) {
                    (Some(first_symbol), Some(last_code)) => {
                        self.stack.push(first_symbol);
                        current = last_code;
                    }
                    _ => {
                        self.stop_on_corrupt_code(code);
                        return produced;
                    }
                }
            } else if code > self.next_slot {
                self.stop_on_corrupt_code(code);
                return produced;
            }

            while current >= self.first_free {
                self.stack.push(self.suffix[current as usize]);
                current = self.prefix[current as usize];
            }
            let root = current as u8;
            self.stack.push(root);

            if self.next_slot < self.top_slot {
                if let Some(last_code) = self.last_code {
                    self.suffix[self.next_slot as usize] = root;
                    self.prefix[self.next_slot as usize] = last_code;
                    self.next_slot += 1;
                }
            }
            self.first_symbol = Some(root);
            self.last_code = Some(code);

            if self.next_slot >= self.top_slot && self.code_size < self.max_code_bits {
                self.code_size += 1;
                self.top_slot <<= 1;
            }
        }
    }

    fn stop_on_corrupt_code(&mut self, code: u16) {
        warn!(
            "lzw code {} is past the next free slot {}, dropping the rest of the image data",
            code, self.next_slot
        );
        self.finished = true;
        self.corrupt = true;
    }
}

//! Helpers shared by the unit tests: a reference lzw encoder, a gif stream
//! builder and recording sinks and clocks.

use crate::parser::{color_table_size_bits, DisposalMethod, ImageFields, RowOrder, ScreenFields};
use crate::player::Clock;
use crate::sink::{PixelSink, Rgb};

use std::collections::HashMap;
use std::time::Duration;

/// Deterministic xorshift bytes.
pub fn pseudo_random(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct EncodeParams {
    minimum_code_size: u8,
    max_bits: u8,
    clear_every: Option<usize>,
}

impl EncodeParams {
    pub fn new(minimum_code_size: u8) -> Self {
        Self {
            minimum_code_size,
            max_bits: 12,
            clear_every: None,
        }
    }

    pub fn max_bits(mut self, bits: u8) -> Self {
        self.max_bits = bits;
        self
    }

    /// Emit a clear code after every `codes` data codes.
    pub fn clear_every(mut self, codes: usize) -> Self {
        self.clear_every = Some(codes);
        self
    }
}

#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    acc: u32,
    bits: u32,
}

impl BitWriter {
    fn write(&mut self, code: u16, width: u32) {
        self.acc |= u32::from(code) << self.bits;
        self.bits += width;
        while self.bits >= 8 {
            self.bytes.push(self.acc as u8);
            self.acc >>= 8;
            self.bits -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            self.bytes.push(self.acc as u8);
        }
        self.bytes
    }
}

struct Encoder {
    params: EncodeParams,
    writer: BitWriter,
    table: HashMap<(u16, u8), u16>,
    clear_code: u16,
    width: u32,
    next: u16,
    limit: u16,
    codes_since_clear: usize,
}

impl Encoder {
    fn new(params: EncodeParams) -> Self {
        let clear_code = 1u16 << params.minimum_code_size;
        Self {
            params,
            writer: BitWriter::default(),
            table: HashMap::new(),
            clear_code,
            width: u32::from(params.minimum_code_size) + 1,
            next: clear_code + 2,
            limit: 1u16 << params.max_bits,
            codes_since_clear: 0,
        }
    }

    fn grow(&mut self) {
        if u32::from(self.next) > 1 << self.width && self.width < u32::from(self.params.max_bits) {
            self.width += 1;
        }
    }

    fn emit(&mut self, code: u16) {
        self.writer.write(code, self.width);
        self.codes_since_clear += 1;
    }

    /// The decoder adds an entry for the last code before a clear or end
    /// code too, and may widen its reads because of it.
    fn close_segment(&mut self) {
        if self.codes_since_clear > 1 && self.next < self.limit {
            self.next += 1;
            self.grow();
        }
    }

    fn clear(&mut self) {
        self.writer.write(self.clear_code, self.width);
        self.table.clear();
        self.width = u32::from(self.params.minimum_code_size) + 1;
        self.next = self.clear_code + 2;
        self.codes_since_clear = 0;
    }

    fn encode(mut self, data: &[u8]) -> Vec<u8> {
        self.clear();

        let mut current: Option<u16> = None;
        for &symbol in data {
            let Some(prefix) = current else {
                current = Some(symbol.into());
                continue;
            };
            if let Some(&code) = self.table.get(&(prefix, symbol)) {
                current = Some(code);
                continue;
            }

            self.emit(prefix);
            if self
                .params
                .clear_every
                .is_some_and(|every| self.codes_since_clear >= every)
            {
                self.close_segment();
                self.clear();
            } else if self.next < self.limit {
                self.table.insert((prefix, symbol), self.next);
                self.next += 1;
                self.grow();
            }
            current = Some(symbol.into());
        }

        if let Some(prefix) = current {
            self.emit(prefix);
            self.close_segment();
        }
        self.writer.write(self.clear_code + 1, self.width);
        self.writer.finish()
    }
}

/// Compress `data` the way a gif encoder would, without sub-block framing.
pub fn lzw_encode(data: &[u8], params: EncodeParams) -> Vec<u8> {
    Encoder::new(params).encode(data)
}

fn write_sub_blocks(out: &mut Vec<u8>, data: &[u8]) {
    for chunk in data.chunks(255) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out.push(0);
}

fn write_color_table(out: &mut Vec<u8>, colors: &[Rgb]) -> u8 {
    let len = colors.len().max(2).next_power_of_two();
    for i in 0..len {
        let color = colors.get(i).copied().unwrap_or(Rgb::BLACK);
        out.extend_from_slice(&[color.r, color.g, color.b]);
    }
    color_table_size_bits(len).unwrap_or(7)
}

/// An image block in canvas row order.
#[derive(Debug, Clone)]
pub struct TestImage {
    left: u16,
    top: u16,
    width: u16,
    height: u16,
    indices: Vec<u8>,
    local_table: Option<Vec<Rgb>>,
    interlaced: bool,
}

impl TestImage {
    pub fn new(left: u16, top: u16, width: u16, height: u16, indices: Vec<u8>) -> Self {
        Self {
            left,
            top,
            width,
            height,
            indices,
            local_table: None,
            interlaced: false,
        }
    }

    pub fn local_table(mut self, colors: &[Rgb]) -> Self {
        self.local_table = Some(colors.to_vec());
        self
    }

    /// Store the rows in interlaced pass order.
    pub fn interlaced(mut self) -> Self {
        self.interlaced = true;
        self
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.push(0x2c);
        for value in [self.left, self.top, self.width, self.height] {
            out.extend_from_slice(&value.to_le_bytes());
        }

        let mut table = Vec::new();
        let table_size_bits = self
            .local_table
            .as_ref()
            .map(|colors| write_color_table(&mut table, colors))
            .unwrap_or(0);
        let fields = ImageFields {
            local_color_table: self.local_table.is_some(),
            interlaced: self.interlaced,
            sorted: false,
            table_size_bits,
        };
        out.push(fields.to_byte());
        out.extend_from_slice(&table);

        let stream_order: Vec<u8> = if self.interlaced && self.width > 0 {
            let rows: Vec<&[u8]> = self.indices.chunks(self.width as usize).collect();
            RowOrder::new(self.height, true)
                .filter_map(|row| rows.get(row).copied())
                .flatten()
                .copied()
                .collect()
        } else {
            self.indices.clone()
        };

        let largest = self.indices.iter().copied().max().unwrap_or(0);
        let minimum_code_size = (8 - largest.leading_zeros() as u8).max(2);
        out.push(minimum_code_size);
        write_sub_blocks(out, &lzw_encode(&stream_order, EncodeParams::new(minimum_code_size)));
    }
}

/// Assembles GIF89a streams block by block.
#[derive(Debug, Clone)]
pub struct GifBuilder {
    width: u16,
    height: u16,
    background: u8,
    global_table: Option<Vec<Rgb>>,
    blocks: Vec<u8>,
}

impl GifBuilder {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            background: 0,
            global_table: None,
            blocks: Vec::new(),
        }
    }

    pub fn global_table(mut self, colors: &[Rgb]) -> Self {
        self.global_table = Some(colors.to_vec());
        self
    }

    pub fn background(mut self, index: u8) -> Self {
        self.background = index;
        self
    }

    pub fn control(
        mut self,
        disposal_method: DisposalMethod,
        delay_time: u16,
        transparent_index: Option<u8>,
    ) -> Self {
        let packed = (disposal_method as u8) << 2 | transparent_index.is_some() as u8;
        self.blocks.extend_from_slice(&[0x21, 0xf9, 0x04, packed]);
        self.blocks.extend_from_slice(&delay_time.to_le_bytes());
        self.blocks.push(transparent_index.unwrap_or(0));
        self.blocks.push(0);
        self
    }

    pub fn comment(mut self, text: &[u8]) -> Self {
        self.blocks.extend_from_slice(&[0x21, 0xfe]);
        write_sub_blocks(&mut self.blocks, text);
        self
    }

    pub fn image(mut self, image: TestImage) -> Self {
        image.write(&mut self.blocks);
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.blocks.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = b"GIF89a".to_vec();
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());

        let mut table = Vec::new();
        let table_size_bits = self
            .global_table
            .as_ref()
            .map(|colors| write_color_table(&mut table, colors));
        let fields = ScreenFields {
            global_color_table: table_size_bits.is_some(),
            color_resolution: 7,
            sorted: false,
            table_size_bits: table_size_bits.unwrap_or(0),
        };
        out.push(fields.to_byte());
        out.push(self.background);
        out.push(0);
        out.extend_from_slice(&table);

        out.extend_from_slice(&self.blocks);
        out.push(0x3b);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkEvent {
    Clear,
    Pixel(u16, u16, Rgb),
    BeginFrame,
    Present,
}

/// Sink that remembers every call made to it.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
}

impl RecordingSink {
    pub fn pixels(&self) -> Vec<(u16, u16, Rgb)> {
        self.events
            .iter()
            .filter_map(|event| match *event {
                SinkEvent::Pixel(x, y, color) => Some((x, y, color)),
                _ => None,
            })
            .collect()
    }

    pub fn pixel_count(&self) -> usize {
        self.count(|event| matches!(event, SinkEvent::Pixel(..)))
    }

    pub fn present_count(&self) -> usize {
        self.count(|event| *event == SinkEvent::Present)
    }

    pub fn begin_count(&self) -> usize {
        self.count(|event| *event == SinkEvent::BeginFrame)
    }

    fn count(&self, predicate: impl Fn(&SinkEvent) -> bool) -> usize {
        self.events.iter().filter(|event| predicate(event)).count()
    }
}

impl PixelSink for RecordingSink {
    fn clear_screen(&mut self) {
        self.events.push(SinkEvent::Clear);
    }

    fn draw_pixel(&mut self, x: u16, y: u16, color: Rgb) {
        self.events.push(SinkEvent::Pixel(x, y, color));
    }

    fn begin_frame_drawing(&mut self) {
        self.events.push(SinkEvent::BeginFrame);
    }

    fn present(&mut self) {
        self.events.push(SinkEvent::Present);
    }
}

/// Clock that only moves when told to, sleeping jumps straight to the deadline.
#[derive(Debug, Default)]
pub struct ManualClock {
    pub now: Duration,
    /// Every deadline passed to `sleep_until`, in order.
    pub sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep_until(&mut self, deadline: Duration) {
        self.sleeps.push(deadline);
        self.now = self.now.max(deadline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_writes_a_minimal_stream() {
        let bytes = GifBuilder::new(2, 1).global_table(&[Rgb::new(1, 2, 3)]).build();
        assert_eq!(&bytes[..6], b"GIF89a");
        assert_eq!(&bytes[6..13], &[2, 0, 1, 0, 0xf0, 0, 0]);
        assert_eq!(&bytes[13..19], &[1, 2, 3, 0, 0, 0]);
        assert_eq!(bytes[19], 0x3b);
    }

    #[test]
    fn encoder_matches_hand_assembled_codes() {
        assert_eq!(lzw_encode(&[0, 1, 2, 3], EncodeParams::new(2)), vec![0x44, 0x34, 0x05]);
    }
}

use super::lzw::LzwDecoder;
use super::{color_table_len, ColorTable, DisposalMethod, ImageFields, RowOrder, ScreenFields};
use crate::compositor::Compositor;
use crate::error::{GifError, Result};
use crate::options::DecodeOptions;
use crate::sink::PixelSink;
use crate::source::ByteSource;

use log::{debug, warn};

use std::fmt::Debug;
use std::io;

const EXTENSION_INTRODUCER: u8 = 0x21;
const IMAGE_DESCRIPTOR_LABEL: u8 = 0x2c;
const TRAILER_LABEL: u8 = 0x3b;

// Extension labels
const APPLICATION_EXTENSION: u8 = 0xff;
const COMMENT_EXTENSION: u8 = 0xfe;
const GRAPHIC_CONTROL_EXTENSION: u8 = 0xf9;
const PLAIN_TEXT_EXTENSION: u8 = 0x01;

#[derive(Debug)]
enum ExtensionType {
    Application,
    Comment,
    GraphicControl,
    PlainText,
}

impl TryFrom<u8> for ExtensionType {
    type Error = GifError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        use ExtensionType::*;

        match value {
            APPLICATION_EXTENSION => Ok(Application),
            COMMENT_EXTENSION => Ok(Comment),
            GRAPHIC_CONTROL_EXTENSION => Ok(GraphicControl),
            PLAIN_TEXT_EXTENSION => Ok(PlainText),

            _ => Err(GifError::UnknownExtension(value)),
        }
    }
}

/// Rendering parameters for exactly one image block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphicControlExtension {
    pub disposal_method: DisposalMethod,
    pub user_input_flag: bool,
    /// Hundredths of a second.
    pub delay_time: u16,
    pub transparent_index: Option<u8>,
}

impl GraphicControlExtension {
    /// Delay in milliseconds, never shorter than one centisecond.
    pub fn delay_ms(&self) -> u32 {
        u32::from(self.delay_time.max(1)) * 10
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub fn new(left: u16, top: u16, width: u16, height: u16) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The part of this rect that lies within a `width` x `height` canvas.
    pub fn clip(&self, width: u16, height: u16) -> Rect {
        let left = self.left.min(width);
        let top = self.top.min(height);
        let right = (self.left as u32 + self.width as u32).min(width as u32) as u16;
        let bottom = (self.top as u32 + self.height as u32).min(height as u32) as u16;

        Rect {
            left,
            top,
            width: right - left,
            height: bottom - top,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub rect: Rect,
    pub local_color_table_flag: bool,
    pub interlace_flag: bool,
    pub sort_flag: bool,
    pub local_color_table_size: Option<usize>,
    pub minimum_code_size: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V87a,
    V89a,
}

impl TryFrom<&[u8]> for Version {
    type Error = GifError;

    fn try_from(value: &[u8]) -> std::result::Result<Self, Self::Error> {
        match value {
            b"GIF87a" => Ok(Version::V87a),
            b"GIF89a" => Ok(Version::V89a),
            _ => Err(GifError::NotAGif),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalScreenDescriptor {
    pub screen_width: u16,
    pub screen_height: u16,
    pub global_color_table_flag: bool,
    pub color_resolution: u8,
    pub sort_flag: bool,
    pub global_color_table_size: Option<usize>,
    pub background_color_index: u8,
    pub pixel_aspect_ratio: u8,
}

/// Everything known about a decoded image block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Position of the frame within the current pass over the stream, starting at 0.
    pub index: usize,
    pub descriptor: ImageDescriptor,
    pub control: GraphicControlExtension,
    /// The part of the image rect that lies on the canvas.
    pub visible: Rect,
    /// Pixel count announced by the image descriptor.
    pub expected_pixels: usize,
    /// Pixel count actually produced by the lzw decoder.
    pub decoded_pixels: usize,
    /// Set when compressed data was dropped, truncated or corrupt.
    pub degraded: bool,
}

impl FrameInfo {
    pub fn delay_ms(&self) -> u32 {
        self.control.delay_ms()
    }
}

/// A decoded image block, borrowed from the decoder until the next call.
#[derive(Debug)]
pub struct Frame<'a> {
    pub info: FrameInfo,
    /// Local color table if the block had one, otherwise the global one.
    pub palette: &'a ColorTable,
    /// Palette indexes of the visible rect in canvas row order, `None` where
    /// the image data ended before reaching the pixel.
    pub pixels: &'a [Option<u8>],
}

impl Frame<'_> {
    /// Decoded indexes of the visible rect, row by row.
    pub fn decoded_indices(&self) -> impl Iterator<Item = u8> + '_ {
        self.pixels.iter().flatten().copied()
    }
}

#[derive(Debug)]
struct PendingImage {
    descriptor: ImageDescriptor,
    control: GraphicControlExtension,
}

#[derive(Debug)]
enum ParserState {
    ProcessMagic,
    ProcessLogicalScreenDescriptor,
    ProcessGlobalColorTable(usize),
    ProcessTrailer,

    DetermineNextBlock(Option<GraphicControlExtension>),
    ProcessExtension(u8, Option<GraphicControlExtension>),
    ProcessImageDescriptor(Option<GraphicControlExtension>),
    ProcessLocalColorTable(PendingImage),
    ProcessImageData(PendingImage),

    Done,
    Failed,
}

/// Streaming GIF container parser.
///
/// Walks the stream one block at a time and hands out every image block as a
/// [`Frame`]. Graphic control extensions are carried along to the next image
/// block only, local color tables live for their own block only.
pub struct Decoder<S: ByteSource> {
    inner: S,
    options: DecodeOptions,
    source_size: Option<u64>,
    state: ParserState,

    version: Option<Version>,
    logical_screen_descriptor: Option<LogicalScreenDescriptor>,
    global_color_table: Option<ColorTable>,
    local_color_table: Option<ColorTable>,
    fallback_color_table: ColorTable,

    lzw: LzwDecoder,
    pixels: Vec<Option<u8>>,
    row: Vec<u8>,
    frame_ready: Option<FrameInfo>,
    frames_decoded: usize,
}

impl<S: ByteSource> Debug for Decoder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("state", &self.state)
            .field("version", &self.version)
            .field("logical_screen_descriptor", &self.logical_screen_descriptor)
            .field("frames_decoded", &self.frames_decoded)
            .finish_non_exhaustive()
    }
}

impl<S: ByteSource> Decoder<S> {
    pub fn new(inner: S, options: DecodeOptions) -> Self {
        let mut inner = inner;
        let source_size = inner.size();

        Self {
            inner,
            options,
            source_size,
            state: ParserState::ProcessMagic,
            version: None,
            logical_screen_descriptor: None,
            global_color_table: None,
            local_color_table: None,
            fallback_color_table: ColorTable::grayscale(),
            lzw: LzwDecoder::new(options.lzw_max_bits, options.max_image_data),
            pixels: Vec::new(),
            row: Vec::new(),
            frame_ready: None,
            frames_decoded: 0,
        }
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    pub fn logical_screen(&self) -> Option<&LogicalScreenDescriptor> {
        self.logical_screen_descriptor.as_ref()
    }

    pub fn global_color_table(&self) -> Option<&ColorTable> {
        self.global_color_table.as_ref()
    }

    /// Image blocks decoded since the last rewind.
    pub fn frames_decoded(&self) -> usize {
        self.frames_decoded
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Parse the header, logical screen descriptor and global color table.
    pub fn read_header(&mut self) -> Result<LogicalScreenDescriptor> {
        while matches!(
            self.state,
            ParserState::ProcessMagic
                | ParserState::ProcessLogicalScreenDescriptor
                | ParserState::ProcessGlobalColorTable(_)
        ) {
            self.step()?;
        }

        self.logical_screen_descriptor.ok_or_else(|| {
            GifError::bad_format("stream failed before its logical screen descriptor")
        })
    }

    /// Decode up to and including the next image block.
    ///
    /// Returns `Ok(None)` once the trailer has been read.
    pub fn next_frame(&mut self) -> Result<Option<Frame<'_>>> {
        loop {
            match self.state {
                ParserState::Done => return Ok(None),
                ParserState::Failed => {
                    return Err(GifError::bad_format(
                        "decoder stopped on an earlier error, rewind before decoding again",
                    ))
                }
                _ => {}
            }

            self.step()?;

            if let Some(info) = self.frame_ready.take() {
                let palette = self
                    .local_color_table
                    .as_ref()
                    .or(self.global_color_table.as_ref())
                    .unwrap_or(&self.fallback_color_table);

                return Ok(Some(Frame {
                    info,
                    palette,
                    pixels: &self.pixels,
                }));
            }
        }
    }

    /// Seek back to the start of the source and parse from the header again.
    pub fn rewind(&mut self) -> Result<()> {
        self.inner.seek(0)?;
        self.state = ParserState::ProcessMagic;
        self.version = None;
        self.logical_screen_descriptor = None;
        self.global_color_table = None;
        self.local_color_table = None;
        self.frame_ready = None;
        self.frames_decoded = 0;
        Ok(())
    }

    /// Decode every remaining frame into `sink` without any pacing, returning the frame count.
    pub fn parse_stream<P: PixelSink>(&mut self, sink: &mut P) -> Result<usize> {
        let screen = self.read_header()?;
        let mut compositor = Compositor::new(
            screen.screen_width,
            screen.screen_height,
            screen.background_color_index,
        );
        compositor.begin_cycle();

        while let Some(frame) = self.next_frame()? {
            compositor.apply_frame(&frame, sink);
            sink.present();
        }

        debug!("stream finished after {} frames", self.frames_decoded);
        Ok(self.frames_decoded)
    }

    fn step(&mut self) -> Result<()> {
        let state = std::mem::replace(&mut self.state, ParserState::Failed);
        debug!("begin parsing state {:?}", state);

        // on error the state stays `Failed` until the next rewind
        self.state = self.process_next_state(state)?;
        Ok(())
    }

    fn process_next_state(&mut self, next_state: ParserState) -> Result<ParserState> {
        use ParserState::*;

        match next_state {
            ProcessMagic => {
                let signature = self.read_bytes(6)?;
                self.version = Some(Version::try_from(signature.as_slice())?);
                debug!("processed signature, got {:?}", self.version);

                Ok(ProcessLogicalScreenDescriptor)
            }
            ProcessLogicalScreenDescriptor => {
                let screen_width = self.read_u16()?;
                let screen_height = self.read_u16()?;

                let packed_fields = ScreenFields::from_byte(self.read_byte()?);

                let background_color_index = self.read_byte()?;
                let pixel_aspect_ratio = self.read_byte()?;

                if screen_width == 0 || screen_height == 0 {
                    return Err(GifError::bad_format(format!(
                        "logical screen of {}x{} has no pixels",
                        screen_width, screen_height
                    )));
                }
                self.check_size(screen_width, screen_height)?;

                let global_color_table_size = packed_fields
                    .global_color_table
                    .then(|| color_table_len(packed_fields.table_size_bits));

                let screen = LogicalScreenDescriptor {
                    screen_width,
                    screen_height,
                    global_color_table_flag: packed_fields.global_color_table,
                    color_resolution: packed_fields.color_resolution,
                    sort_flag: packed_fields.sorted,
                    global_color_table_size,
                    background_color_index,
                    pixel_aspect_ratio,
                };
                debug!("processed logical screen descriptor, got: {:#?}", screen);
                self.logical_screen_descriptor = Some(screen);

                let next_state = match global_color_table_size {
                    Some(size) => ProcessGlobalColorTable(size),
                    None => DetermineNextBlock(None),
                };

                Ok(next_state)
            }
            ProcessGlobalColorTable(size) => {
                let bytes = self.read_bytes(size * 3)?;
                self.global_color_table = Some(ColorTable::from_rgb_bytes(&bytes)?);
                debug!("processed global color table with {} colors", size);

                Ok(DetermineNextBlock(None))
            }
            ProcessTrailer => {
                debug!("processed trailer after {} frames", self.frames_decoded);
                Ok(Done)
            }
            DetermineNextBlock(graphic_control_extension) => {
                let introducer_or_label = self.read_byte()?;

                match introducer_or_label {
                    // extension introducer means that a label follows determining what exact type
                    // of extension it is.
                    EXTENSION_INTRODUCER => {
                        Ok(ProcessExtension(self.read_byte()?, graphic_control_extension))
                    }
                    IMAGE_DESCRIPTOR_LABEL => {
                        Ok(ProcessImageDescriptor(graphic_control_extension))
                    }
                    TRAILER_LABEL => Ok(ProcessTrailer),
                    label => Err(GifError::bad_format(format!(
                        "encountered unexpected block label 0x{:02x}",
                        label
                    ))),
                }
            }
            ProcessExtension(label, graphic_control_extension) => {
                self.process_extension(ExtensionType::try_from(label)?, graphic_control_extension)
            }
            ProcessImageDescriptor(graphic_control_extension) => {
                let left = self.read_u16()?;
                let top = self.read_u16()?;

                let width = self.read_u16()?;
                let height = self.read_u16()?;

                let packed_fields = ImageFields::from_byte(self.read_byte()?);

                let local_color_table_size = packed_fields
                    .local_color_table
                    .then(|| color_table_len(packed_fields.table_size_bits));

                // a local table only ever applies to its own image block
                self.local_color_table = None;

                let pending = PendingImage {
                    descriptor: ImageDescriptor {
                        rect: Rect::new(left, top, width, height),
                        local_color_table_flag: packed_fields.local_color_table,
                        interlace_flag: packed_fields.interlaced,
                        sort_flag: packed_fields.sorted,
                        local_color_table_size,
                        minimum_code_size: 0,
                    },
                    control: graphic_control_extension.unwrap_or_default(),
                };
                debug!("processed image descriptor, got: {:#?}", pending.descriptor);

                let next_state = if local_color_table_size.is_some() {
                    ProcessLocalColorTable(pending)
                } else {
                    ProcessImageData(pending)
                };

                Ok(next_state)
            }
            ProcessLocalColorTable(pending) => {
                let size = pending.descriptor.local_color_table_size.unwrap_or(0);

                let bytes = self.read_bytes(size * 3)?;
                self.local_color_table = Some(ColorTable::from_rgb_bytes(&bytes)?);

                Ok(ProcessImageData(pending))
            }
            ProcessImageData(mut pending) => {
                let minimum_code_size = self.read_byte()?;
                pending.descriptor.minimum_code_size = minimum_code_size;
                self.lzw.init(minimum_code_size)?;

                let overflowed = self.stage_image_data()?;

                let frame_rect = pending.descriptor.rect;
                let visible = self.visible_rect(frame_rect);
                let expected_pixels = frame_rect.area();
                let interlaced = pending.descriptor.interlace_flag;
                let decoded_pixels = self.decode_rows(frame_rect, visible, interlaced);

                if decoded_pixels < expected_pixels {
                    warn!(
                        "image data ended after {} of {} pixels",
                        decoded_pixels, expected_pixels
                    );
                }
                let degraded =
                    overflowed || self.lzw.hit_corrupt_code() || decoded_pixels < expected_pixels;

                self.frame_ready = Some(FrameInfo {
                    index: self.frames_decoded,
                    descriptor: pending.descriptor,
                    control: pending.control,
                    visible,
                    expected_pixels,
                    decoded_pixels,
                    degraded,
                });
                self.frames_decoded += 1;

                Ok(DetermineNextBlock(None))
            }
            Done => Ok(Done),
            Failed => Ok(Failed),
        }
    }

    fn process_extension(
        &mut self,
        label: ExtensionType,
        graphic_control_extension: Option<GraphicControlExtension>,
    ) -> Result<ParserState> {
        use ExtensionType::*;

        debug!("processing extension type: {:?}", label);
        match label {
            Application => {
                let data = self.read_data_sub_blocks()?;
                let identifier = &data[..data.len().min(8)];
                debug!(
                    "skipped application block {}",
                    String::from_utf8_lossy(identifier)
                );
            }
            Comment => {
                let data = self.read_data_sub_blocks()?;
                debug!(
                    "skipped comment block, got: {}",
                    String::from_utf8_lossy(&data)
                );
            }
            GraphicControl => {
                let block_size = self.read_byte()?;
                if block_size != 4 {
                    return Err(GifError::bad_format(format!(
                        "graphic control extension has a body of {} bytes, expected 4",
                        block_size
                    )));
                }

                let packed_fields = self.read_byte()?;
                // packed fields definition
                // XXXYYYZW
                // XXX = reserved, not needed
                // YYY = disposal method, indicates what to do with graphic after displaying
                // Z = user input flag
                // W = transparent color flag

                let disposal_method = DisposalMethod::from_u8((packed_fields >> 2) & 0b00000111);
                let user_input_flag = packed_fields & 0b00000010 != 0;
                let transparent_color_flag = packed_fields & 0b00000001 != 0;

                let delay_time = self.read_u16()?;
                let transparent_color_index = self.read_byte()?;

                let block_terminator = self.read_byte()?;
                if block_terminator != 0 {
                    return Err(GifError::bad_format(
                        "graphic control extension is missing its block terminator",
                    ));
                }

                let graphic_control_extension = GraphicControlExtension {
                    disposal_method,
                    user_input_flag,
                    delay_time,
                    transparent_index: transparent_color_flag.then_some(transparent_color_index),
                };

                debug!(
                    "processed GraphicControlExtension: {:#?}",
                    graphic_control_extension
                );

                return Ok(ParserState::DetermineNextBlock(Some(graphic_control_extension)));
            }
            PlainText => {
                // header and text alike are plain sub-blocks, nothing is rendered
                self.skip_data_sub_blocks()?;
            }
        }

        Ok(ParserState::DetermineNextBlock(graphic_control_extension))
    }

    fn check_size(&self, width: u16, height: u16) -> Result<()> {
        if width > self.options.max_width || height > self.options.max_height {
            return Err(GifError::TooLarge {
                width,
                height,
                max_width: self.options.max_width,
                max_height: self.options.max_height,
            });
        }
        Ok(())
    }

    fn visible_rect(&self, frame_rect: Rect) -> Rect {
        let (width, height) = self
            .logical_screen_descriptor
            .map(|screen| (screen.screen_width, screen.screen_height))
            .unwrap_or_default();
        frame_rect.clip(width, height)
    }

    /// Decode the staged data one frame row at a time, keeping only the part
    /// of each row that lands inside `visible`. Returns the decoded pixel count.
    fn decode_rows(&mut self, frame_rect: Rect, visible: Rect, interlaced: bool) -> usize {
        self.pixels.clear();
        self.pixels.resize(visible.area(), None);
        self.row.clear();
        self.row.resize(frame_rect.width as usize, 0);

        if frame_rect.is_empty() {
            return 0;
        }

        let bottom = visible.top as usize + visible.height as usize;
        let mut decoded_pixels = 0;

        for row in RowOrder::new(frame_rect.height, interlaced) {
            let produced = self.lzw.decode(&mut self.row);
            decoded_pixels += produced;

            let y = frame_rect.top as usize + row;
            if y < bottom {
                let start = (y - visible.top as usize) * visible.width as usize;
                let columns = produced.min(visible.width as usize);
                for (pixel, &index) in self.pixels[start..start + columns]
                    .iter_mut()
                    .zip(&self.row[..columns])
                {
                    *pixel = Some(index);
                }
            }

            if produced < self.row.len() {
                break;
            }
        }

        decoded_pixels
    }

    /// Move the image's data sub-blocks into the lzw staging buffer.
    /// Returns true when sub-blocks had to be dropped to stay within the limit.
    fn stage_image_data(&mut self) -> Result<bool> {
        let mut overflowed = false;
        let mut block = [0u8; 255];

        loop {
            let block_size = self.read_byte()? as usize;
            if block_size == 0 {
                break;
            }
            self.read_into(&mut block[..block_size])?;

            match self.lzw.push_sub_block(&block[..block_size]) {
                Ok(()) => {}
                Err(err @ GifError::DecodeOverflow { .. }) => {
                    if self.options.strict {
                        return Err(err);
                    }
                    if !overflowed {
                        warn!("{}, dropping sub-blocks until the end of the image", err);
                    }
                    overflowed = true;
                }
                Err(err) => return Err(err),
            }
        }

        debug!("staged {} bytes of image data", self.lzw.staged_len());
        Ok(overflowed)
    }

    fn ensure_available(&mut self, count: usize) -> Result<()> {
        if let Some(size) = self.source_size {
            let position = self.inner.tell()?;
            if position + count as u64 > size {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("{} bytes requested at offset {} of {}", count, position, size),
                )
                .into());
            }
        }
        Ok(())
    }

    fn read_into(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.ensure_available(buffer.len())?;
        let read = self.inner.read_block(buffer)?;
        if read < buffer.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, got {}", buffer.len(), read),
            )
            .into());
        }
        Ok(())
    }

    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0; count];
        self.read_into(&mut buffer)?;
        Ok(buffer)
    }

    fn read_byte(&mut self) -> Result<u8> {
        Ok(self.inner.read_byte()?)
    }

    fn read_u16(&mut self) -> Result<u16> {
        // GIF89a: Unless otherwise stated, multi-byte numeric fields are ordered with the Least
        // Significant Byte first.

        let mut buffer: [u8; 2] = [0; 2];
        self.read_into(&mut buffer)?;
        Ok(u16::from_le_bytes(buffer))
    }

    fn read_data_sub_blocks(&mut self) -> Result<Vec<u8>> {
        let mut block_size = self.read_byte()?;

        // there could be more than one block, but we do know we'll at least have 1 sub-block.
        // allocate capacity to account for it.
        let mut result = Vec::with_capacity(block_size.into());

        // we might have read the block terminator at the end of the while loop, stop right there
        // because we're done.
        while block_size != 0 {
            let start = result.len();
            result.resize(start + block_size as usize, 0);
            self.read_into(&mut result[start..])?;

            block_size = self.read_byte()?;
        }

        Ok(result)
    }

    fn skip_data_sub_blocks(&mut self) -> Result<()> {
        let mut block = [0u8; 255];
        loop {
            let block_size = self.read_byte()? as usize;
            if block_size == 0 {
                return Ok(());
            }
            self.read_into(&mut block[..block_size])?;
        }
    }
}

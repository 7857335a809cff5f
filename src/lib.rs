//! Streaming GIF decoder and player for small displays.

pub mod compositor;
pub mod error;
pub mod options;
pub mod parser;
pub mod player;
pub mod sink;
pub mod source;

#[cfg(test)]
mod test_support;

pub use compositor::Compositor;
pub use error::{GifError, Result};
pub use options::DecodeOptions;
pub use parser::{
    ColorTable, Decoder, DisposalMethod, Frame, FrameInfo, GraphicControlExtension,
    ImageDescriptor, LogicalScreenDescriptor, LzwDecoder, Rect, RowOrder, Version,
};
pub use player::{Clock, FrameStatus, Player, SystemClock};
pub use sink::{FrameBuffer, PixelSink, Rgb};
pub use source::ByteSource;

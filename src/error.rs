use thiserror::Error;

pub type Result<T> = std::result::Result<T, GifError>;

#[derive(Error, Debug)]
pub enum GifError {
    #[error("signature is invalid, expected GIF87a or GIF89a")]
    NotAGif,

    #[error("malformed gif stream: {0}")]
    BadFormat(String),

    #[error("encountered extension with label 0x{0:02x}, this label is not supported")]
    UnknownExtension(u8),

    #[error("failed to read from byte source")]
    ReadFailure(#[from] std::io::Error),

    #[error("compressed image data exceeds the staging limit of {limit} bytes")]
    DecodeOverflow { limit: usize },

    #[error("canvas of {width}x{height} exceeds the limit of {max_width}x{max_height}")]
    TooLarge {
        width: u16,
        height: u16,
        max_width: u16,
        max_height: u16,
    },

    #[error("minimum lzw code size {0} is outside of 2..=8")]
    InvalidCodeSize(u8),
}

impl GifError {
    pub(crate) fn bad_format(reason: impl Into<String>) -> Self {
        GifError::BadFormat(reason.into())
    }
}

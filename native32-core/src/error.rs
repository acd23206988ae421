use thiserror::Error;

use crate::image::ImageError;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("no _YUV or ARGB header found in file")]
    HeaderNotFound,
    #[error("no candidate key decrypted the directory sub-header")]
    HeaderKeyNotFound,
    #[error("record at offset {offset} ({what}) runs past end of file")]
    TruncatedRecord { offset: usize, what: &'static str },
    #[error("image decode failed")]
    BadImageOp(#[from] ImageError),
    #[error("sound table entry 0x{ptr:08x} selects an unsupported format")]
    UnsupportedSoundFormat { ptr: u32 },
}

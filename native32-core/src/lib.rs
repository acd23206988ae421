//! Container parsing for Native32 titles: header cipher, image codecs, and a
//! lazily-memoized random-access reader over frames, movies, images, sounds,
//! buttons, and bytecode instructions.

pub mod container;
pub mod des;
pub mod error;
pub mod image;

pub use container::{
    ActionCode, ByteStore, Colorspace, ContainerHeader, FrameObject, Instruction, MovieFrame,
    Native32Container, ObjectKind, Payload, SoundFormat, SoundRecord,
};
pub use error::ContainerError;
pub use image::{DecodedImage, ImageError};

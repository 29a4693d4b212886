#![cfg_attr(not(feature = "trace"), no_std)]
#![forbid(unsafe_code)]
//#![warn(missing_docs)]
//! Decoder and encoder for a small family of pixel-matrix animation streams:
//! length-prefixed frames of palette-indexed or raw-truecolor square
//! canvases, a recursive quadtree ("fix") format for 64x64 frames, and the
//! compact 121-pixel `pic`/`multipic` container formats.

// `Canvas`, `PaletteStore`, and frame-event payloads are all `Vec`-backed;
// an allocator is load-bearing throughout this crate, not just behind the
// `pic`/`multipic` container formats, so this is unconditional despite the
// `alloc` Cargo feature (kept for API-surface parity with the crate this
// one's modeled on).
extern crate alloc;

#[cfg(feature = "trace")]
extern crate std;

#[macro_export]
macro_rules! trace {
  ($($arg:tt)*) => {
    #[cfg(feature = "trace")] {
      ::std::print!("{file}:{line}> ", file = file!(), line = line!());
      ::std::println!($($arg)*);
    }
  }
}

mod bit_reader;
mod block;
mod canvas;
mod decoder;
mod error;
mod fix;
mod frame;
#[cfg(feature = "alloc")]
mod multipic;
mod palette;
#[cfg(feature = "alloc")]
mod pic;
mod util;

pub use bit_reader::BitReader;
pub use canvas::{xy_to_index, Canvas, CanvasSize};
pub use decoder::{DecodedFrame, Decoder, FrameEvent};
pub use error::PixError;
pub use frame::{count_frames, FrameIter, FrameSlice};
pub use palette::PaletteStore;

#[cfg(feature = "alloc")]
pub use multipic::{decode_multipic, encode_multipic, DecodedMultipicFrame, MultipicFrame};
#[cfg(feature = "alloc")]
pub use pic::{decode_pic, encode_pic, Rgb4, PIC_PIXELS};

pub type PixResult<T> = Result<T, PixError>;

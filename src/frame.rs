//! Frame-stream parsing: magic byte validation, length-prefixed iteration.

use crate::{util::u16_le, PixError};

const MAGIC: u8 = 0xAA;
/// magic + length + delay + kind
const HEADER_LEN: usize = 6;

/// Bit pattern of kinds < 0x11 that `pass_review` must skip past rather than
/// stop on: 0x05, 0x06, 0x07, 0x09, 0x0A.
const FORBIDDEN_SKIP_MASK: u32 = 0x6e0;
/// Bit pattern of kinds < 0x11 that `pass_review` must stop on: 0x00 and
/// 0x0B..=0x10.
const FORBIDDEN_STOP_MASK: u32 = 0x1f801;

/// Whether `pass_review` must skip this (unmasked, high-bit-included) kind
/// byte rather than treat it as the next decodable frame.
///
/// Grounded in `divoom_image_decode_decode_pass_review`: kinds below 0x11 are
/// looked up in two fixed bitmasks (`0x6e0` selects the always-skip kinds,
/// `0x1f801` selects the always-stop kinds); everything else, and every kind
/// at or above 0x11, stops unless its high bit is set, in which case it's
/// skipped the same way the high-bit "variant" tag is on the original.
fn is_forbidden_after_corruption(kind_raw: u8) -> bool {
  if kind_raw < 0x11 {
    let bit = 1_u32 << u32::from(kind_raw);
    if bit & FORBIDDEN_SKIP_MASK != 0 {
      return true;
    }
    if bit & FORBIDDEN_STOP_MASK != 0 {
      return false;
    }
  }
  (kind_raw as i8) < 0
}

/// One self-delimited frame: the header fields plus the kind-specific
/// payload that follows byte 5.
#[derive(Debug, Clone, Copy)]
pub struct FrameSlice<'b> {
  /// Total frame length in bytes, header inclusive.
  pub length: u16,
  /// Frame delay in milliseconds.
  pub delay: u16,
  /// Raw kind byte, high bit (variant flag) included. Dispatch should mask
  /// with `0x7F` (see [`Self::kind`]).
  pub kind_raw: u8,
  /// Everything from byte 6 of the frame onward.
  pub payload: &'b [u8],
  /// The whole frame, header included.
  pub whole: &'b [u8],
}
impl<'b> FrameSlice<'b> {
  /// The kind byte masked to its low 7 bits, for dispatch.
  #[inline]
  #[must_use]
  pub const fn kind(&self) -> u8 {
    self.kind_raw & 0x7F
  }
}

/// Iterates the frames of an animation stream.
///
/// Mirrors `PngChunkIter`'s shape: a single borrowed slice that shrinks as
/// frames are consumed, with `next()` doing all the bounds checking so that
/// every other component can assume it's looking at a validated frame.
#[derive(Debug, Clone)]
pub struct FrameIter<'b> {
  bytes: &'b [u8],
  cursor: usize,
  started: bool,
}

impl<'b> FrameIter<'b> {
  /// Starts iterating `bytes`. Does not itself validate the first magic
  /// byte — that happens lazily on the first call to `next()`, matching
  /// `next_frame`'s behavior of treating "stream doesn't start with 0xAA" as
  /// plain exhaustion rather than an up-front special case.
  #[inline]
  #[must_use]
  pub fn new(bytes: &'b [u8]) -> Self {
    Self { bytes, cursor: 0, started: false }
  }

  /// The byte offset of the frame that would be returned by the next call
  /// to `next()`.
  #[inline]
  #[must_use]
  pub fn cursor(&self) -> usize {
    self.cursor
  }

  /// Recovery step matching the original decoder's `pass_review`: advances
  /// the cursor past any frames whose kind is in the fixed forbidden set,
  /// without decoding them, stopping at the next frame that's safe to
  /// attempt (or at exhaustion). Unlike `next()`, a frame with a bad or
  /// missing magic byte does not stop the scan — its declared length is
  /// still trusted to find the next boundary, exactly as the original does.
  ///
  /// This is a recovery-only operation: ordinary iteration via `next()`
  /// never calls it, since several kinds this function treats as
  /// "forbidden" (word/text metadata, effect descriptors) are ordinarily
  /// decoded as opaque passthrough events rather than skipped.
  pub fn pass_review(&mut self) {
    loop {
      if self.cursor + 3 > self.bytes.len() {
        return;
      }
      let length = u16_le(&self.bytes[self.cursor + 1..self.cursor + 3]) as usize;
      if self.bytes[self.cursor] == MAGIC {
        match self.bytes.get(self.cursor + 5) {
          Some(&kind_raw) if !is_forbidden_after_corruption(kind_raw) => return,
          _ => {}
        }
      }
      if length == 0 {
        return;
      }
      self.cursor += length;
    }
  }
}

impl<'b> Iterator for FrameIter<'b> {
  type Item = Result<FrameSlice<'b>, PixError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.bytes.is_empty() {
      return None;
    }
    if self.cursor + HEADER_LEN + 1 > self.bytes.len() {
      return None;
    }
    if self.bytes[self.cursor] != MAGIC {
      // Not a frame boundary. A first call that immediately fails this check
      // means the stream never had a valid magic byte at all; anywhere else
      // it means we've run off the end of the real frame chain into trailing
      // garbage. Both are plain exhaustion, not an error: `cursor` only ever
      // advances by a frame's own declared `length`, so revisiting an offset
      // we've already computed as a boundary can't happen as long as that
      // length is nonzero, which the check below enforces.
      if !self.started {
        return None;
      }
      return None;
    }
    self.started = true;
    let length = u16_le(&self.bytes[self.cursor + 1..self.cursor + 3]) as usize;
    if length < HEADER_LEN + 1 {
      // A frame can't declare itself shorter than its own header; treat this
      // the same as the "recurring boundary" corruption case from §3 since
      // accepting it would stall the cursor and loop forever.
      return Some(Err(PixError::TruncatedFrame));
    }
    if self.cursor + length > self.bytes.len() {
      return Some(Err(PixError::TruncatedFrame));
    }
    let whole = &self.bytes[self.cursor..self.cursor + length];
    let delay = u16_le(&whole[3..5]);
    let kind_raw = whole[5];
    let payload = &whole[HEADER_LEN..];
    self.cursor += length;
    Some(Ok(FrameSlice { length: length as u16, delay, kind_raw, payload, whole }))
  }
}

/// Counts the number of successfully-parsed frames in `bytes`, stopping at
/// the first error or at exhaustion. Mirrors `first_frame`/frame-counting in
/// the original decoder.
#[must_use]
pub fn count_frames(bytes: &[u8]) -> usize {
  FrameIter::new(bytes).take_while(|f| f.is_ok()).count()
}

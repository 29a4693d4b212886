//! Top-level dispatch: turns a byte stream into a sequence of decoded
//! frames, choosing Block, Fix, raw-truecolor, or opaque-passthrough
//! handling by the frame's kind byte (§6).

use alloc::vec::Vec;

use crate::{
  block::{decode_block_into, decode_raw_truecolor_into, CountFieldWidth},
  canvas::{Canvas, CanvasSize},
  fix::decode_fix_frame,
  frame::{FrameIter, FrameSlice},
  palette::PaletteStore,
  PixError,
};

const KIND_16_RESET: u8 = 0x00;
const KIND_16_EXTEND: u8 = 0x01;
const KIND_32_RAW: u8 = 0x02;
const KIND_32_EXTEND: u8 = 0x03;
const KIND_32_EXTEND_BIG: u8 = 0x04;
const KIND_WORD_INFO: u8 = 0x05;
const KIND_EFFECT: u8 = 0x06;
const KIND_64_RAW_A: u8 = 0x0B;
const KIND_64_RESET_A: u8 = 0x0C;
const KIND_64_EXTEND_A: u8 = 0x0D;
const KIND_64_RAW_B: u8 = 0x0E;
const KIND_64_RESET_B: u8 = 0x0F;
const KIND_64_EXTEND_B: u8 = 0x10;
const KIND_128_RAW: u8 = 0x11;
const KIND_128_RESET_A: u8 = 0x12;
const KIND_128_EXTEND: u8 = 0x13;
const KIND_128_RESET_B: u8 = 0x14;
const KIND_FIX: u8 = 0x15;

/// What a frame's kind byte says to do with the palette before decoding its
/// bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PaletteOp {
  /// No palette involved (raw truecolor).
  None,
  /// Drop the existing palette and rebuild it from this frame's entries.
  Reset,
  /// Append this frame's entries to the existing palette.
  Extend,
}

struct KindInfo {
  side: u32,
  count_width: CountFieldWidth,
  op: PaletteOp,
  raw: bool,
}

fn kind_info(kind: u8) -> Result<KindInfo, PixError> {
  use CountFieldWidth::{Narrow, Wide};
  use PaletteOp::{Extend, None as NoPalette, Reset};
  Ok(match kind {
    KIND_16_RESET => KindInfo { side: 16, count_width: Narrow, op: Reset, raw: false },
    KIND_16_EXTEND => KindInfo { side: 16, count_width: Narrow, op: Extend, raw: false },
    KIND_32_RAW => KindInfo { side: 32, count_width: Narrow, op: NoPalette, raw: true },
    KIND_32_EXTEND => KindInfo { side: 32, count_width: Narrow, op: Extend, raw: false },
    KIND_32_EXTEND_BIG => KindInfo { side: 32, count_width: Wide, op: Extend, raw: false },
    KIND_64_RAW_A | KIND_64_RAW_B => {
      KindInfo { side: 64, count_width: Narrow, op: NoPalette, raw: true }
    }
    KIND_64_RESET_A | KIND_64_RESET_B => {
      KindInfo { side: 64, count_width: Wide, op: Reset, raw: false }
    }
    KIND_64_EXTEND_A | KIND_64_EXTEND_B => {
      KindInfo { side: 64, count_width: Wide, op: Extend, raw: false }
    }
    KIND_128_RAW => KindInfo { side: 128, count_width: Narrow, op: NoPalette, raw: true },
    KIND_128_RESET_A | KIND_128_RESET_B => {
      KindInfo { side: 128, count_width: Wide, op: Reset, raw: false }
    }
    KIND_128_EXTEND => KindInfo { side: 128, count_width: Wide, op: Extend, raw: false },
    _ => return Err(PixError::UnsupportedKind),
  })
}

/// One decoded unit of work pulled off the stream.
#[derive(Debug, Clone)]
pub enum FrameEvent {
  /// A frame that produced pixels.
  Image(DecodedFrame),
  /// Kind `0x05`: text-overlay metadata. Opaque to this crate; see §9's open
  /// question about its contents.
  WordInfo(Vec<u8>),
  /// Kind `0x06`: effect descriptor. Opaque to this crate.
  Effect(Vec<u8>),
}

/// A decoded image frame: its delay and its pixels.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
  /// Frame delay in milliseconds.
  pub delay_ms: u16,
  /// The decoded pixels, upscaled to the requested canvas size if needed.
  pub canvas: Canvas,
}

enum InputStorage<'b> {
  Borrowed(&'b [u8]),
  #[cfg(feature = "alloc")]
  Owned(Vec<u8>),
}
impl<'b> InputStorage<'b> {
  #[inline]
  fn as_slice(&self) -> &[u8] {
    match self {
      Self::Borrowed(b) => b,
      #[cfg(feature = "alloc")]
      Self::Owned(v) => v,
    }
  }
}

/// Decodes a stream of frames one at a time, keeping the palette state that
/// continuation frames depend on across calls.
///
/// `cursor` only ever advances by a frame's own declared length (see
/// `frame::FrameIter`), and `palette` is carried across `decode_next_frame`
/// calls exactly as §3 describes; nothing else is threaded through.
pub struct Decoder<'b> {
  input: InputStorage<'b>,
  cursor: usize,
  palette: PaletteStore,
}

impl<'b> Decoder<'b> {
  /// Borrows `bytes` for the lifetime of the decoder.
  #[inline]
  #[must_use]
  pub fn new(bytes: &'b [u8]) -> Self {
    Self { input: InputStorage::Borrowed(bytes), cursor: 0, palette: PaletteStore::new() }
  }

  /// Copies `bytes` into an owned buffer, so the resulting decoder has no
  /// lifetime dependency on the caller's slice.
  #[cfg(feature = "alloc")]
  #[must_use]
  pub fn new_owned(bytes: &[u8]) -> Decoder<'static> {
    Decoder { input: InputStorage::Owned(bytes.to_vec()), cursor: 0, palette: PaletteStore::new() }
  }

  /// Rewinds to the start of the stream without touching the palette.
  #[inline]
  pub fn reset(&mut self) {
    self.cursor = 0;
  }

  /// The current byte offset of the next frame to be decoded.
  #[inline]
  #[must_use]
  pub fn cursor(&self) -> usize {
    self.cursor
  }

  /// The number of RGB entries currently held in the palette.
  #[inline]
  #[must_use]
  pub fn palette_len(&self) -> usize {
    self.palette.count()
  }

  /// Recovery helper matching §4.3's `pass_review`: advances the cursor past
  /// any frames whose kind is in the original decoder's fixed forbidden set,
  /// leaving it at the next frame that's safe to attempt decoding (or at the
  /// end of the stream). Intended to be called after `decode_next_frame` has
  /// returned an error, to relocate past a corrupted frame; it does not
  /// retry the decode itself.
  pub fn pass_review(&mut self) {
    let bytes = self.input.as_slice();
    let mut iter = FrameIter::new(&bytes[self.cursor..]);
    iter.pass_review();
    self.cursor += iter.cursor();
  }

  fn dispatch_image(
    &mut self, frame: &FrameSlice<'_>, requested: CanvasSize,
  ) -> Result<DecodedFrame, PixError> {
    let kind = frame.kind();
    if kind == KIND_FIX {
      if requested.side() < 64 {
        return Err(PixError::OutputSizeMismatch);
      }
      let mut canvas = Canvas::new(requested);
      let consumed = decode_fix_frame(frame.whole, &mut self.palette, &mut canvas)?;
      if consumed > frame.whole.len() {
        return Err(PixError::TruncatedFrame);
      }
      if requested.side() != 64 {
        canvas.upscale_in_place(64)?;
      }
      return Ok(DecodedFrame { delay_ms: frame.delay, canvas });
    }

    let info = kind_info(kind)?;
    if info.side > requested.side() {
      return Err(PixError::OutputSizeMismatch);
    }
    let mut canvas = Canvas::new(requested);
    if info.raw {
      decode_raw_truecolor_into(frame.whole, 6, info.side, &mut canvas)?;
    } else {
      let (palette_count, palette_start) =
        crate::block::read_palette_count(frame.whole, info.count_width)?;
      let palette_bytes = frame
        .whole
        .get(palette_start..palette_start + 3 * palette_count)
        .ok_or(PixError::TruncatedFrame)?;
      match info.op {
        PaletteOp::Reset => self.palette.reset(palette_bytes, palette_count)?,
        PaletteOp::Extend => self.palette.extend(palette_bytes, palette_count)?,
        PaletteOp::None => unreachable!("indexed kinds never have PaletteOp::None"),
      }
      decode_block_into(frame.whole, info.count_width, info.side, &self.palette, &mut canvas)?;
    }
    if requested.side() != info.side {
      canvas.upscale_in_place(info.side)?;
    }
    Ok(DecodedFrame { delay_ms: frame.delay, canvas })
  }

  /// Decodes the next frame in the stream into a canvas of the requested
  /// size, returning `Ok(None)` once the stream is exhausted.
  pub fn decode_next_frame(
    &mut self, requested: CanvasSize,
  ) -> Result<Option<FrameEvent>, PixError> {
    let bytes = self.input.as_slice();
    if self.cursor >= bytes.len() {
      return Ok(None);
    }
    let remaining = &bytes[self.cursor..];
    let mut iter = FrameIter::new(remaining);
    let frame = match iter.next() {
      None => return Ok(None),
      Some(Err(e)) => return Err(e),
      Some(Ok(f)) => f,
    };
    let frame_len = frame.length as usize;
    let event = match frame.kind() {
      KIND_WORD_INFO => FrameEvent::WordInfo(frame.payload.to_vec()),
      KIND_EFFECT => FrameEvent::Effect(frame.payload.to_vec()),
      _ => FrameEvent::Image(self.dispatch_image(&frame, requested)?),
    };
    self.cursor += frame_len;
    Ok(Some(event))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn frame(kind: u8, delay: u16, payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    let length = (6 + payload.len()) as u16;
    v.push(0xAA);
    v.extend_from_slice(&length.to_le_bytes());
    v.extend_from_slice(&delay.to_le_bytes());
    v.push(kind);
    v.extend_from_slice(payload);
    v
  }

  #[test]
  fn minimal_truecolor_32x32_roundtrips_bytes() {
    let pixels: Vec<u8> = (0..32 * 32 * 3).map(|i| (i % 256) as u8).collect();
    let stream = frame(0x02, 12, &pixels);
    let mut dec = Decoder::new(&stream);
    match dec.decode_next_frame(CanvasSize::S32).unwrap().unwrap() {
      FrameEvent::Image(img) => {
        assert_eq!(img.delay_ms, 12);
        assert_eq!(img.canvas.as_rgb_bytes(), &pixels[..]);
      }
      _ => panic!("expected an image frame"),
    }
    assert!(dec.decode_next_frame(CanvasSize::S32).unwrap().is_none());
  }

  #[test]
  fn single_color_16x16_indexed() {
    let mut payload = alloc::vec::Vec::new();
    payload.push(1); // palette count
    payload.extend_from_slice(&[10, 20, 30]);
    payload.extend(core::iter::repeat(0u8).take((16 * 16 * 1 + 7) / 8));
    let stream = frame(0x00, 0, &payload);
    let mut dec = Decoder::new(&stream);
    let img = match dec.decode_next_frame(CanvasSize::S16).unwrap().unwrap() {
      FrameEvent::Image(img) => img,
      _ => panic!(),
    };
    for y in 0..16 {
      for x in 0..16 {
        assert_eq!(img.canvas.get(x, y), pixel_formats::r8g8b8_Unorm { r: 10, g: 20, b: 30 });
      }
    }
  }

  #[test]
  fn palette_continuation_extends_across_frames() {
    let mut first_payload = alloc::vec::Vec::new();
    first_payload.push(4);
    first_payload.extend(core::iter::repeat(0u8).take(4 * 3));
    first_payload.extend(core::iter::repeat(0u8).take((16 * 16 * 2 + 7) / 8));
    let mut stream = frame(0x00, 0, &first_payload);

    let mut second_payload = alloc::vec::Vec::new();
    second_payload.push(2);
    second_payload.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
    second_payload.extend(core::iter::repeat(0u8).take((16 * 16 * 3 + 7) / 8));
    stream.extend(frame(0x01, 0, &second_payload));

    let mut dec = Decoder::new(&stream);
    assert!(matches!(dec.decode_next_frame(CanvasSize::S16).unwrap(), Some(FrameEvent::Image(_))));
    assert_eq!(dec.palette_len(), 4);
    assert!(matches!(dec.decode_next_frame(CanvasSize::S16).unwrap(), Some(FrameEvent::Image(_))));
    assert_eq!(dec.palette_len(), 6);
  }

  #[test]
  fn truncated_stream_reports_error_and_leaves_cursor() {
    let mut stream = frame(0x02, 0, &[0u8; 32 * 32 * 3]);
    let bogus_len: u16 = 0xFFFF;
    stream[1..3].copy_from_slice(&bogus_len.to_le_bytes());
    let mut dec = Decoder::new(&stream);
    assert!(dec.decode_next_frame(CanvasSize::S32).is_err());
    assert_eq!(dec.cursor(), 0);
  }

  #[test]
  fn pass_review_relocates_past_forbidden_frames_to_the_next_decodable_one() {
    let mut stream = frame(0x06, 0, &[9, 9]); // effect: forbidden
    stream.extend(frame(0x05, 0, &[1, 2, 3])); // word_info: forbidden
    let decodable_offset = stream.len();
    let pixels = [0u8; 32 * 32 * 3];
    stream.extend(frame(0x02, 12, &pixels));

    let mut dec = Decoder::new(&stream);
    dec.pass_review();
    assert_eq!(dec.cursor(), decodable_offset);
    match dec.decode_next_frame(CanvasSize::S32).unwrap().unwrap() {
      FrameEvent::Image(img) => assert_eq!(img.delay_ms, 12),
      _ => panic!("expected an image frame"),
    }
  }

  #[test]
  fn oversized_frame_is_rejected_for_a_smaller_requested_canvas() {
    let stream = frame(0x02, 0, &[0u8; 32 * 32 * 3]);
    let mut dec = Decoder::new(&stream);
    assert!(matches!(
      dec.decode_next_frame(CanvasSize::S16),
      Err(PixError::OutputSizeMismatch)
    ));
  }
}

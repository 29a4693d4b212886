//! Flat palette-indexed block decoding: one palette, one bit-packed index
//! stream, the whole canvas.

use crate::{bit_reader::BitReader, canvas::Canvas, palette::PaletteStore, util::bits_per_index, PixError};

/// Whether a block frame's palette-entry-count field is one byte (most
/// kinds) or two bytes (the "big"/"128"/"64" variants of §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountFieldWidth {
  /// Palette count lives in header byte 6 alone.
  Narrow,
  /// Palette count lives in header bytes 6..8, little-endian.
  Wide,
}
impl CountFieldWidth {
  #[inline]
  const fn bytes(self) -> usize {
    match self {
      Self::Narrow => 1,
      Self::Wide => 2,
    }
  }
}

/// Reads the palette-entry count out of a whole frame slice's header, and
/// returns it along with the byte offset where the palette data begins.
pub fn read_palette_count(
  whole_frame: &[u8], width: CountFieldWidth,
) -> Result<(usize, usize), PixError> {
  const HEADER_LEN: usize = 6;
  let field_len = width.bytes();
  if whole_frame.len() < HEADER_LEN + field_len {
    return Err(PixError::TruncatedFrame);
  }
  let count = match width {
    CountFieldWidth::Narrow => whole_frame[HEADER_LEN] as usize,
    CountFieldWidth::Wide => {
      u16::from_le_bytes([whole_frame[HEADER_LEN], whole_frame[HEADER_LEN + 1]]) as usize
    }
  };
  Ok((count, HEADER_LEN + field_len))
}

/// Decodes one flat palette-indexed block frame into `canvas`.
///
/// `palette` must already reflect this frame's reset-or-extend palette
/// operation (performed by the caller before this is invoked, since whether
/// it's a reset or an extend depends on the frame's kind, which this
/// function doesn't need to know about). Indices are read using
/// `bits_per_index(palette.count())`, i.e. against the *total* current
/// palette, which is what lets a continuation frame's indices reference
/// entries appended by this same frame.
///
/// Returns the number of bytes consumed from the start of `whole_frame`.
pub fn decode_block_into(
  whole_frame: &[u8], count_width: CountFieldWidth, side: u32, palette: &PaletteStore,
  canvas: &mut Canvas,
) -> Result<usize, PixError> {
  let (palette_count, palette_start) = read_palette_count(whole_frame, count_width)?;
  let bitstream_offset = palette_start + 3 * palette_count;
  if whole_frame.len() < bitstream_offset {
    return Err(PixError::TruncatedFrame);
  }
  let bpi = bits_per_index(palette.count());
  let mut reader = BitReader::new(whole_frame, bitstream_offset);
  for y in 0..side {
    for x in 0..side {
      let idx = reader.read(bpi)? as usize;
      let color = palette.get(idx)?;
      canvas.set(x, y, color);
    }
  }
  let total_bits = (side as usize) * (side as usize) * (bpi as usize);
  Ok(bitstream_offset + (total_bits + 7) / 8)
}

/// Decodes a raw truecolor block (3 bytes per pixel, no palette) starting at
/// `payload_offset` within `whole_frame`, into `canvas`.
pub fn decode_raw_truecolor_into(
  whole_frame: &[u8], payload_offset: usize, side: u32, canvas: &mut Canvas,
) -> Result<usize, PixError> {
  let needed = payload_offset + (side as usize) * (side as usize) * 3;
  if whole_frame.len() < needed {
    return Err(PixError::TruncatedFrame);
  }
  let mut cursor = payload_offset;
  for y in 0..side {
    for x in 0..side {
      let rgb = &whole_frame[cursor..cursor + 3];
      canvas.set(x, y, pixel_formats::r8g8b8_Unorm { r: rgb[0], g: rgb[1], b: rgb[2] });
      cursor += 3;
    }
  }
  Ok(cursor)
}

//! The recursive quadtree decoder for the 64x64 "fix" format (kind `0x15`).

use alloc::vec::Vec;
use pixel_formats::r8g8b8_Unorm;

use crate::{
  bit_reader::BitReader, block::read_palette_count, canvas::Canvas, palette::PaletteStore,
  util::bits_per_index, PixError,
};

use crate::block::CountFieldWidth;

const NODE_KIND_UNIFORM: u8 = 0;
const NODE_KIND_SPLIT: u8 = 1;
const NODE_KIND_REMAPPED: u8 = 2;

/// Extracts a node-local sub-palette from `node_tail` (everything in the
/// node after the kind byte): a length byte followed by a bitmap selecting
/// entries out of `parent_palette`.
///
/// Returns the sub-palette and the number of bytes consumed (length byte +
/// bitmap bytes), so the caller can find where the node's own payload
/// starts.
fn extract_sub_palette(
  node_tail: &[u8], parent_palette: &[r8g8b8_Unorm],
) -> Result<(Vec<r8g8b8_Unorm>, usize), PixError> {
  let len_byte = *node_tail.first().ok_or(PixError::TruncatedFrame)?;
  let len = if len_byte == 0 { 256 } else { len_byte as usize };
  let bitmap_bytes = (len + 7) / 8;
  let bitmap = node_tail.get(1..1 + bitmap_bytes).ok_or(PixError::TruncatedFrame)?;
  let mut sub = Vec::new();
  for i in 0..len {
    let byte = bitmap[i / 8];
    if (byte >> (i % 8)) & 1 != 0 {
      sub.push(*parent_palette.get(i).ok_or(PixError::PaletteOverflow)?);
    }
  }
  Ok((sub, 1 + bitmap_bytes))
}

/// Decodes one fix node of tile side `n_tile` at canvas offset
/// `(dst_x, dst_y)`, recursing into quarter-scale children for split nodes.
///
/// Returns the number of bytes this node (and, for a split node, all of its
/// descendants) consumed from `node_bytes`.
fn decode_fix_node(
  node_bytes: &[u8], dst_x: u32, dst_y: u32, n_tile: u32, parent_palette: &[r8g8b8_Unorm],
  global_palette: &PaletteStore, canvas: &mut Canvas,
) -> Result<usize, PixError> {
  let kind = *node_bytes.first().ok_or(PixError::TruncatedFrame)?;
  match kind {
    NODE_KIND_UNIFORM => {
      let bpi = bits_per_index(global_palette.count());
      let mut reader = BitReader::new(node_bytes, 1);
      for y in 0..n_tile {
        for x in 0..n_tile {
          let idx = reader.read(bpi)? as usize;
          let color = global_palette.get(idx)?;
          canvas.set(dst_x + x, dst_y + y, color);
        }
      }
      let total_bits = (n_tile as usize) * (n_tile as usize) * (bpi as usize);
      Ok(1 + (total_bits + 7) / 8)
    }
    NODE_KIND_SPLIT => {
      if n_tile <= 8 {
        // Nothing smaller than an 8x8 base tile exists to split into.
        return Err(PixError::UnsupportedKind);
      }
      let (sub_palette, header_consumed) = extract_sub_palette(&node_bytes[1..], parent_palette)?;
      let half = n_tile / 2;
      let mut total = 1 + header_consumed;
      // top-left, top-right, bottom-left, bottom-right
      for (ox, oy) in [(0, 0), (half, 0), (0, half), (half, half)] {
        let child_bytes = node_bytes.get(total..).ok_or(PixError::TruncatedFrame)?;
        let consumed = decode_fix_node(
          child_bytes,
          dst_x + ox,
          dst_y + oy,
          half,
          &sub_palette,
          global_palette,
          canvas,
        )?;
        total += consumed;
      }
      Ok(total)
    }
    NODE_KIND_REMAPPED => {
      let (sub_palette, header_consumed) = extract_sub_palette(&node_bytes[1..], parent_palette)?;
      let bpi = bits_per_index(sub_palette.len());
      let mut reader = BitReader::new(node_bytes, 1 + header_consumed);
      for y in 0..n_tile {
        for x in 0..n_tile {
          let idx = reader.read(bpi)? as usize;
          let color = *sub_palette.get(idx).ok_or(PixError::PaletteOverflow)?;
          canvas.set(dst_x + x, dst_y + y, color);
        }
      }
      let total_bits = (n_tile as usize) * (n_tile as usize) * (bpi as usize);
      Ok(1 + header_consumed + (total_bits + 7) / 8)
    }
    _ => Err(PixError::UnsupportedKind),
  }
}

/// Decodes a whole kind-`0x15` frame: a reset-style global palette (the same
/// layout as a narrow-width block frame's palette), followed by the root
/// `fix_64` node.
///
/// Returns the number of bytes consumed from the start of `whole_frame`.
pub fn decode_fix_frame(
  whole_frame: &[u8], global_palette: &mut PaletteStore, canvas: &mut Canvas,
) -> Result<usize, PixError> {
  let (palette_count, palette_start) = read_palette_count(whole_frame, CountFieldWidth::Narrow)?;
  let node_start = palette_start + 3 * palette_count;
  let palette_bytes =
    whole_frame.get(palette_start..node_start).ok_or(PixError::TruncatedFrame)?;
  global_palette.reset(palette_bytes, palette_count)?;
  let node_bytes = whole_frame.get(node_start..).ok_or(PixError::TruncatedFrame)?;
  let parent_palette = global_palette.as_slice().to_vec();
  let consumed =
    decode_fix_node(node_bytes, 0, 0, 64, &parent_palette, global_palette, canvas)?;
  Ok(node_start + consumed)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::canvas::CanvasSize;

  #[test]
  fn uniform_root_paints_entire_canvas() {
    // palette count 1 (red), node: kind 0 + 512 zero bytes (bpi=1, 64*64 bits)
    let mut frame = alloc::vec::Vec::new();
    frame.extend_from_slice(&[0xAA, 0, 0, 0, 0, 0x15]);
    frame.push(1); // palette count
    frame.extend_from_slice(&[255, 0, 0]); // red
    frame.push(NODE_KIND_UNIFORM);
    frame.extend(core::iter::repeat(0u8).take(64 * 64 / 8));

    let mut palette = PaletteStore::new();
    let mut canvas = Canvas::new(CanvasSize::S64);
    let consumed = decode_fix_frame(&frame, &mut palette, &mut canvas).unwrap();
    assert_eq!(consumed, frame.len());
    for y in 0..64 {
      for x in 0..64 {
        assert_eq!(canvas.get(x, y), r8g8b8_Unorm { r: 255, g: 0, b: 0 });
      }
    }
  }

  #[test]
  fn split_node_totality_matches_children_sum() {
    // A split root with 4 uniform fix_32 children of different colors.
    let mut frame = alloc::vec::Vec::new();
    frame.extend_from_slice(&[0xAA, 0, 0, 0, 0, 0x15]);
    frame.push(4); // global palette count
    frame.extend_from_slice(&[255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 0]);

    let mut node = alloc::vec::Vec::new();
    node.push(NODE_KIND_SPLIT);
    node.push(4); // bitmap selects all 4 global entries into the sub-palette
    node.push(0b0000_1111); // bits 0..3 set -> ceil(4/8)=1 byte
    let bpi_child = bits_per_index(4); // 2 bits per index into the 4-entry sub-palette
    for child_idx in 0..4u32 {
      node.push(NODE_KIND_UNIFORM);
      let bits_needed = 32 * 32 * bpi_child as usize;
      let bytes_needed = (bits_needed + 7) / 8;
      // every pixel indexes `child_idx` into the *global* palette (kind 0
      // always reads against the global palette, not the sub-palette)
      let mut reader_bytes = alloc::vec::Vec::new();
      let mut acc: u32 = 0;
      let mut acc_bits = 0u32;
      for _ in 0..(32 * 32) {
        acc |= child_idx << acc_bits;
        acc_bits += bpi_child;
        while acc_bits >= 8 {
          reader_bytes.push((acc & 0xFF) as u8);
          acc >>= 8;
          acc_bits -= 8;
        }
      }
      if acc_bits > 0 {
        reader_bytes.push((acc & 0xFF) as u8);
      }
      reader_bytes.resize(bytes_needed, 0);
      node.extend_from_slice(&reader_bytes);
    }
    frame.extend_from_slice(&node);

    let mut palette = PaletteStore::new();
    let mut canvas = Canvas::new(CanvasSize::S64);
    let consumed = decode_fix_frame(&frame, &mut palette, &mut canvas).unwrap();
    assert_eq!(consumed, frame.len());
    assert_eq!(canvas.get(0, 0), r8g8b8_Unorm { r: 255, g: 0, b: 0 });
    assert_eq!(canvas.get(63, 0), r8g8b8_Unorm { r: 0, g: 255, b: 0 });
    assert_eq!(canvas.get(0, 63), r8g8b8_Unorm { r: 0, g: 0, b: 255 });
    assert_eq!(canvas.get(63, 63), r8g8b8_Unorm { r: 255, g: 255, b: 0 });
  }
}

//! `multipic`: a multi-frame container of 121-pixel images sharing one
//! master palette, each frame carrying a bitmap selecting its own subset of
//! the master palette and choosing, at decode time from that subset's size
//! alone, whether to index the master directly or remap through the subset.

use alloc::vec::Vec;

use crate::{
  pic::{PIC_PIXELS, Rgb4},
  util::bits_per_index,
  PixError,
};

fn palette_bytes_len(count: usize) -> usize {
  ((count + 1) / 2) * 3
}

fn unpack_4bit(bytes: &[u8], count: usize) -> Result<Vec<Rgb4>, PixError> {
  let needed = palette_bytes_len(count);
  if bytes.len() < needed {
    return Err(PixError::TruncatedFrame);
  }
  let mut out = Vec::with_capacity(count);
  let mut remaining = count;
  let mut chunks = bytes.chunks_exact(3);
  while remaining > 0 {
    let t = chunks.next().ok_or(PixError::TruncatedFrame)?;
    out.push((t[0] >> 4, t[0] & 0xF, t[1] >> 4));
    remaining -= 1;
    if remaining > 0 {
      out.push((t[1] & 0xF, t[2] >> 4, t[2] & 0xF));
      remaining -= 1;
    }
  }
  Ok(out)
}

fn pack_4bit(pixels: &[Rgb4]) -> Vec<u8> {
  let mut out = Vec::with_capacity(palette_bytes_len(pixels.len()));
  let mut it = pixels.chunks(2);
  for pair in &mut it {
    let (r0, g0, b0) = pair[0];
    match pair.get(1) {
      Some(&(r1, g1, b1)) => {
        out.push((r0 << 4) | g0);
        out.push((b0 << 4) | r1);
        out.push((g1 << 4) | b1);
      }
      None => {
        out.push((r0 << 4) | g0);
        out.push(b0 << 4);
        out.push(0);
      }
    }
  }
  out
}

fn bitmap_bytes_len(master_count: usize) -> usize {
  (master_count + 7) / 8
}

/// Builds the bitmap selecting, out of `master`, exactly the entries used by
/// `pixels`, and returns it alongside the sub-palette itself (in ascending
/// master-index order, matching how the decoder will reconstruct it).
fn build_frame_subset(master: &[Rgb4], pixels: &[Rgb4; PIC_PIXELS]) -> (Vec<u8>, Vec<Rgb4>) {
  let mut bitmap = alloc::vec![0_u8; bitmap_bytes_len(master.len())];
  for (i, &entry) in master.iter().enumerate() {
    if pixels.contains(&entry) {
      bitmap[i / 8] |= 1 << (i % 8);
    }
  }
  let sub: Vec<Rgb4> = master
    .iter()
    .enumerate()
    .filter(|(i, _)| (bitmap[i / 8] >> (i % 8)) & 1 != 0)
    .map(|(_, &c)| c)
    .collect();
  (bitmap, sub)
}

fn extract_subset_from_bitmap(bitmap: &[u8], master: &[Rgb4]) -> Vec<Rgb4> {
  master
    .iter()
    .enumerate()
    .filter(|(i, _)| (bitmap[i / 8] >> (i % 8)) & 1 != 0)
    .map(|(_, &c)| c)
    .collect()
}

fn pack_indices(indices: &[usize], bpi: u32) -> Vec<u8> {
  let mut out = Vec::new();
  let mut acc = 0_u32;
  let mut acc_bits = 0_u32;
  for &idx in indices {
    acc |= (idx as u32) << acc_bits;
    acc_bits += bpi;
    while acc_bits >= 8 {
      out.push((acc & 0xFF) as u8);
      acc >>= 8;
      acc_bits -= 8;
    }
  }
  if acc_bits > 0 {
    out.push((acc & 0xFF) as u8);
  }
  out
}

fn unpack_indices(bytes: &[u8], bpi: u32, count: usize) -> Result<Vec<usize>, PixError> {
  let mut reader = crate::bit_reader::BitReader::new(bytes, 0);
  (0..count).map(|_| Ok(reader.read(bpi)? as usize)).collect()
}

/// Whether a frame's body indexes the master palette directly or remaps
/// through its own bitmap-selected subset, decided purely from `p` (the
/// subset size) and `p_master` — both sides of the wire recompute this the
/// same way, so no mode flag is stored.
fn use_direct_mode(p: usize, p_master: usize) -> bool {
  let bpi_sub = bits_per_index(p);
  let bpi_master = bits_per_index(p_master);
  let indirect_cost = (PIC_PIXELS as u32 * bpi_sub + 7) / 8 + bitmap_bytes_len(p_master) as u32;
  let direct_cost = (PIC_PIXELS as u32 * bpi_master + 7) / 8;
  direct_cost <= indirect_cost
}

/// A single frame of a multipic stream before encoding: its 121 pixels plus
/// the delay before the next frame.
pub struct MultipicFrame {
  pub pixels: [Rgb4; PIC_PIXELS],
  pub delay_ms: u16,
}

fn build_master_palette(frames: &[MultipicFrame]) -> Vec<Rgb4> {
  let mut palette = Vec::new();
  for frame in frames {
    for &px in &frame.pixels {
      if !palette.contains(&px) {
        palette.push(px);
      }
    }
  }
  palette
}

/// Encodes a run of `MultipicFrame`s sharing one master palette.
///
/// Layout: frame count (1 byte), master palette count (1 byte), the master
/// palette (4-bit-per-channel, 2 entries per 3 bytes); then per frame: a
/// 2-byte delay, a subset-size byte `p`, a `ceil(P_master/8)`-byte bitmap
/// selecting this frame's colors out of the master palette, and a
/// bit-packed index body — indexing the master directly if that's cheaper
/// than remapping through the subset, indexing the subset (in ascending
/// master-index order) otherwise. Which body format was used is never
/// stored; the decoder derives it from `p` and `P_master` exactly as the
/// encoder did.
#[must_use]
pub fn encode_multipic(frames: &[MultipicFrame]) -> Vec<u8> {
  let master = build_master_palette(frames);
  let mut out = Vec::new();
  out.push(frames.len() as u8);
  out.push(master.len() as u8);
  out.extend(pack_4bit(&master));

  for frame in frames {
    out.extend_from_slice(&frame.delay_ms.to_le_bytes());
    let (bitmap, sub) = build_frame_subset(&master, &frame.pixels);
    out.push(sub.len() as u8);
    out.extend_from_slice(&bitmap);

    if use_direct_mode(sub.len(), master.len()) {
      let bpi_master = bits_per_index(master.len());
      let indices: Vec<usize> =
        frame.pixels.iter().map(|px| master.iter().position(|p| p == px).unwrap()).collect();
      out.extend(pack_indices(&indices, bpi_master));
    } else {
      let bpi_sub = bits_per_index(sub.len());
      let indices: Vec<usize> =
        frame.pixels.iter().map(|px| sub.iter().position(|p| p == px).unwrap()).collect();
      out.extend(pack_indices(&indices, bpi_sub));
    }
  }

  out
}

/// One decoded frame from a multipic stream.
pub struct DecodedMultipicFrame {
  pub pixels: [Rgb4; PIC_PIXELS],
  pub delay_ms: u16,
}

/// Decodes a whole multipic stream produced by [`encode_multipic`].
pub fn decode_multipic(bytes: &[u8]) -> Result<Vec<DecodedMultipicFrame>, PixError> {
  let &[frame_count, master_count, ref rest @ ..] = bytes else {
    return Err(PixError::TruncatedFrame);
  };
  let master_count = master_count as usize;
  let master_len = palette_bytes_len(master_count);
  if rest.len() < master_len {
    return Err(PixError::TruncatedFrame);
  }
  let master = unpack_4bit(rest, master_count)?;
  let bpi_master = bits_per_index(master_count);
  let mut cursor = master_len;
  let mut out = Vec::with_capacity(frame_count as usize);

  for _ in 0..frame_count {
    let delay_bytes = rest.get(cursor..cursor + 2).ok_or(PixError::TruncatedFrame)?;
    let delay_ms = u16::from_le_bytes([delay_bytes[0], delay_bytes[1]]);
    cursor += 2;

    let p = *rest.get(cursor).ok_or(PixError::TruncatedFrame)? as usize;
    cursor += 1;
    let bitmap_len = bitmap_bytes_len(master_count);
    let bitmap = rest.get(cursor..cursor + bitmap_len).ok_or(PixError::TruncatedFrame)?;
    cursor += bitmap_len;
    let sub = extract_subset_from_bitmap(bitmap, &master);
    if sub.len() != p {
      return Err(PixError::PaletteOverflow);
    }

    let (palette, bpi): (&[Rgb4], u32) = if use_direct_mode(p, master_count) {
      (&master, bpi_master)
    } else {
      (&sub, bits_per_index(p))
    };
    let index_bytes_len = ((PIC_PIXELS as u32 * bpi + 7) / 8) as usize;
    let index_bytes = rest.get(cursor..cursor + index_bytes_len).ok_or(PixError::TruncatedFrame)?;
    cursor += index_bytes_len;
    let indices = unpack_indices(index_bytes, bpi, PIC_PIXELS)?;

    let mut pixels = [(0_u8, 0_u8, 0_u8); PIC_PIXELS];
    for (slot, &idx) in pixels.iter_mut().zip(indices.iter()) {
      *slot = *palette.get(idx).ok_or(PixError::PaletteOverflow)?;
    }
    out.push(DecodedMultipicFrame { pixels, delay_ms });
  }

  Ok(out)
}

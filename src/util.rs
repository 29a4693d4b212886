#![allow(dead_code)]

use crate::PixError;

#[inline]
pub(crate) fn try_pull_byte_array<const N: usize>(
  bytes: &[u8],
) -> Result<([u8; N], &[u8]), PixError> {
  if bytes.len() >= N {
    let (head, tail) = bytes.split_at(N);
    let a: [u8; N] = head.try_into().unwrap();
    Ok((a, tail))
  } else {
    Err(PixError::TruncatedFrame)
  }
}

#[inline]
#[must_use]
pub(crate) fn u16_le(bytes: &[u8]) -> u16 {
  u16::from_le_bytes(bytes.try_into().unwrap())
}

/// `BITS_PER_INDEX[n]` is the number of bits needed to store a palette index
/// for a palette of `n` entries, for `n` in `0..=256`.
///
/// This mirrors the original `gdivoom_image_bits_table` global: a flat,
/// precomputed lookup rather than a `log2`-and-round-up computed at call
/// sites, because the original table has a couple of entries (0 and 1 both
/// map to 1 bit) that a naive `ceil(log2(n))` wouldn't reproduce for `n == 0`.
pub(crate) const BITS_PER_INDEX: [u8; 257] = build_bits_per_index();

const fn build_bits_per_index() -> [u8; 257] {
  let mut table = [0_u8; 257];
  let mut n = 0_usize;
  while n <= 256 {
    table[n] = match n {
      0 | 1 | 2 => 1,
      3..=4 => 2,
      5..=8 => 3,
      9..=16 => 4,
      17..=32 => 5,
      33..=64 => 6,
      65..=128 => 7,
      _ => 8,
    };
    n += 1;
  }
  table
}

/// Bits needed to index a palette of `palette_count` entries (`0..=256`).
#[inline]
#[must_use]
pub(crate) fn bits_per_index(palette_count: usize) -> u32 {
  BITS_PER_INDEX[palette_count.min(256)] as u32
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn table_matches_spec_breakpoints() {
    assert_eq!(bits_per_index(0), 1);
    assert_eq!(bits_per_index(1), 1);
    assert_eq!(bits_per_index(2), 1);
    assert_eq!(bits_per_index(3), 2);
    assert_eq!(bits_per_index(4), 2);
    assert_eq!(bits_per_index(5), 3);
    assert_eq!(bits_per_index(8), 3);
    assert_eq!(bits_per_index(9), 4);
    assert_eq!(bits_per_index(16), 4);
    assert_eq!(bits_per_index(17), 5);
    assert_eq!(bits_per_index(32), 5);
    assert_eq!(bits_per_index(33), 6);
    assert_eq!(bits_per_index(64), 6);
    assert_eq!(bits_per_index(65), 7);
    assert_eq!(bits_per_index(128), 7);
    assert_eq!(bits_per_index(129), 8);
    assert_eq!(bits_per_index(256), 8);
  }
}

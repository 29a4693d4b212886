//! Per-decoder RGB palette storage: reset (full rebuild), extend (palette
//! continuation frames), and the bounded-growth realloc policy from the
//! original `divoom_image_decode_decode_one*` family.

use alloc::vec::Vec;
use pixel_formats::r8g8b8_Unorm;

use crate::PixError;

/// An ordered, growable sequence of RGB palette entries.
///
/// Modeled the same way the teacher crate models `Palmap`'s palette half: a
/// plain `Vec<P>` rather than a hand-rolled `(ptr, len, cap)` triple, since
/// `Vec` already gives us the count/capacity split the original C tracked by
/// hand. The "bounded-growth realloc" behavior is reproduced by pre-sizing
/// the `Vec`'s capacity with `try_reserve_exact` rather than letting normal
/// amortized-growth `push` pick its own capacity.
#[derive(Debug, Clone, Default)]
pub struct PaletteStore {
  entries: Vec<r8g8b8_Unorm>,
}

impl PaletteStore {
  /// An empty palette.
  #[inline]
  #[must_use]
  pub fn new() -> Self {
    Self { entries: Vec::new() }
  }

  /// Number of palette entries currently populated.
  #[inline]
  #[must_use]
  pub fn count(&self) -> usize {
    self.entries.len()
  }

  /// Number of entries the backing storage can hold without reallocating.
  #[inline]
  #[must_use]
  pub fn capacity(&self) -> usize {
    self.entries.capacity()
  }

  /// The populated entries.
  #[inline]
  #[must_use]
  pub fn as_slice(&self) -> &[r8g8b8_Unorm] {
    &self.entries
  }

  #[inline]
  fn push_rgb_triples(&mut self, rgb_bytes: &[u8], n: usize) -> Result<(), PixError> {
    if rgb_bytes.len() < n * 3 {
      return Err(PixError::TruncatedFrame);
    }
    for chunk in rgb_bytes[..n * 3].chunks_exact(3) {
      self.entries.push(r8g8b8_Unorm { r: chunk[0], g: chunk[1], b: chunk[2] });
    }
    Ok(())
  }

  /// Drops the existing palette and rebuilds it from `n` RGB triples read
  /// from the front of `rgb_bytes`.
  ///
  /// Allocates room for `max(2*n, 64)` entries up front, matching the
  /// original decoder's over-allocation so that a handful of subsequent
  /// `extend` calls won't immediately trigger a further reallocation.
  pub fn reset(&mut self, rgb_bytes: &[u8], n: usize) -> Result<(), PixError> {
    self.entries.clear();
    let target_capacity = (2 * n).max(64);
    if target_capacity > self.entries.capacity() {
      self.entries.try_reserve_exact(target_capacity - self.entries.len())?;
    }
    self.push_rgb_triples(rgb_bytes, n)
  }

  /// Appends `k` new RGB triples read from the front of `rgb_bytes`.
  ///
  /// If the new total exceeds the current capacity, reallocates to
  /// `count + k + 0x100` entries first. This is the palette-continuation
  /// path used by kinds `0x01`, `0x03`, `0x0D`/`0x10`, and `0x13`.
  ///
  /// ## Alias safety
  /// The original C source has to guard against `rgb_bytes` overlapping the
  /// palette's own backing storage, because both lived in the same flat
  /// address space. In safe Rust this can't happen: `rgb_bytes` always comes
  /// from the caller's borrowed frame slice, and `self.entries` is a
  /// separately heap-allocated `Vec` — the two can never denote overlapping
  /// memory, so no runtime overlap check is needed here. The byte-wise
  /// `push` loop below is the fallback path the original reserved for the
  /// aliased case; we simply always take it, since it's correct regardless
  /// and the unaliased fast path would only have mattered for a raw
  /// `memcpy`, which owned `Vec` growth doesn't perform anyway.
  pub fn extend(&mut self, rgb_bytes: &[u8], k: usize) -> Result<(), PixError> {
    let needed = self.entries.len() + k;
    if needed > self.entries.capacity() {
      let target_capacity = needed + 0x100;
      self.entries.try_reserve_exact(target_capacity - self.entries.len())?;
    }
    self.push_rgb_triples(rgb_bytes, k)
  }

  /// Drops the palette and reallocates to exactly `max(n, 128)` entries if
  /// the current capacity doesn't already match `n`.
  ///
  /// For callers that rebuild a `PaletteStore` fresh on every use (as
  /// opposed to the reset/extend continuation pattern the frame-stream
  /// decoder relies on) rather than growing it incrementally.
  pub fn resize_if_mismatch(&mut self, n: usize) -> Result<(), PixError> {
    let target_capacity = n.max(128);
    if self.entries.capacity() != target_capacity {
      self.entries = Vec::new();
      self.entries.try_reserve_exact(target_capacity)?;
    } else {
      self.entries.clear();
    }
    Ok(())
  }

  /// Index into the palette, or `PixError::PaletteOverflow` if `idx` is out
  /// of bounds for the current `count()`.
  #[inline]
  pub fn get(&self, idx: usize) -> Result<r8g8b8_Unorm, PixError> {
    self.entries.get(idx).copied().ok_or(PixError::PaletteOverflow)
  }
}

//! Integration tests for the palette-indexed block formats and raw
//! truecolor frames, driven through the public `Decoder`.

use pixgrid::{CanvasSize, Decoder, FrameEvent};

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

fn expect_image(ev: FrameEvent) -> pixgrid::DecodedFrame {
  match ev {
    FrameEvent::Image(img) => img,
    _ => panic!("expected an image frame"),
  }
}

#[test]
fn two_color_16x16_checkerboard_decodes_correctly() {
  let mut payload = Vec::new();
  payload.push(2); // palette count
  payload.extend_from_slice(&[255, 0, 0, 0, 0, 255]); // red, blue

  // bpi = 1 for a 2-entry palette; 256 pixels = 32 bytes, checkerboard bit pattern
  let bits: Vec<u8> = (0..256).map(|i| (i % 2) as u8).collect();
  let mut packed = vec![0_u8; 32];
  for (i, &b) in bits.iter().enumerate() {
    packed[i / 8] |= b << (i % 8);
  }
  payload.extend_from_slice(&packed);

  let stream = frame(0x00, 16, &payload);
  let mut dec = Decoder::new(&stream);
  let img = expect_image(dec.decode_next_frame(CanvasSize::S16).unwrap().unwrap());
  assert_eq!(img.delay_ms, 16);
  assert_eq!(img.canvas.get(0, 0), pixel_formats::r8g8b8_Unorm { r: 255, g: 0, b: 0 });
  assert_eq!(img.canvas.get(1, 0), pixel_formats::r8g8b8_Unorm { r: 0, g: 0, b: 255 });
}

#[test]
fn raw_truecolor_32x32_upscales_to_requested_128() {
  let pixels: Vec<u8> = (0..32 * 32 * 3).map(|i| (i % 256) as u8).collect();
  let stream = frame(0x02, 0, &pixels);
  let mut dec = Decoder::new(&stream);
  let img = expect_image(dec.decode_next_frame(CanvasSize::S128).unwrap().unwrap());
  assert_eq!(img.canvas.side(), 128);
  // every 4x4 destination block should be a single flat color from the source
  assert_eq!(img.canvas.get(0, 0), img.canvas.get(3, 3));
  assert_ne!(img.canvas.get(0, 0), img.canvas.get(4, 0));
}

#[test]
fn word_info_and_effect_frames_pass_through_opaque() {
  let mut stream = frame(0x05, 0, &[1, 2, 3]);
  stream.extend(frame(0x06, 0, &[9, 9]));
  let mut dec = Decoder::new(&stream);
  assert!(matches!(
    dec.decode_next_frame(CanvasSize::S16).unwrap(),
    Some(FrameEvent::WordInfo(p)) if p == [1, 2, 3]
  ));
  assert!(matches!(
    dec.decode_next_frame(CanvasSize::S16).unwrap(),
    Some(FrameEvent::Effect(p)) if p == [9, 9]
  ));
}

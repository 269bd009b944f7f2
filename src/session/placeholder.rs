//! The frame served when no camera can be used.

use crate::devices::data::{Frame, Resolution, DEFAULT_RESOLUTION};
use lazy_static::lazy_static;

/// Banner drawn across the placeholder.
pub const PLACEHOLDER_TEXT: &str = "NO CAMERA DETECTED";

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const SCALE: u32 = 4;
const ADVANCE: u32 = (GLYPH_WIDTH + 1) * SCALE;
const BACKGROUND: [u8; 3] = [0, 0, 0];
const FOREGROUND: [u8; 3] = [255, 255, 255];

lazy_static! {
    static ref PLACEHOLDER: Frame = render_placeholder(DEFAULT_RESOLUTION);
}

/// The default-resolution placeholder frame.
pub fn placeholder_frame() -> Frame {
    PLACEHOLDER.clone()
}

/// Render a black frame with [`PLACEHOLDER_TEXT`] centred in white.
pub fn render_placeholder(resolution: Resolution) -> Frame {
    let mut frame = Frame::filled(resolution, BACKGROUND);

    let chars = PLACEHOLDER_TEXT.chars().count() as u32;
    let text_width = (chars * ADVANCE).saturating_sub(SCALE);
    let origin_x = resolution.width.saturating_sub(text_width) / 2;
    let origin_y = resolution.height.saturating_sub(GLYPH_HEIGHT * SCALE) / 2;

    for (i, ch) in PLACEHOLDER_TEXT.chars().enumerate() {
        draw_glyph(&mut frame, ch, origin_x + i as u32 * ADVANCE, origin_y);
    }
    frame
}

fn draw_glyph(frame: &mut Frame, ch: char, left: u32, top: u32) {
    for (row, bits) in glyph(ch).iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                continue;
            }
            for dy in 0..SCALE {
                for dx in 0..SCALE {
                    let x = left + col * SCALE + dx;
                    let y = top + row as u32 * SCALE + dy;
                    if let Some(px) = frame.pixel_mut(x, y) {
                        px.copy_from_slice(&FOREGROUND);
                    }
                }
            }
        }
    }
}

/// 5x7 bitmaps, one byte per row, most significant of the low five bits on the left.
fn glyph(ch: char) -> [u8; 7] {
    match ch {
        'A' => [0x0e, 0x11, 0x11, 0x1f, 0x11, 0x11, 0x11],
        'C' => [0x0e, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0e],
        'D' => [0x1e, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1e],
        'E' => [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x1f],
        'M' => [0x11, 0x1b, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'O' => [0x0e, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e],
        'R' => [0x1e, 0x11, 0x11, 0x1e, 0x14, 0x12, 0x11],
        'T' => [0x1f, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        _ => [0; 7],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 3] {
        let offset = ((y * frame.width() + x) * 3) as usize;
        let bytes = &frame.as_bytes()[offset..offset + 3];
        [bytes[0], bytes[1], bytes[2]]
    }

    #[test]
    fn test_placeholder_dimensions() {
        let frame = placeholder_frame();
        assert_eq!(frame.width(), 640);
        assert_eq!(frame.height(), 480);
        assert_eq!(frame.as_bytes().len(), 640 * 480 * 3);
    }

    #[test]
    fn test_placeholder_is_deterministic() {
        assert_eq!(placeholder_frame(), render_placeholder(DEFAULT_RESOLUTION));
    }

    #[test]
    fn test_placeholder_has_banner() {
        let frame = placeholder_frame();
        assert_eq!(pixel(&frame, 0, 0), BACKGROUND);
        assert_eq!(pixel(&frame, 639, 479), BACKGROUND);

        // Top-left stroke of the leading 'N'.
        let text_width = PLACEHOLDER_TEXT.len() as u32 * ADVANCE - SCALE;
        let x = (640 - text_width) / 2;
        let y = (480 - GLYPH_HEIGHT * SCALE) / 2;
        assert_eq!(pixel(&frame, x, y), FOREGROUND);
        assert_eq!(pixel(&frame, x + SCALE, y), BACKGROUND);

        let lit = frame
            .as_bytes()
            .chunks_exact(3)
            .filter(|px| *px == FOREGROUND)
            .count();
        assert!(lit > 1000);
    }

    #[test]
    fn test_tiny_resolution_clips() {
        let frame = render_placeholder(Resolution::new(8, 8));
        assert_eq!(frame.as_bytes().len(), 8 * 8 * 3);
    }
}

//! Pairing-code rendering: PNG for the web page, half-blocks for the log.

use {
    base64::{Engine, engine::general_purpose::STANDARD as BASE64},
    image::{ImageBuffer, Luma},
    qrcode::{Color, EcLevel, QrCode},
};

use crate::error::{Error, Result};

/// Pixels per QR module in the PNG rendering.
const MODULE_SIZE: u32 = 10;
/// Quiet-zone width around the grid, in modules.
const QUIET_ZONE: u32 = 2;

/// Render the payload as PNG bytes.
pub fn render_png(payload: &str) -> Result<Vec<u8>> {
    let code = encode(payload)?;

    let modules = code.width() as u32;
    let img_size = (modules + QUIET_ZONE * 2) * MODULE_SIZE;

    let img = ImageBuffer::from_fn(img_size, img_size, |x, y| {
        let col = (x / MODULE_SIZE).checked_sub(QUIET_ZONE);
        let row = (y / MODULE_SIZE).checked_sub(QUIET_ZONE);
        let dark = match (col, row) {
            (Some(col), Some(row)) if col < modules && row < modules => {
                code[(col as usize, row as usize)] == Color::Dark
            },
            _ => false,
        };
        if dark { Luma([0u8]) } else { Luma([255u8]) }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| Error::render(format!("png encoding failed: {e}")))?;

    Ok(buf.into_inner())
}

/// Render the payload as a `data:image/png;base64,...` URL for direct
/// embedding in an `<img>` tag.
pub fn render_data_url(payload: &str) -> Result<String> {
    let png = render_png(payload)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(png)))
}

/// Render the payload for terminal display using Unicode half-blocks.
///
/// Packs two module rows into one text line, which keeps the code small
/// enough to scan straight from a log pane.
pub fn render_terminal(payload: &str) -> Result<String> {
    let code = encode(payload)?;

    let width = code.width();
    let colors: Vec<Color> = code.into_colors();
    let is_dark = |row: usize, col: usize| -> bool {
        row < width && col < width && colors[row * width + col] == Color::Dark
    };

    let mut out = String::new();
    let mut row = 0;
    while row < width {
        for col in 0..width {
            let top = is_dark(row, col);
            let bottom = is_dark(row + 1, col);
            out.push(match (top, bottom) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
        row += 2;
    }

    Ok(out)
}

fn encode(payload: &str) -> Result<QrCode> {
    QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L)
        .map_err(|e| Error::render(format!("qr encoding failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_has_magic_bytes() {
        let png = render_png("pairing-payload").unwrap();
        assert_eq!(&png[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn png_is_square_of_module_grid() {
        let png = render_png("pairing-payload").unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(img.width(), img.height());
        assert_eq!(img.width() % MODULE_SIZE, 0);
    }

    #[test]
    fn data_url_is_embeddable() {
        let url = render_data_url("pairing-payload").unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(url.len() > 100);
    }

    #[test]
    fn terminal_rendering_is_non_empty() {
        let block = render_terminal("pairing-payload").unwrap();
        assert!(!block.is_empty());
        assert!(block.lines().count() > 10);
    }
}

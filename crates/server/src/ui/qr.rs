//! QR codes for access URLs.
//!
//! Each access URL is printed to the console as a QR code so a phone on the
//! same network can open it by scanning the terminal, and can optionally be
//! written out as a PNG.

use std::path::Path;

use image::{GrayImage, Luma};
use qrcode::{Color, EcLevel, QrCode};

/// Light modules around the code in terminal output.
const TERMINAL_QUIET_ZONE: usize = 1;

/// Size of each QR module in pixels for PNG output.
const PNG_MODULE_SIZE: u32 = 8;

/// Light modules around the code in PNG output.
const PNG_QUIET_ZONE: u32 = 4;

fn encode(data: &str) -> anyhow::Result<QrCode> {
    Ok(QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L)?)
}

/// Render `data` as text for the console.
///
/// Two module rows share one line of half-block characters:
/// - Upper half block (U+2580): dark module on top, light below
/// - Lower half block (U+2584): light module on top, dark below
/// - Full block (U+2588): two dark modules
/// - Space: two light modules
///
/// Fails when `data` is too long for a QR code.
pub fn generate_terminal_qr(data: &str) -> anyhow::Result<String> {
    let code = encode(data)?;
    let width = code.width();
    let colors = code.to_colors();

    let size = width + 2 * TERMINAL_QUIET_ZONE;
    let is_dark = |row: usize, col: usize| -> bool {
        if row < TERMINAL_QUIET_ZONE
            || col < TERMINAL_QUIET_ZONE
            || row >= width + TERMINAL_QUIET_ZONE
            || col >= width + TERMINAL_QUIET_ZONE
        {
            return false;
        }
        colors[(row - TERMINAL_QUIET_ZONE) * width + (col - TERMINAL_QUIET_ZONE)] == Color::Dark
    };

    let mut lines = Vec::with_capacity(size.div_ceil(2));
    for row in (0..size).step_by(2) {
        let line: String = (0..size)
            .map(|col| {
                let top_dark = is_dark(row, col);
                let bottom_dark = row + 1 < size && is_dark(row + 1, col);
                match (top_dark, bottom_dark) {
                    (true, true) => '\u{2588}',
                    (true, false) => '\u{2580}',
                    (false, true) => '\u{2584}',
                    (false, false) => ' ',
                }
            })
            .collect();
        lines.push(line);
    }

    Ok(lines.join("\n"))
}

/// PNG encoding of the QR code for `data`.
pub fn generate_png_qr_bytes(data: &str) -> anyhow::Result<Vec<u8>> {
    let mut png = std::io::Cursor::new(Vec::new());
    render_image(data)?.write_to(&mut png, image::ImageFormat::Png)?;
    Ok(png.into_inner())
}

/// Write the QR code for `data` to `path` as a PNG.
pub fn generate_png_qr(data: &str, path: &Path) -> anyhow::Result<()> {
    render_image(data)?.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

/// One `PNG_MODULE_SIZE` square per module, black on white.
fn render_image(data: &str) -> anyhow::Result<GrayImage> {
    let code = encode(data)?;
    let width = code.width() as u32;
    let colors = code.to_colors();
    let side = (width + 2 * PNG_QUIET_ZONE) * PNG_MODULE_SIZE;

    Ok(GrayImage::from_fn(side, side, |x, y| {
        let col = (x / PNG_MODULE_SIZE).checked_sub(PNG_QUIET_ZONE);
        let row = (y / PNG_MODULE_SIZE).checked_sub(PNG_QUIET_ZONE);
        let dark = match (row, col) {
            (Some(r), Some(c)) if r < width && c < width => {
                colors[(r * width + c) as usize] == Color::Dark
            }
            _ => false,
        };
        Luma([if dark { 0 } else { 255 }])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://192.168.1.20:8000/?token=AbCdEfGh12345678";
    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    #[test]
    fn test_terminal_qr_is_rectangular() {
        let qr = generate_terminal_qr(URL).unwrap();
        let lines: Vec<&str> = qr.lines().collect();

        // Version 3 or larger: at least 29 modules plus border, halved.
        assert!(lines.len() >= 15);
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));
        assert!(qr.chars().any(|c| matches!(c, '\u{2580}' | '\u{2584}' | '\u{2588}')));
    }

    #[test]
    fn test_terminal_qr_has_light_border() {
        let qr = generate_terminal_qr(URL).unwrap();
        let lines: Vec<&str> = qr.lines().collect();

        assert!(lines.iter().all(|l| l.starts_with(' ') && l.ends_with(' ')));
    }

    #[test]
    fn test_png_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("access.png");

        generate_png_qr(URL, &path).unwrap();
        assert!(std::fs::read(&path).unwrap().starts_with(PNG_MAGIC));
    }

    #[test]
    fn test_png_image_layout() {
        let code = encode(URL).unwrap();
        let img = render_image(URL).unwrap();

        let expected = (code.width() as u32 + 2 * PNG_QUIET_ZONE) * PNG_MODULE_SIZE;
        assert_eq!(img.dimensions(), (expected, expected));
        assert_eq!(img.get_pixel(0, 0), &Luma([255]));

        // Finder pattern corner is always dark.
        let corner = PNG_QUIET_ZONE * PNG_MODULE_SIZE;
        assert_eq!(img.get_pixel(corner, corner), &Luma([0]));

        assert!(generate_png_qr_bytes(URL).unwrap().starts_with(PNG_MAGIC));
    }

    #[test]
    fn test_oversized_data_fails() {
        let data = "x".repeat(8000);
        assert!(generate_terminal_qr(&data).is_err());
        assert!(generate_png_qr_bytes(&data).is_err());
    }
}

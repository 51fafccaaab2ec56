//! Raw pixel format conversion to packed RGB

use super::CodecError;

/// Converts packed YUYV 4:2:2 to RGB using integer BT.601 coefficients.
pub fn yuyv_to_rgb(
    yuyv: &[u8],
    width: u32,
    height: u32,
    rgb: &mut Vec<u8>,
) -> Result<(), CodecError> {
    let pixels = width as usize * height as usize;
    ensure_len(yuyv, pixels * 2)?;

    rgb.clear();
    rgb.reserve(pixels * 3);

    for chunk in yuyv[..pixels * 2].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&yuv_pixel(y0, u, v));
        rgb.extend_from_slice(&yuv_pixel(y1, u, v));
    }

    // Odd pixel count leaves one trailing luma sample
    if pixels % 2 == 1 {
        let tail = &yuyv[(pixels - 1) * 2..pixels * 2];
        rgb.extend_from_slice(&yuv_pixel(tail[0], tail[1], 128));
    }

    Ok(())
}

fn yuv_pixel(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;

    [clamp(r), clamp(g), clamp(b)]
}

fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Demosaics an 8-bit RGGB Bayer frame to RGB.
///
/// Every 2x2 cell yields one colour shared by its four pixels; the two
/// green samples are averaged.
pub fn rggb_to_rgb(
    bayer: &[u8],
    width: u32,
    height: u32,
    rgb: &mut Vec<u8>,
) -> Result<(), CodecError> {
    let (w, h) = (width as usize, height as usize);
    ensure_len(bayer, w * h)?;

    rgb.clear();
    rgb.reserve(w * h * 3);

    let at = |x: usize, y: usize| bayer[y.min(h - 1) * w + x.min(w - 1)];

    for y in 0..h {
        let cy = y & !1;
        for x in 0..w {
            let cx = x & !1;
            let r = at(cx, cy);
            let g = ((at(cx + 1, cy) as u16 + at(cx, cy + 1) as u16) / 2) as u8;
            let b = at(cx + 1, cy + 1);
            rgb.extend_from_slice(&[r, g, b]);
        }
    }

    Ok(())
}

pub(super) fn ensure_len(data: &[u8], expected: usize) -> Result<(), CodecError> {
    if data.len() < expected {
        return Err(CodecError::BufferTooSmall {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_black_and_white() {
        // Two pixels of black (Y=16), two of white (Y=235), neutral chroma
        let yuyv = [16, 128, 16, 128, 235, 128, 235, 128];
        let mut rgb = Vec::new();
        yuyv_to_rgb(&yuyv, 4, 1, &mut rgb).unwrap();

        assert_eq!(rgb.len(), 12);
        assert_eq!(&rgb[0..3], &[0, 0, 0]);
        assert_eq!(&rgb[9..12], &[255, 255, 255]);
    }

    #[test]
    fn test_yuyv_short_buffer() {
        let mut rgb = Vec::new();
        let result = yuyv_to_rgb(&[0u8; 6], 2, 2, &mut rgb);
        assert!(matches!(
            result,
            Err(CodecError::BufferTooSmall {
                expected: 8,
                actual: 6
            })
        ));
    }

    #[test]
    fn test_rggb_cell() {
        // Single 2x2 cell: R=200, G=100/50, B=10
        let bayer = [200, 100, 50, 10];
        let mut rgb = Vec::new();
        rggb_to_rgb(&bayer, 2, 2, &mut rgb).unwrap();

        assert_eq!(rgb.len(), 12);
        for pixel in rgb.chunks_exact(3) {
            assert_eq!(pixel, &[200, 75, 10]);
        }
    }

    #[test]
    fn test_rggb_odd_dimensions() {
        let bayer = [1u8; 9];
        let mut rgb = Vec::new();
        rggb_to_rgb(&bayer, 3, 3, &mut rgb).unwrap();
        assert_eq!(rgb.len(), 27);
    }
}

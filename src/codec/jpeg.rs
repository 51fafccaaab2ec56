//! JPEG marker inspection

/// JPEG marker codes
#[allow(dead_code)]
pub mod markers {
    pub const SOI: u8 = 0xD8; // Start of Image
    pub const EOI: u8 = 0xD9; // End of Image
    pub const SOF0: u8 = 0xC0; // Start of Frame (Baseline)
    pub const APP0: u8 = 0xE0; // Application segment 0 (JFIF)
}

/// SOI followed by APP0, the usual JFIF opening
pub const JFIF_START: u32 = 0xFFD8_FFE0;

/// SOI followed directly by SOF0, as emitted by many UVC cameras
pub const BASELINE_START: u32 = 0xFFD8_FFC0;

/// First four bytes of `data` as a big-endian word
pub fn start_word(data: &[u8]) -> Option<u32> {
    let head: [u8; 4] = data.get(..4)?.try_into().ok()?;
    Some(u32::from_be_bytes(head))
}

/// Whether `data` opens with one of the recognised JPEG start sequences
pub fn has_start_marker(data: &[u8]) -> bool {
    matches!(start_word(data), Some(JFIF_START) | Some(BASELINE_START))
}

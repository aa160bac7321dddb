use anyhow::*;
use ttf2woff2::BrotliQuality;

const WOFF2_MAGIC: &[u8; 4] = b"wOF2";

/// Compresses an sfnt font into a WOFF2 file.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    ensure!(data.len() >= 12, "Font data is too short to be an sfnt font.");
    let woff2 = ttf2woff2::encode(data, BrotliQuality::default())
        .map_err(|e| anyhow!("Could not encode WOFF2: {e}"))?;
    ensure!(woff2.starts_with(WOFF2_MAGIC), "WOFF2 encoder produced a malformed file.");
    Ok(woff2)
}

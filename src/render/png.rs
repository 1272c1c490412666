//! RGBA PNG encoding with resolution and text metadata
//!
//! Writes color type 6 images. A `pHYs` chunk records the output resolution
//! and `tEXt` chunks carry figure annotations such as the colorbar label.

use crate::errors::Result;
use std::io::Write;

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];
const INCHES_PER_METER: f64 = 39.370_078_740_157_48;

/// Encode RGBA pixel data (4 bytes per pixel, row-major) as PNG
///
/// # Arguments
/// - `pixels`: RGBA pixel data
/// - `width`, `height`: image size in pixels
/// - `dpi`: resolution stored in the `pHYs` chunk
/// - `text`: keyword/value pairs stored as `tEXt` chunks
pub fn encode_rgba(
    pixels: &[u8],
    width: usize,
    height: usize,
    dpi: u32,
    text: &[(&str, String)],
) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    png.extend_from_slice(&SIGNATURE);

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr.push(8); // bit depth
    ihdr.push(6); // color type (RGBA)
    ihdr.push(0); // compression method
    ihdr.push(0); // filter method
    ihdr.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr);

    let pixels_per_meter = (f64::from(dpi) * INCHES_PER_METER).round() as u32;
    let mut phys = Vec::with_capacity(9);
    phys.extend_from_slice(&pixels_per_meter.to_be_bytes());
    phys.extend_from_slice(&pixels_per_meter.to_be_bytes());
    phys.push(1); // unit: meter
    write_chunk(&mut png, b"pHYs", &phys);

    for (keyword, value) in text {
        let mut data = latin1(keyword);
        data.push(0);
        data.extend(latin1(value));
        write_chunk(&mut png, b"tEXt", &data);
    }

    let idat = deflate_idat_rgba(pixels, width, height)?;
    write_chunk(&mut png, b"IDAT", &idat);

    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Write a PNG chunk
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Deflate RGBA image data for the IDAT chunk
fn deflate_idat_rgba(pixels: &[u8], width: usize, height: usize) -> std::io::Result<Vec<u8>> {
    let stride = width * 4;
    let mut uncompressed = Vec::with_capacity(height * (1 + stride));
    for row in pixels.chunks_exact(stride.max(1)).take(height) {
        uncompressed.push(0); // filter type: none
        uncompressed.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&uncompressed)?;
    encoder.finish()
}

/// tEXt payloads are Latin-1; anything outside it becomes '?'
fn latin1(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

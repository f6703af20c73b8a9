//! Payload decompression.

use std::io::Read;

use flate2::read::DeflateDecoder;

use crate::entry::CompressionMethod;
use crate::{Error, Result};

/// Decode a payload according to its compression method.
///
/// `data` is the stored (and already decrypted) payload. The result is
/// exactly `expected_size` bytes long.
pub fn decompress(method: CompressionMethod, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => copy_stored(data, expected_size),
        CompressionMethod::Deflate => decompress_deflate_sized(data, expected_size),
        CompressionMethod::Zstd => decompress_zstd_sized(data, expected_size),
    }
}

/// Copy exactly `expected_size` bytes of a stored payload.
fn copy_stored(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    data.get(..expected_size)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| {
            Error::Decompression(format!(
                "stored entry truncated: expected {}, got {}",
                expected_size,
                data.len()
            ))
        })
}

/// Decompress a single Zstandard frame.
///
/// Bytes after the end of the frame are ignored.
pub fn decompress_zstd(data: &[u8], output: &mut Vec<u8>) -> Result<()> {
    let mut decoder = zstd::Decoder::new(data)
        .map_err(|e| Error::Decompression(e.to_string()))?
        .single_frame();

    output.clear();
    decoder
        .read_to_end(output)
        .map_err(|e| Error::Decompression(e.to_string()))?;

    Ok(())
}

/// Decompress Zstandard data with known output size.
pub fn decompress_zstd_sized(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(expected_size);
    decompress_zstd(data, &mut output)?;
    check_size("zstd", &output, expected_size)?;
    Ok(output)
}

/// Decompress a raw (headerless) DEFLATE stream.
pub fn decompress_deflate(data: &[u8], output: &mut Vec<u8>) -> Result<()> {
    let mut decoder = DeflateDecoder::new(data);

    output.clear();
    decoder
        .read_to_end(output)
        .map_err(|e| Error::Decompression(e.to_string()))?;

    Ok(())
}

/// Decompress DEFLATE data with known output size.
pub fn decompress_deflate_sized(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(expected_size);
    decompress_deflate(data, &mut output)?;
    check_size("deflate", &output, expected_size)?;
    Ok(output)
}

fn check_size(kind: &str, output: &[u8], expected_size: usize) -> Result<()> {
    if output.len() != expected_size {
        return Err(Error::Decompression(format!(
            "{kind} size mismatch: expected {expected_size}, got {}",
            output.len()
        )));
    }
    Ok(())
}

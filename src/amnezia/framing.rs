//! Qt `qCompress` compatible framing: a 4 byte big endian length of the
//! uncompressed data followed by the zlib stream.

use std::io::{self, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{AppError, Result};

pub const DEFAULT_COMPRESSION_LEVEL: u32 = 8;

const HEADER_LEN: usize = 4;

pub fn qt_compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let len = u32::try_from(data.len()).map_err(|_| {
        AppError::Framing(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("payload of {} bytes does not fit the length header", data.len()),
        ))
    })?;

    let mut out = Vec::with_capacity(HEADER_LEN + data.len() / 2);
    out.extend_from_slice(&len.to_be_bytes());

    let mut encoder = ZlibEncoder::new(out, Compression::new(level.min(9)));
    encoder.write_all(data).map_err(AppError::Framing)?;
    encoder.finish().map_err(AppError::Framing)
}

/// Inverse of [`qt_compress`], checks the length header against the
/// decompressed size.
pub fn qt_uncompress(framed: &[u8]) -> Result<Vec<u8>> {
    if framed.len() < HEADER_LEN {
        return Err(AppError::Framing(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "missing length header",
        )));
    }

    let (header, stream) = framed.split_at(HEADER_LEN);
    let expected = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;

    let mut data = Vec::with_capacity(expected);
    ZlibDecoder::new(stream)
        .read_to_end(&mut data)
        .map_err(AppError::Framing)?;

    if data.len() != expected {
        return Err(AppError::Framing(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("length header says {expected} bytes, stream holds {}", data.len()),
        )));
    }

    Ok(data)
}

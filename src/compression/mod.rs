// src/compression/mod.rs
//! Payload decompression for release records
//!
//! The format is sniffed from magic bytes: gzip and zstd streams are
//! decompressed, anything else is passed through unchanged.

use std::io::{self, Read};
use thiserror::Error;

/// Compression-related errors
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("failed to create {format} decoder: {source}")]
    DecoderCreation {
        format: &'static str,
        source: io::Error,
    },

    #[error("corrupt {format} stream: {source}")]
    Decompression {
        format: &'static str,
        source: io::Error,
    },
}

/// Payload encodings recognised by the release decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Raw document bytes
    None,
    /// Gzip (`1f 8b`)
    Gzip,
    /// Zstandard (`28 b5 2f fd`)
    Zstd,
}

impl CompressionFormat {
    /// Detect the format from the leading bytes of a payload
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Self::Zstd
        } else {
            Self::None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Create a decompressing reader for the given format
pub fn create_decoder<'a, R: Read + 'a>(
    reader: R,
    format: CompressionFormat,
) -> Result<Box<dyn Read + 'a>, CompressionError> {
    match format {
        CompressionFormat::None => Ok(Box::new(reader)),
        CompressionFormat::Gzip => Ok(Box::new(flate2::read::GzDecoder::new(reader))),
        CompressionFormat::Zstd => {
            let decoder = zstd::Decoder::new(reader).map_err(|e| {
                CompressionError::DecoderCreation {
                    format: "zstd",
                    source: e,
                }
            })?;
            Ok(Box::new(decoder))
        }
    }
}

/// Decompress a byte slice using the specified format
pub fn decompress(data: &[u8], format: CompressionFormat) -> Result<Vec<u8>, CompressionError> {
    let mut decoder = create_decoder(data, format)?;
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|e| CompressionError::Decompression {
            format: format.name(),
            source: e,
        })?;
    Ok(output)
}

/// Decompress a payload, detecting the format from its magic bytes
pub fn decompress_auto(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    decompress(data, CompressionFormat::from_magic_bytes(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal gzip of "hello"
    const GZIP_HELLO: &[u8] = &[
        0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xcb, 0x48, 0xcd, 0xc9, 0xc9,
        0x07, 0x00, 0x86, 0xa6, 0x10, 0x36, 0x05, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            CompressionFormat::from_magic_bytes(&[0x1f, 0x8b, 0x08, 0x00]),
            CompressionFormat::Gzip
        );
        assert_eq!(
            CompressionFormat::from_magic_bytes(&[0x28, 0xb5, 0x2f, 0xfd]),
            CompressionFormat::Zstd
        );
        assert_eq!(
            CompressionFormat::from_magic_bytes(b"{\"name\":\"x\"}"),
            CompressionFormat::None
        );
        // Too short for any magic
        assert_eq!(CompressionFormat::from_magic_bytes(&[0x1f]), CompressionFormat::None);
    }

    #[test]
    fn test_decompress_auto_gzip() {
        assert_eq!(decompress_auto(GZIP_HELLO).unwrap(), b"hello");
    }

    #[test]
    fn test_decompress_auto_passthrough() {
        let data = b"{\"version\":1}";
        assert_eq!(decompress_auto(data).unwrap(), data);
    }

    #[test]
    fn test_decompress_zstd() {
        let compressed = zstd::encode_all(&b"release payload"[..], 3).unwrap();
        assert_eq!(decompress_auto(&compressed).unwrap(), b"release payload");
    }

    #[test]
    fn test_truncated_gzip_is_error() {
        let truncated = &GZIP_HELLO[..12];
        let err = decompress_auto(truncated).unwrap_err();
        assert!(err.to_string().contains("gzip"));
    }
}

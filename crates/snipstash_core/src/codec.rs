//! Payload compression applied to persisted snippet bodies.
//!
//! The algorithm is chosen once per deployment. Blobs carry no marker of the
//! algorithm that produced them, so encode and decode must run under the same
//! [`Compression`] value; switching it leaves older blobs unreadable.

use std::io::{Read, Write};
use thiserror::Error;

/// Compression algorithm selected by the `COMPRESSION` setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    /// Store payloads unchanged.
    #[default]
    Identity,
    /// Snappy raw block format.
    Snappy,
    /// Gzip stream (deflate).
    Gzip,
}

impl Compression {
    /// Resolve an algorithm from its configuration name.
    ///
    /// Matching is case-insensitive. Unknown names fall back to
    /// [`Compression::Identity`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "snappy" => Self::Snappy,
            "gzip" => Self::Gzip,
            "" | "identity" | "none" => Self::Identity,
            other => {
                tracing::warn!("Unknown COMPRESSION '{}', storing payloads uncompressed", other);
                Self::Identity
            }
        }
    }

    /// Configuration name of this algorithm.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Snappy => "snappy",
            Self::Gzip => "gzip",
        }
    }
}

/// Errors raised while compressing a payload.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("snappy: {0}")]
    Snappy(#[from] snap::Error),

    #[error("gzip: {0}")]
    Gzip(#[from] std::io::Error),
}

/// Reversible byte transform for stored payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Codec {
    compression: Compression,
}

impl Codec {
    /// Build a codec for `compression`.
    pub fn new(compression: Compression) -> Self {
        Self { compression }
    }

    /// Algorithm this codec applies.
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Compress `input` with the configured algorithm.
    ///
    /// # Errors
    /// Returns an error when the underlying compressor rejects the input.
    pub fn encode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self.compression {
            Compression::Identity => Ok(input.to_vec()),
            Compression::Snappy => Ok(snap::raw::Encoder::new().compress_vec(input)?),
            Compression::Gzip => {
                let mut encoder =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(input)?;
                Ok(encoder.finish()?)
            }
        }
    }

    /// Decompress `input` with the configured algorithm.
    ///
    /// Malformed input decodes to an empty buffer; the failure is logged and
    /// callers treat the value as absent.
    pub fn decode(&self, input: &[u8]) -> Vec<u8> {
        let decoded = match self.compression {
            Compression::Identity => return input.to_vec(),
            Compression::Snappy => snap::raw::Decoder::new()
                .decompress_vec(input)
                .map_err(CodecError::from),
            Compression::Gzip => {
                let mut output = Vec::new();
                flate2::read::GzDecoder::new(input)
                    .read_to_end(&mut output)
                    .map(|_| output)
                    .map_err(CodecError::from)
            }
        };
        decoded.unwrap_or_else(|err| {
            tracing::warn!(
                "Failed to decode {} payload ({} bytes): {}",
                self.compression.as_str(),
                input.len(),
                err
            );
            Vec::new()
        })
    }
}

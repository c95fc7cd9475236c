//! Compression backends for the in-process oracle
//!
//! Each backend maps the engine's effort level (0-9 scale, zlib-style) onto
//! its own native range before compressing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Highest effort level accepted by the engine
pub const MAX_LEVEL: u32 = 9;

/// Selector naming which compressor subsequent oracle calls use.
///
/// Every variant exists in every build so configuration files always parse.
/// Codecs behind a cargo feature that was not enabled report
/// [`io::ErrorKind::Unsupported`] from [`CompressionBackend::compress`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionBackend {
    /// DEFLATE in a zlib container
    #[default]
    Zlib,
    /// Zstandard
    Zstd,
    /// LZ4 block format with a length prefix
    Lz4,
    /// bzip2 (Burrows-Wheeler block sorting)
    Bzip2,
    /// Legacy `.lzma` container
    Lzma,
    /// `.xz` container
    Xz,
    /// Snappy raw format
    Snappy,
}

impl CompressionBackend {
    /// Every backend name, compiled in or not.
    pub const KNOWN: &'static [CompressionBackend] = &[
        CompressionBackend::Zlib,
        CompressionBackend::Zstd,
        CompressionBackend::Lz4,
        CompressionBackend::Bzip2,
        CompressionBackend::Lzma,
        CompressionBackend::Xz,
        CompressionBackend::Snappy,
    ];

    /// Every backend compiled into this build.
    pub fn all() -> &'static [CompressionBackend] {
        const ALL: &[CompressionBackend] = &[
            CompressionBackend::Zlib,
            #[cfg(feature = "compression-zstd")]
            CompressionBackend::Zstd,
            #[cfg(feature = "compression-lz4")]
            CompressionBackend::Lz4,
            #[cfg(feature = "compression-bzip2")]
            CompressionBackend::Bzip2,
            #[cfg(feature = "compression-xz")]
            CompressionBackend::Lzma,
            #[cfg(feature = "compression-xz")]
            CompressionBackend::Xz,
            #[cfg(feature = "compression-snappy")]
            CompressionBackend::Snappy,
        ];
        ALL
    }

    pub fn name(self) -> &'static str {
        match self {
            CompressionBackend::Zlib => "zlib",
            CompressionBackend::Zstd => "zstd",
            CompressionBackend::Lz4 => "lz4",
            CompressionBackend::Bzip2 => "bzip2",
            CompressionBackend::Lzma => "lzma",
            CompressionBackend::Xz => "xz",
            CompressionBackend::Snappy => "snappy",
        }
    }

    /// Cargo feature that compiles this backend in; `None` for zlib.
    pub fn feature(self) -> Option<&'static str> {
        match self {
            CompressionBackend::Zlib => None,
            CompressionBackend::Zstd => Some("compression-zstd"),
            CompressionBackend::Lz4 => Some("compression-lz4"),
            CompressionBackend::Bzip2 => Some("compression-bzip2"),
            CompressionBackend::Lzma | CompressionBackend::Xz => Some("compression-xz"),
            CompressionBackend::Snappy => Some("compression-snappy"),
        }
    }

    pub fn is_available(self) -> bool {
        Self::all().contains(&self)
    }

    fn unavailable(self) -> io::Error {
        io::Error::new(
            io::ErrorKind::Unsupported,
            format!(
                "compression backend '{}' is not compiled in (enable cargo feature '{}')",
                self.name(),
                self.feature().unwrap_or_default()
            ),
        )
    }

    /// Compress `data` at effort `level` (clamped to `0..=MAX_LEVEL`).
    pub fn compress(self, level: u32, data: &[u8]) -> io::Result<Vec<u8>> {
        let level = level.min(MAX_LEVEL);
        match self {
            CompressionBackend::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
                encoder.write_all(data)?;
                encoder.finish()
            }
            #[cfg(feature = "compression-zstd")]
            CompressionBackend::Zstd => zstd::bulk::compress(data, zstd_level(level)),
            #[cfg(feature = "compression-lz4")]
            CompressionBackend::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
            #[cfg(feature = "compression-bzip2")]
            CompressionBackend::Bzip2 => {
                // bzip2 block sizes run 1..=9; level 0 uses the smallest block.
                let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::new(level.max(1)));
                encoder.write_all(data)?;
                encoder.finish()
            }
            #[cfg(feature = "compression-xz")]
            CompressionBackend::Lzma => {
                let options = xz2::stream::LzmaOptions::new_preset(level).map_err(io::Error::other)?;
                let stream = xz2::stream::Stream::new_lzma_encoder(&options).map_err(io::Error::other)?;
                let mut encoder = xz2::write::XzEncoder::new_stream(Vec::new(), stream);
                encoder.write_all(data)?;
                encoder.finish()
            }
            #[cfg(feature = "compression-xz")]
            CompressionBackend::Xz => {
                let mut encoder = xz2::write::XzEncoder::new(Vec::new(), level);
                encoder.write_all(data)?;
                encoder.finish()
            }
            // Snappy has no effort setting.
            #[cfg(feature = "compression-snappy")]
            CompressionBackend::Snappy => snap::raw::Encoder::new()
                .compress_vec(data)
                .map_err(io::Error::other),
            #[allow(unreachable_patterns)]
            _ => Err(self.unavailable()),
        }
    }

    /// Inverse of [`CompressionBackend::compress`].
    pub fn decompress(self, compressed: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        match self {
            CompressionBackend::Zlib => {
                ZlibDecoder::new(compressed).read_to_end(&mut out)?;
            }
            #[cfg(feature = "compression-zstd")]
            CompressionBackend::Zstd => out = zstd::stream::decode_all(compressed)?,
            #[cfg(feature = "compression-lz4")]
            CompressionBackend::Lz4 => {
                out = lz4_flex::decompress_size_prepended(compressed)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
            }
            #[cfg(feature = "compression-bzip2")]
            CompressionBackend::Bzip2 => {
                bzip2::read::BzDecoder::new(compressed).read_to_end(&mut out)?;
            }
            #[cfg(feature = "compression-xz")]
            CompressionBackend::Lzma => {
                let stream = xz2::stream::Stream::new_lzma_decoder(u64::MAX).map_err(io::Error::other)?;
                xz2::read::XzDecoder::new_stream(compressed, stream).read_to_end(&mut out)?;
            }
            #[cfg(feature = "compression-xz")]
            CompressionBackend::Xz => {
                xz2::read::XzDecoder::new(compressed).read_to_end(&mut out)?;
            }
            #[cfg(feature = "compression-snappy")]
            CompressionBackend::Snappy => {
                out = snap::raw::Decoder::new()
                    .decompress_vec(compressed)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
            }
            #[allow(unreachable_patterns)]
            _ => return Err(self.unavailable()),
        }
        Ok(out)
    }
}

/// Spread 0..=9 over zstd's 1..=19 regular levels.
#[cfg(feature = "compression-zstd")]
fn zstd_level(level: u32) -> i32 {
    1 + (level as i32 * 2)
}

impl fmt::Display for CompressionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name that matches no backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBackendError {
    pub name: String,
}

impl fmt::Display for ParseBackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let known: Vec<&str> = CompressionBackend::KNOWN.iter().map(|b| b.name()).collect();
        write!(
            f,
            "unknown compression backend '{}' (available: {})",
            self.name,
            known.join(", ")
        )
    }
}

impl std::error::Error for ParseBackendError {}

impl FromStr for CompressionBackend {
    type Err = ParseBackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        CompressionBackend::KNOWN
            .iter()
            .copied()
            .find(|b| b.name() == wanted)
            .ok_or_else(|| ParseBackendError { name: s.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_backend_round_trips() {
        let data = b"aaaaaaaaaabbbbbbbbbbaaaaaaaaaabbbbbbbbbb-signature".repeat(8);
        for &backend in CompressionBackend::all() {
            for level in [0, 9] {
                let packed = backend.compress(level, &data).unwrap();
                assert_eq!(backend.decompress(&packed).unwrap(), data, "{backend} at level {level}");
            }
            let packed = backend.compress(9, &data).unwrap();
            assert!(packed.len() < data.len(), "{backend} did not shrink input");
        }
    }

    #[cfg(feature = "compression")]
    #[test]
    fn full_feature_set_ships_every_backend() {
        assert_eq!(CompressionBackend::all(), CompressionBackend::KNOWN);
    }

    #[test]
    fn missing_codec_is_an_unsupported_error() {
        for &backend in CompressionBackend::KNOWN {
            if backend.is_available() {
                continue;
            }
            let err = backend.compress(5, b"data").unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::Unsupported);
            assert!(err.to_string().contains(backend.feature().unwrap()));
        }
    }

    #[test]
    fn config_names_parse_in_every_build() {
        let backend: CompressionBackend = serde_json::from_str(r#""snappy""#).unwrap();
        assert_eq!(backend, CompressionBackend::Snappy);
        assert_eq!("XZ".parse::<CompressionBackend>().unwrap(), CompressionBackend::Xz);
        assert_eq!(CompressionBackend::default(), CompressionBackend::Zlib);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("ZLib".parse::<CompressionBackend>().unwrap(), CompressionBackend::Zlib);
        let err = "smaz".parse::<CompressionBackend>().unwrap_err();
        assert!(err.to_string().contains("unknown compression backend 'smaz'"));
    }

    #[test]
    fn level_above_max_is_clamped() {
        let data = b"clamp me clamp me clamp me";
        let at_max = CompressionBackend::Zlib.compress(MAX_LEVEL, data).unwrap();
        let above = CompressionBackend::Zlib.compress(42, data).unwrap();
        assert_eq!(at_max, above);
    }
}

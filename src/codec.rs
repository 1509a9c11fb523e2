//! Whole-payload compression for v8 buffers.
//!
//! The header records which codec compressed a payload by id, so a codec
//! is a small trait object and new ones can be added without touching the
//! format code. Brotli is the only built-in codec. It must be configured
//! once through [`init_brotli`] before any v8 buffer is written or read;
//! until then it reports a precondition error instead of guessing settings.

use std::io::{Read, Write};
use std::sync::OnceLock;

use tracing::debug;

use crate::errors::{Result, TrieError};

/// A compressor for the serialized payload.
pub trait PayloadCodec: Send + Sync {
    /// Identifier stored in header flag bits 8..15. Never 0.
    fn id(&self) -> u8;

    /// Human-readable name, for errors and logs.
    fn name(&self) -> &'static str;

    /// Compresses `payload`.
    fn encode(&self, payload: &[u8]) -> Result<Vec<u8>>;

    /// Decompresses a payload produced by [`encode`](Self::encode).
    /// Output longer than `limit` bytes is a format error.
    fn decode(&self, compressed: &[u8], limit: usize) -> Result<Vec<u8>>;
}

/// Header id of [`BrotliCodec`].
pub const BROTLI_ID: u8 = 1;

const BROTLI_BUFFER_SIZE: usize = 4096;

/// Brotli encoder settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BrotliConfig {
    /// Compression quality, 0..=11.
    pub quality: u32,
    /// Base-2 log of the sliding window, 10..=24.
    pub lg_window: u32,
}

impl Default for BrotliConfig {
    fn default() -> Self {
        BrotliConfig {
            quality: 11,
            lg_window: 22,
        }
    }
}

/// Brotli payload codec. Unusable until [`init`](Self::init) is called.
#[derive(Debug, Default)]
pub struct BrotliCodec {
    config: OnceLock<BrotliConfig>,
}

impl BrotliCodec {
    /// Creates an uninitialized codec.
    pub const fn new() -> Self {
        BrotliCodec {
            config: OnceLock::new(),
        }
    }

    /// Sets the encoder settings. The first call wins; later calls return
    /// the settings already in effect.
    pub fn init(&self, config: BrotliConfig) -> Result<BrotliConfig> {
        if config.quality > 11 || !(10..=24).contains(&config.lg_window) {
            return Err(TrieError::construction(
                "config",
                format!(
                    "brotli quality {} / window {} out of range",
                    config.quality, config.lg_window
                ),
            ));
        }
        let active = *self.config.get_or_init(|| config);
        debug!("brotli codec ready: {active:?}");
        Ok(active)
    }

    /// True once [`init`](Self::init) has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.config.get().is_some()
    }

    fn config(&self) -> Result<&BrotliConfig> {
        self.config.get().ok_or_else(|| {
            TrieError::precondition(
                "brotli codec used before initialization",
                "call owtrie::codec::init_brotli first",
            )
        })
    }
}

impl PayloadCodec for BrotliCodec {
    fn id(&self) -> u8 {
        BROTLI_ID
    }

    fn name(&self) -> &'static str {
        "brotli"
    }

    fn encode(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let config = self.config()?;
        let mut writer = brotli::CompressorWriter::new(
            Vec::with_capacity(payload.len() / 2),
            BROTLI_BUFFER_SIZE,
            config.quality,
            config.lg_window,
        );
        writer.write_all(payload)?;
        writer.flush()?;
        Ok(writer.into_inner())
    }

    fn decode(&self, compressed: &[u8], limit: usize) -> Result<Vec<u8>> {
        self.config()?;
        let mut out = Vec::with_capacity(limit.min(compressed.len().saturating_mul(4)));
        brotli::Decompressor::new(compressed, BROTLI_BUFFER_SIZE)
            .take((limit as u64).saturating_add(1))
            .read_to_end(&mut out)
            .map_err(|e| TrieError::format(format!("Corrupt brotli payload: {e}")))?;
        if out.len() > limit {
            return Err(TrieError::format(format!(
                "Decompressed payload exceeds {limit} bytes"
            )));
        }
        Ok(out)
    }
}

static BROTLI: BrotliCodec = BrotliCodec::new();

/// The process-wide brotli codec used by [`FormatVersion::V8`](crate::FormatVersion::V8).
pub fn brotli() -> &'static BrotliCodec {
    &BROTLI
}

/// Initializes the process-wide brotli codec.
///
/// ```
/// use owtrie::codec::{init_brotli, BrotliConfig};
///
/// init_brotli(BrotliConfig::default()).unwrap();
/// let trie = owtrie::build_trie(["test"]).unwrap();
/// let bytes = trie.to_bytes(owtrie::FormatVersion::V8).unwrap();
/// assert!(owtrie::Trie::from_bytes(&bytes).unwrap().has("test"));
/// ```
pub fn init_brotli(config: BrotliConfig) -> Result<BrotliConfig> {
    BROTLI.init(config)
}

/// The registered codec with header id `id`.
pub fn codec_for_id(id: u8) -> Option<&'static dyn PayloadCodec> {
    match id {
        BROTLI_ID => Some(&BROTLI),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ready() -> BrotliCodec {
        let codec = BrotliCodec::new();
        codec.init(BrotliConfig::default()).unwrap();
        codec
    }

    #[test]
    fn uninitialized_codec_is_a_precondition_error() {
        let codec = BrotliCodec::new();
        assert!(!codec.is_initialized());
        assert!(codec.encode(b"abc").unwrap_err().is_precondition());
        assert!(codec.decode(b"abc", 16).unwrap_err().is_precondition());
    }

    #[test]
    fn round_trip() {
        let codec = ready();
        let payload: Vec<u8> = b"nation station ration ".repeat(50);
        let compressed = codec.encode(&payload).unwrap();
        assert!(compressed.len() < payload.len());
        assert_eq!(codec.decode(&compressed, payload.len()).unwrap(), payload);
        assert_eq!(codec.decode(&codec.encode(&[]).unwrap(), 0).unwrap(), b"");
    }

    #[test]
    fn output_is_capped() {
        let codec = ready();
        let payload = vec![0u8; 1 << 16];
        let compressed = codec.encode(&payload).unwrap();
        assert!(compressed.len() < 64);
        let err = codec.decode(&compressed, payload.len() - 1).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn first_init_wins() {
        let codec = ready();
        let again = codec
            .init(BrotliConfig {
                quality: 1,
                lg_window: 16,
            })
            .unwrap();
        assert_eq!(again, BrotliConfig::default());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let codec = BrotliCodec::new();
        let err = codec.init(BrotliConfig {
            quality: 12,
            lg_window: 22,
        });
        assert!(err.is_err());
        assert!(!codec.is_initialized());
    }

    #[test]
    fn registry_lookup() {
        assert_eq!(codec_for_id(BROTLI_ID).map(|c| c.name()), Some("brotli"));
        assert!(codec_for_id(0).is_none());
        assert!(codec_for_id(7).is_none());
    }
}

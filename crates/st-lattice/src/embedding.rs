// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Fixed-width bit pattern injected into the potential and coupling fields.

use num_bigint::BigUint;

use crate::config::ConfigError;

/// Width of an embedding and of every extracted candidate.
pub const EMBEDDING_BITS: usize = 256;

/// A 256-bit big-endian bit sequence, zero-padded on the left.
///
/// Inputs wider than 256 bits are rejected rather than wrapped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Embedding {
    bits: [bool; EMBEDDING_BITS],
}

impl Embedding {
    pub fn from_biguint(value: &BigUint) -> Result<Self, ConfigError> {
        let width = value.bits();
        if width > EMBEDDING_BITS as u64 {
            return Err(ConfigError::EmbeddingTooWide { bits: width });
        }
        let bytes = value.to_bytes_be();
        let offset = EMBEDDING_BITS / 8 - bytes.len();
        let mut bits = [false; EMBEDDING_BITS];
        for (i, byte) in bytes.iter().enumerate() {
            for b in 0..8 {
                bits[(offset + i) * 8 + b] = (byte >> (7 - b)) & 1 == 1;
            }
        }
        Ok(Self { bits })
    }

    /// Parses a hexadecimal integer, with or without a `0x` prefix.
    pub fn from_hex(text: &str) -> Result<Self, ConfigError> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() {
            return Err(ConfigError::MissingEmbedding);
        }
        let value = BigUint::parse_bytes(digits.as_bytes(), 16)
            .ok_or_else(|| ConfigError::MalformedEmbedding(trimmed.to_string()))?;
        Self::from_biguint(&value)
    }

    pub fn from_bits(bits: [bool; EMBEDDING_BITS]) -> Self {
        Self { bits }
    }

    pub fn bits(&self) -> &[bool; EMBEDDING_BITS] {
        &self.bits
    }

    pub fn bit(&self, index: usize) -> bool {
        self.bits[index % EMBEDDING_BITS]
    }

    pub fn to_biguint(&self) -> BigUint {
        let mut bytes = [0u8; EMBEDDING_BITS / 8];
        for (i, &bit) in self.bits.iter().enumerate() {
            if bit {
                bytes[i / 8] |= 1 << (7 - i % 8);
            }
        }
        BigUint::from_bytes_be(&bytes)
    }

    /// Repeats the bit pattern across `len` lattice points as `0.0`/`1.0`.
    pub fn tiled(&self, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| if self.bit(i) { 1.0 } else { 0.0 })
            .collect()
    }

    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_are_left_padded() {
        let embedding = Embedding::from_biguint(&BigUint::from(0b101u32)).unwrap();
        let bits = embedding.bits();
        assert!(bits[..253].iter().all(|&b| !b));
        assert_eq!(&bits[253..], &[true, false, true]);
        assert_eq!(embedding.to_biguint(), BigUint::from(5u32));
    }

    #[test]
    fn oversized_values_are_rejected_not_wrapped() {
        let wide = BigUint::from(1u32) << 256;
        let err = Embedding::from_biguint(&wide).unwrap_err();
        assert!(matches!(err, ConfigError::EmbeddingTooWide { bits: 257 }));

        let max = (BigUint::from(1u32) << 256) - 1u32;
        let embedding = Embedding::from_biguint(&max).unwrap();
        assert_eq!(embedding.count_ones(), EMBEDDING_BITS);
    }

    #[test]
    fn hex_parsing_reports_missing_and_malformed_input() {
        assert!(matches!(
            Embedding::from_hex("  ").unwrap_err(),
            ConfigError::MissingEmbedding
        ));
        assert!(matches!(
            Embedding::from_hex("0x").unwrap_err(),
            ConfigError::MissingEmbedding
        ));
        assert!(matches!(
            Embedding::from_hex("xyz").unwrap_err(),
            ConfigError::MalformedEmbedding(_)
        ));
        let parsed = Embedding::from_hex("0x123456789").unwrap();
        assert_eq!(parsed.to_biguint(), BigUint::from(0x1_2345_6789u64));
    }

    #[test]
    fn tiling_preserves_leading_zero_bits() {
        let embedding = Embedding::from_hex("0x123456789").unwrap();
        let tiled = embedding.tiled(5625);
        assert_eq!(tiled.len(), 5625);
        for (i, &bit) in embedding.bits().iter().enumerate() {
            assert_eq!(tiled[i], if bit { 1.0 } else { 0.0 });
            assert_eq!(tiled[i + EMBEDDING_BITS], tiled[i]);
        }
    }
}

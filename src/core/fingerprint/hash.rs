//! Fixed-length bit fingerprints and rotation sets.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A perceptual fingerprint: a fixed-length bit sequence.
///
/// Bits are packed most significant bit first, row-major over the
/// low-frequency coefficient block. The textual form is lowercase hex,
/// which is also how fingerprints are stored in checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    bytes: Vec<u8>,
}

impl Fingerprint {
    /// Create a fingerprint from packed bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Pack a sequence of bits, most significant bit first
    pub fn from_bits<I>(bits: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let mut bytes = Vec::new();
        let mut current_byte: u8 = 0;
        let mut bit_position = 0;

        for bit in bits {
            if bit {
                current_byte |= 1 << (7 - bit_position);
            }

            bit_position += 1;

            if bit_position == 8 {
                bytes.push(current_byte);
                current_byte = 0;
                bit_position = 0;
            }
        }

        if bit_position > 0 {
            bytes.push(current_byte);
        }

        Self { bytes }
    }

    /// Parse the hex form
    pub fn from_hex(hex: &str) -> Result<Self, String> {
        if hex.is_empty() || hex.len() % 2 != 0 {
            return Err(format!("fingerprint '{}' has odd or zero length", hex));
        }

        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| {
                hex.get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| format!("fingerprint '{}' is not valid hex", hex))
            })
            .collect::<Result<Vec<u8>, String>>()?;

        Ok(Self { bytes })
    }

    /// Lowercase hex representation
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Raw packed bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total number of bits
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8
    }

    /// Hamming distance: number of differing bits.
    ///
    /// Both fingerprints must come from the same hash size.
    pub fn distance(&self, other: &Self) -> u32 {
        debug_assert_eq!(self.bytes.len(), other.bytes.len());
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Fingerprint::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Counter-clockwise rotation applied before fingerprinting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270];

    /// Rotation angle in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }

    /// Build from an angle; anything that is not a multiple of 90 is rounded down
    pub fn from_degrees(degrees: u32) -> Self {
        match (degrees % 360) / 90 {
            0 => Rotation::R0,
            1 => Rotation::R90,
            2 => Rotation::R180,
            _ => Rotation::R270,
        }
    }

    /// The rotation that takes `self` to `other`
    pub fn offset_to(&self, other: Rotation) -> Rotation {
        Rotation::from_degrees(360 + other.degrees() - self.degrees())
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// The four fingerprints of one image, one per rotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotatedFingerprints {
    pub r0: Fingerprint,
    pub r90: Fingerprint,
    pub r180: Fingerprint,
    pub r270: Fingerprint,
}

impl RotatedFingerprints {
    /// Fingerprint for one rotation
    pub fn get(&self, rotation: Rotation) -> &Fingerprint {
        match rotation {
            Rotation::R0 => &self.r0,
            Rotation::R90 => &self.r90,
            Rotation::R180 => &self.r180,
            Rotation::R270 => &self.r270,
        }
    }

    /// All four fingerprints with their rotation
    pub fn iter(&self) -> impl Iterator<Item = (Rotation, &Fingerprint)> + '_ {
        Rotation::ALL.into_iter().map(move |r| (r, self.get(r)))
    }

    /// Bit length shared by all four fingerprints, or None if they disagree
    pub fn uniform_bit_len(&self) -> Option<usize> {
        let len = self.r0.bit_len();
        self.iter()
            .all(|(_, fp)| fp.bit_len() == len)
            .then_some(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(bytes: &[u8]) -> Fingerprint {
        Fingerprint::from_bytes(bytes.to_vec())
    }

    #[test]
    fn distance_to_self_is_zero() {
        let hash = fp(&[0xFF, 0x00, 0xAA, 0x55]);
        assert_eq!(hash.distance(&hash), 0);
    }

    #[test]
    fn distance_counts_differing_bits() {
        assert_eq!(fp(&[0b1111_1111]).distance(&fp(&[0b0000_0000])), 8);
        assert_eq!(fp(&[0b1010_0000, 0x01]).distance(&fp(&[0b0010_0000, 0x00])), 2);
    }

    #[test]
    fn bits_pack_most_significant_first() {
        let hash = Fingerprint::from_bits([true, false, false, false, false, false, false, true]);
        assert_eq!(hash.as_bytes(), &[0b1000_0001]);
    }

    #[test]
    fn hex_form_is_lowercase_and_parses_back() {
        let hash = fp(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01, 0x02, 0x03]);
        assert_eq!(hash.to_hex(), "deadbeef00010203");
        assert_eq!(Fingerprint::from_hex("DEADBEEF00010203").unwrap(), hash);
    }

    #[test]
    fn invalid_hex_is_rejected() {
        assert!(Fingerprint::from_hex("abc").is_err());
        assert!(Fingerprint::from_hex("zz").is_err());
        assert!(Fingerprint::from_hex("").is_err());
    }

    #[test]
    fn serializes_as_hex_string() {
        let json = serde_json::to_string(&fp(&[0x0f, 0xf0])).unwrap();
        assert_eq!(json, "\"0ff0\"");
    }

    #[test]
    fn rotation_offsets_wrap() {
        assert_eq!(Rotation::R0.offset_to(Rotation::R90), Rotation::R90);
        assert_eq!(Rotation::R270.offset_to(Rotation::R90), Rotation::R180);
        assert_eq!(Rotation::R90.offset_to(Rotation::R0), Rotation::R270);
    }

    #[test]
    fn uniform_bit_len_detects_mismatch() {
        let good = RotatedFingerprints {
            r0: fp(&[0; 8]),
            r90: fp(&[1; 8]),
            r180: fp(&[2; 8]),
            r270: fp(&[3; 8]),
        };
        assert_eq!(good.uniform_bit_len(), Some(64));

        let bad = RotatedFingerprints {
            r270: fp(&[3; 32]),
            ..good
        };
        assert_eq!(bad.uniform_bit_len(), None);
    }
}

//! Integrity digests in Subresource Integrity form.
//!
//! An [`Integrity`] is one or more `algorithm-base64digest` pairs separated by
//! whitespace, e.g. `sha256-LPJNul+wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ=`.
//! Digests are the sole identity of stored content.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{CaskError, CaskResult};

/// Supported hash functions, ordered from weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Algorithm {
    Sha1,
    #[default]
    Sha256,
    Blake3,
    Sha384,
    Sha512,
}

impl Algorithm {
    /// All supported algorithms, weakest first
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Sha1,
        Algorithm::Sha256,
        Algorithm::Blake3,
        Algorithm::Sha384,
        Algorithm::Sha512,
    ];

    /// Lowercase tag used in integrity strings and content paths
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
            Algorithm::Blake3 => "blake3",
            Algorithm::Sha384 => "sha384",
            Algorithm::Sha512 => "sha512",
        }
    }

    /// Length of the raw digest in bytes
    pub fn digest_len(&self) -> usize {
        match self {
            Algorithm::Sha1 => 20,
            Algorithm::Sha256 | Algorithm::Blake3 => 32,
            Algorithm::Sha384 => 48,
            Algorithm::Sha512 => 64,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = CaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha1" => Ok(Algorithm::Sha1),
            "sha256" => Ok(Algorithm::Sha256),
            "blake3" => Ok(Algorithm::Blake3),
            "sha384" => Ok(Algorithm::Sha384),
            "sha512" => Ok(Algorithm::Sha512),
            other => Err(CaskError::UnsupportedAlgorithm {
                algorithm: other.to_string(),
            }),
        }
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        tag.parse().map_err(de::Error::custom)
    }
}

/// A single algorithm/digest pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hash {
    /// Hash function that produced the digest
    pub algorithm: Algorithm,
    /// Standard base64 encoding of the raw digest
    pub digest: String,
}

impl Hash {
    /// Build a hash from raw digest bytes
    pub fn from_bytes(algorithm: Algorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            digest: STANDARD.encode(bytes),
        }
    }

    /// Decode the digest back into raw bytes.
    ///
    /// Fails with `MalformedIntegrity` if the digest is not base64 or its
    /// length does not fit the algorithm.
    pub fn to_bytes(&self) -> CaskResult<Vec<u8>> {
        let bytes = STANDARD
            .decode(&self.digest)
            .map_err(|e| CaskError::MalformedIntegrity {
                input: self.to_string(),
                reason: format!("invalid base64: {}", e),
            })?;
        if bytes.len() != self.algorithm.digest_len() {
            return Err(CaskError::MalformedIntegrity {
                input: self.to_string(),
                reason: format!(
                    "{} digest must be {} bytes, got {}",
                    self.algorithm,
                    self.algorithm.digest_len(),
                    bytes.len()
                ),
            });
        }
        Ok(bytes)
    }

    /// Hex encoding of the digest
    pub fn to_hex(&self) -> CaskResult<String> {
        Ok(hex::encode(self.to_bytes()?))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.algorithm, self.digest)
    }
}

impl FromStr for Hash {
    type Err = CaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, digest) = s.split_once('-').ok_or_else(|| CaskError::MalformedIntegrity {
            input: s.to_string(),
            reason: "expected 'algorithm-digest'".to_string(),
        })?;
        let algorithm: Algorithm = tag.parse()?;

        // SRI allows `?options` after the digest; they carry no identity.
        let digest = digest.split('?').next().unwrap_or_default();
        let bytes = STANDARD
            .decode(digest)
            .map_err(|e| CaskError::MalformedIntegrity {
                input: s.to_string(),
                reason: format!("invalid base64: {}", e),
            })?;
        if bytes.len() != algorithm.digest_len() {
            return Err(CaskError::MalformedIntegrity {
                input: s.to_string(),
                reason: format!(
                    "{} digest must be {} bytes, got {}",
                    algorithm,
                    algorithm.digest_len(),
                    bytes.len()
                ),
            });
        }

        Ok(Self {
            algorithm,
            digest: digest.to_string(),
        })
    }
}

/// One or more digests identifying a piece of content
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Integrity {
    /// Hashes sorted strongest first, never empty
    hashes: Vec<Hash>,
}

impl Integrity {
    /// Build an integrity from a single hash
    pub fn from_hash(hash: Hash) -> Self {
        Self { hashes: vec![hash] }
    }

    /// Build an integrity from raw digest bytes
    pub fn from_bytes(algorithm: Algorithm, bytes: &[u8]) -> Self {
        Self::from_hash(Hash::from_bytes(algorithm, bytes))
    }

    /// All hashes, strongest first
    pub fn hashes(&self) -> &[Hash] {
        &self.hashes
    }

    /// The strongest hash in this integrity
    pub fn pick(&self) -> &Hash {
        &self.hashes[0]
    }

    /// Algorithm of the strongest hash
    pub fn algorithm(&self) -> Algorithm {
        self.pick().algorithm
    }

    /// Algorithm and hex digest of the strongest hash
    pub fn to_hex(&self) -> CaskResult<(Algorithm, String)> {
        let hash = self.pick();
        Ok((hash.algorithm, hash.to_hex()?))
    }

    /// Returns the strongest algorithm for which both integrities carry
    /// the same digest, if any.
    pub fn matches(&self, other: &Integrity) -> Option<Algorithm> {
        self.hashes
            .iter()
            .find(|hash| other.hashes.iter().any(|theirs| theirs == *hash))
            .map(|hash| hash.algorithm)
    }

    /// Merge another integrity's hashes into this one
    pub fn concat(mut self, other: Integrity) -> Self {
        for hash in other.hashes {
            if !self.hashes.contains(&hash) {
                self.hashes.push(hash);
            }
        }
        self.hashes.sort_by(|a, b| b.algorithm.cmp(&a.algorithm));
        self
    }
}

impl fmt::Display for Integrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.hashes.iter().map(|hash| hash.to_string()).collect();
        f.write_str(&parts.join(" "))
    }
}

impl FromStr for Integrity {
    type Err = CaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut hashes = s
            .split_whitespace()
            .map(Hash::from_str)
            .collect::<CaskResult<Vec<_>>>()?;
        if hashes.is_empty() {
            return Err(CaskError::MalformedIntegrity {
                input: s.to_string(),
                reason: "no hashes present".to_string(),
            });
        }
        hashes.sort_by(|a, b| b.algorithm.cmp(&a.algorithm));
        hashes.dedup();
        Ok(Self { hashes })
    }
}

impl Serialize for Integrity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Integrity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IntegrityVisitor;

        impl<'de> Visitor<'de> for IntegrityVisitor {
            type Value = Integrity;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integrity string such as 'sha256-<base64>'")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Integrity, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(IntegrityVisitor)
    }
}

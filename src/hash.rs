// src/hash.rs

//! Content fingerprints for imported files
//!
//! Every file written by an import gets a digest over its raw bytes. The
//! digest is handed back to the caller as a per-file content code; the
//! engine itself never deduplicates on it.
//!
//! | Algorithm | Use |
//! |-----------|-----|
//! | MD5 | Default content code, matches what existing write-back registries expect |
//! | SHA-256 | Opt-in for callers that want a stronger digest |

use md5::Md5;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Fingerprint algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    Md5,
    Sha256,
}

impl HashAlgorithm {
    /// Digest length in bytes
    #[inline]
    pub const fn output_len(&self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha256 => 32,
        }
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            _ => Err(format!("Unknown hash algorithm: {s}")),
        }
    }
}

/// A digest value with its algorithm
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub algorithm: HashAlgorithm,
    /// Lowercase hex
    pub value: String,
}

impl Fingerprint {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Format as "md5:abc123..."
    pub fn to_prefixed_string(&self) -> String {
        format!("{}:{}", self.algorithm.name(), self.value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Incremental hasher over any supported algorithm
pub struct Hasher {
    algorithm: HashAlgorithm,
    state: HasherState,
}

enum HasherState {
    Md5(Md5),
    Sha256(Sha256),
}

impl Hasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Md5 => HasherState::Md5(Md5::new()),
            HashAlgorithm::Sha256 => HasherState::Sha256(Sha256::new()),
        };
        Self { algorithm, state }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Md5(hasher) => hasher.update(data),
            HasherState::Sha256(hasher) => hasher.update(data),
        }
    }

    pub fn finalize(self) -> Fingerprint {
        let value = match self.state {
            HasherState::Md5(hasher) => hex::encode(hasher.finalize()),
            HasherState::Sha256(hasher) => hex::encode(hasher.finalize()),
        };
        Fingerprint {
            algorithm: self.algorithm,
            value,
        }
    }
}

/// Fingerprint a byte slice
pub fn fingerprint(algorithm: HashAlgorithm, data: &[u8]) -> Fingerprint {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_fingerprint() {
        let fp = fingerprint(HashAlgorithm::Md5, b"Hello, World!");
        assert_eq!(fp.value, "65a8e27d8879283831b664bd8b7f0ad4");
        assert_eq!(fp.value.len(), HashAlgorithm::Md5.output_len() * 2);
    }

    #[test]
    fn test_sha256_fingerprint() {
        let fp = fingerprint(HashAlgorithm::Sha256, b"Hello, World!");
        assert_eq!(
            fp.value,
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_empty_content() {
        let fp = fingerprint(HashAlgorithm::Md5, b"");
        assert_eq!(fp.value, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let mut hasher = Hasher::new(HashAlgorithm::Md5);
        hasher.update(b"Hello, ");
        hasher.update(b"World!");
        assert_eq!(
            hasher.finalize(),
            fingerprint(HashAlgorithm::Md5, b"Hello, World!")
        );
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("MD5".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Md5);
        assert_eq!(
            "sha-256".parse::<HashAlgorithm>().unwrap(),
            HashAlgorithm::Sha256
        );
        assert!("crc32".parse::<HashAlgorithm>().is_err());
        assert_eq!(
            fingerprint(HashAlgorithm::Md5, b"").to_prefixed_string(),
            "md5:d41d8cd98f00b204e9800998ecf8427e"
        );
    }
}

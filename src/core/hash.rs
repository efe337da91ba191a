// ─── Hashing ───
// Digest algorithms used to validate downloads and derive cache keys.

use std::fmt;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::core::error::{IoResultExt, WorkspaceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Md5,
}

impl HashAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Md5 => "MD5",
        }
    }

    /// Lower-case hex digest of an in-memory buffer.
    pub fn digest(self, bytes: &[u8]) -> String {
        match self {
            HashAlgorithm::Sha1 => hex::encode(Sha1::digest(bytes)),
            HashAlgorithm::Sha256 => hex::encode(sha2::Sha256::digest(bytes)),
            HashAlgorithm::Md5 => hex::encode(md5::Md5::digest(bytes)),
        }
    }

    /// Lower-case hex digest of a file, read in chunks.
    pub fn digest_file(self, path: &Path) -> WorkspaceResult<String> {
        let file = std::fs::File::open(path).at(path)?;
        match self {
            HashAlgorithm::Sha1 => digest_reader::<Sha1>(file, path),
            HashAlgorithm::Sha256 => digest_reader::<sha2::Sha256>(file, path),
            HashAlgorithm::Md5 => digest_reader::<md5::Md5>(file, path),
        }
    }

    /// Whether the file at `path` hashes to `expected` (case-insensitive).
    pub fn validate(self, path: &Path, expected: &str) -> WorkspaceResult<bool> {
        Ok(self.digest_file(path)?.eq_ignore_ascii_case(expected))
    }
}

/// Incremental digest for streamed content.
pub enum StreamingHasher {
    Sha1(Sha1),
    Sha256(sha2::Sha256),
    Md5(md5::Md5),
}

impl StreamingHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha1 => StreamingHasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => StreamingHasher::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Md5 => StreamingHasher::Md5(md5::Md5::new()),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            StreamingHasher::Sha1(h) => h.update(bytes),
            StreamingHasher::Sha256(h) => h.update(bytes),
            StreamingHasher::Md5(h) => h.update(bytes),
        }
    }

    pub fn finish(self) -> String {
        match self {
            StreamingHasher::Sha1(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha256(h) => hex::encode(h.finalize()),
            StreamingHasher::Md5(h) => hex::encode(h.finalize()),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn digest_reader<D: Digest>(mut reader: impl Read, path: &Path) -> WorkspaceResult<String> {
    let mut hasher = D::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buf).at(path)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

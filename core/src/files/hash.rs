//! MD5 and SHA-1 digests of file content.

use std::io::{self, Read, Write};

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Digests of a file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHashes {
    /// Lowercase hex MD5.
    pub md5: String,
    /// Lowercase hex SHA-1.
    pub sha1: String,
    /// The 20 raw SHA-1 bytes.
    pub sha1_raw: Vec<u8>,
}

impl FileHashes {
    /// Hash an in-memory buffer.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(data);
        hasher.finish()
    }

    /// Hash everything `reader` yields without buffering it whole.
    pub fn from_reader<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut hasher = Hasher::new();
        io::copy(reader, &mut hasher)?;
        Ok(hasher.finish())
    }
}

/// Incremental MD5 + SHA-1 computation.
struct Hasher {
    md5: Md5,
    sha1: Sha1,
}

impl Hasher {
    fn new() -> Self {
        Self {
            md5: Md5::new(),
            sha1: Sha1::new(),
        }
    }

    fn update(&mut self, data: &[u8]) {
        self.md5.update(data);
        self.sha1.update(data);
    }

    fn finish(self) -> FileHashes {
        let md5 = self.md5.finalize();
        let sha1 = self.sha1.finalize();
        FileHashes {
            md5: hex::encode(&md5),
            sha1: hex::encode(&sha1),
            sha1_raw: sha1.to_vec(),
        }
    }
}

impl Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

//! Content checksums for duplicate detection and library verification.
//!
//! XXH3-128 over the whole file, streamed in 64 KiB chunks.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use xxhash_rust::xxh3::Xxh3;

const CHUNK_SIZE: usize = 64 * 1024;

/// Hex-encoded checksum of a file's contents
pub fn file_checksum(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    checksum_reader(&mut file)
}

/// Hex-encoded checksum of everything `reader` yields
pub fn checksum_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Xxh3::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:032x}", hasher.digest128()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn same_content_same_checksum() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.jpg");
        let b = temp.path().join("b.jpg");
        File::create(&a).unwrap().write_all(b"photo bytes").unwrap();
        File::create(&b).unwrap().write_all(b"photo bytes").unwrap();

        assert_eq!(file_checksum(&a).unwrap(), file_checksum(&b).unwrap());
    }

    #[test]
    fn different_content_different_checksum() {
        let a = checksum_reader(&mut &b"one"[..]).unwrap();
        let b = checksum_reader(&mut &b"two"[..]).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn streaming_matches_one_shot() {
        let data = vec![7u8; CHUNK_SIZE * 3 + 11];
        let streamed = checksum_reader(&mut &data[..]).unwrap();
        let expected = format!("{:032x}", xxhash_rust::xxh3::xxh3_128(&data));
        assert_eq!(streamed, expected);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(file_checksum(Path::new("/nonexistent/file.jpg")).is_err());
    }
}

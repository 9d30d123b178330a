// Hashing module using BLAKE3

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::constants::HASH_CHUNK_SIZE;
use crate::error::{GeoTagError, Result};

/// Compute full BLAKE3 hash of entire file
pub fn compute_full_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .map_err(|e| GeoTagError::Backup(format!("Failed to open {}: {}", path.display(), e)))?;

    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| GeoTagError::Backup(format!("Failed to read {}: {}", path.display(), e)))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("blake3:full:{}", hasher.finalize().to_hex()))
}

/// Compute full BLAKE3 hash from an in-memory byte slice.
pub fn compute_full_hash_from_bytes(data: &[u8]) -> String {
    format!("blake3:full:{}", blake3::hash(data).to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_and_bytes_hash_agree() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.bin");
        // span more than one read chunk
        let data: Vec<u8> = (0..(HASH_CHUNK_SIZE + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let from_file = compute_full_hash(&path).unwrap();
        assert!(from_file.starts_with("blake3:full:"));
        assert_eq!(from_file, compute_full_hash_from_bytes(&data));
    }

    #[test]
    fn test_different_content_differs() {
        assert_ne!(
            compute_full_hash_from_bytes(b"one"),
            compute_full_hash_from_bytes(b"two")
        );
    }

    #[test]
    fn test_missing_file_is_backup_error() {
        let tmp = TempDir::new().unwrap();
        let result = compute_full_hash(&tmp.path().join("absent"));
        assert!(matches!(result, Err(GeoTagError::Backup(_))));
    }
}

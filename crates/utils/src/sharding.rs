//! Hash-sharded file layout for directory-backed stores

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Hex SHA-256 of a storage key
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Path of `key` under `base_dir` using 256-way sharding on the first hash byte
#[inline]
pub fn sharded_path(base_dir: &Path, key: &str, extension: &str) -> PathBuf {
    let hash = hash_key(key);
    let shard = &hash[..2];
    base_dir.join(shard).join(format!("{hash}.{extension}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sharded_path_is_stable() {
        let base = Path::new("/var/lib/cas/tickets");
        let first = sharded_path(base, "TGT-1-abc", "ticket");
        let second = sharded_path(base, "TGT-1-abc", "ticket");
        assert_eq!(first, second);

        let shard = first.parent().unwrap().file_name().unwrap().to_str().unwrap();
        assert_eq!(shard.len(), 2);
        assert!(first.to_str().unwrap().ends_with(".ticket"));
    }

    #[test]
    fn test_different_keys_hash_differently() {
        assert_ne!(hash_key("ST-1-a"), hash_key("ST-2-a"));
        assert_eq!(hash_key("ST-1-a").len(), 64);
    }
}

// =====================
// キーバリューストア抽象
// =====================
//
// コアはファイルにもネットワークにも直接触らない。
// 永続化はこのインターフェースを実装した協調オブジェクトに委譲され、
// ホスト側が注入する。

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read key {key}: {cause}")]
    Read { key: String, cause: String },
    #[error("failed to write key {key}: {cause}")]
    Write { key: String, cause: String },
    #[error("stored value under {key} could not be decoded: {cause}")]
    Decode { key: String, cause: String },
}

/// 型付き get/set を備えたキーバリューストア。
/// 生のバイト列アクセスだけ実装すれば、型付きアクセスはJSON経由で提供される
pub trait KeyValueStore {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set_raw(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get_raw(key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Decode {
                    key: key.to_string(),
                    cause: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(|e| StoreError::Write {
            key: key.to_string(),
            cause: e.to_string(),
        })?;
        self.set_raw(key, bytes)
    }
}

/// メモリ上のストア実装。テストと、永続化を持たないホスト向け
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set_raw(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod store_tests {
    use super::*;

    #[test]
    fn test_typed_access_round_trip() {
        let mut store = MemoryStore::new();

        store.set("count", &42u32).unwrap();
        assert_eq!(store.get::<u32>("count").unwrap(), Some(42));
        assert_eq!(store.get::<u32>("absent").unwrap(), None);

        store.remove("count").unwrap();
        assert_eq!(store.get::<u32>("count").unwrap(), None);
    }

    #[test]
    fn test_decode_error_carries_key() {
        let mut store = MemoryStore::new();
        store.set_raw("broken", b"not json".to_vec()).unwrap();

        let err = store.get::<u32>("broken").unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
        assert!(err.to_string().contains("broken"));
    }
}

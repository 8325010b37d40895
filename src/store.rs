use anyhow::Result;

/// Key-value persistence behind the trackers. Values are JSON documents kept
/// as text so a corrupt document surfaces as a parse failure at the reader.
pub(crate) trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

pub(crate) fn load_document<T>(store: &dyn KvStore, key: &str) -> Option<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            log::warn!("failed to read {key} from store: {err:#}");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("ignoring unreadable {key} document: {err}");
            None
        }
    }
}

/// Writes a document, logging instead of failing. Callers keep their
/// in-memory state either way.
pub(crate) fn save_document<T>(store: &dyn KvStore, key: &str, value: &T)
where
    T: serde::Serialize + ?Sized,
{
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(err) => {
            log::warn!("failed to serialize {key}: {err}");
            return;
        }
    };

    if let Err(err) = store.set(key, &raw) {
        log::warn!("failed to persist {key}, change kept in memory only: {err:#}");
    }
}

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Scheme prefix of every transient address.
pub const BLOB_PREFIX: &str = "blob:stagehand/";

#[derive(Default)]
struct StoreInner {
    entries: Mutex<HashMap<String, Arc<[u8]>>>,
    next_id: AtomicU64,
}

/// Process-local table of transient byte resources, addressable by URI.
///
/// Entries live exactly as long as the [`ResourceHandle`] that registered them.
/// The store is cheap to clone and can be read from the loader thread.
#[derive(Clone, Default)]
pub struct ResourceStore {
    inner: Arc<StoreInner>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` and return the handle that keeps them addressable.
    pub fn register(&self, bytes: Vec<u8>) -> ResourceHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let digest = Sha256::digest(&bytes);
        let short: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
        let address = format!("{BLOB_PREFIX}{id}-{short}");
        if let Ok(mut entries) = self.inner.entries.lock() {
            entries.insert(address.clone(), Arc::from(bytes));
        }
        ResourceHandle {
            store: self.clone(),
            address,
        }
    }

    pub fn get(&self, address: &str) -> Option<Arc<[u8]>> {
        self.inner
            .entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(address).cloned())
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, address: &str) {
        if let Ok(mut entries) = self.inner.entries.lock() {
            entries.remove(address);
        }
    }
}

/// Owning reference to one registered resource. Dropping it revokes the address.
pub struct ResourceHandle {
    store: ResourceStore,
    address: String,
}

impl ResourceHandle {
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl std::fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ResourceHandle").field(&self.address).finish()
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        self.store.release(&self.address);
        log::debug!("released {}", self.address);
    }
}

/// Bare file name of a path or URI: directories, query and fragment removed,
/// percent escapes decoded.
pub fn base_name(uri: &str) -> String {
    let end = uri.find(['?', '#']).unwrap_or(uri.len());
    let path = &uri[..end];
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    urlencoding::decode(name)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| name.to_string())
}

/// Maps the references a model makes to the transient addresses of the files
/// supplied alongside it.
#[derive(Debug, Clone, Default)]
pub struct UriResolver {
    by_name: HashMap<String, String>,
}

impl UriResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file_name: &str, address: impl Into<String>) {
        self.by_name.insert(base_name(file_name), address.into());
    }

    /// Transient address for a requested URI, or the URI unchanged when no
    /// supplied file carries that name.
    pub fn resolve(&self, uri: &str) -> String {
        if uri.starts_with("data:") || uri.starts_with(BLOB_PREFIX) {
            return uri.to_string();
        }
        match self.by_name.get(&base_name(uri)) {
            Some(address) => {
                log::debug!("resolved {uri} -> {address}");
                address.clone()
            }
            None => {
                log::debug!("passing through unresolved reference {uri}");
                uri.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_drop_releases_bytes() {
        let store = ResourceStore::new();
        let handle = store.register(b"abc".to_vec());
        let address = handle.address().to_string();
        assert!(address.starts_with(BLOB_PREFIX));
        assert_eq!(store.get(&address).as_deref(), Some(&b"abc"[..]));

        drop(handle);
        assert!(store.get(&address).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn identical_bytes_get_distinct_addresses() {
        let store = ResourceStore::new();
        let a = store.register(vec![1, 2, 3]);
        let b = store.register(vec![1, 2, 3]);
        assert_ne!(a.address(), b.address());
        drop(a);
        assert!(store.get(b.address()).is_some());
    }

    #[test]
    fn base_name_strips_path_query_and_fragment() {
        assert_eq!(base_name("scene.bin"), "scene.bin");
        assert_eq!(base_name("./buffers/scene.bin?v=2#frag"), "scene.bin");
        assert_eq!(base_name("https://cdn.test/a/b/tex.png"), "tex.png");
        assert_eq!(base_name("textures\\wood.jpg"), "wood.jpg");
        assert_eq!(base_name("my%20model.bin"), "my model.bin");
    }

    #[test]
    fn resolver_redirects_matching_names_only() {
        let mut resolver = UriResolver::new();
        resolver.insert("scene.bin", "blob:stagehand/0-aa");
        assert_eq!(resolver.resolve("scene.bin"), "blob:stagehand/0-aa");
        assert_eq!(resolver.resolve("sub/dir/scene.bin?x=1"), "blob:stagehand/0-aa");
        assert_eq!(
            resolver.resolve("https://cdn.test/other.bin"),
            "https://cdn.test/other.bin"
        );
        assert_eq!(resolver.resolve("data:,abc"), "data:,abc");
    }
}

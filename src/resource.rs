// resource.rs - In-memory registry for compressed preview bytes

use crate::compression::OutputFormat;
use crate::error::{ZipperError, ZipperResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Opaque handle to bytes held by a `ResourceRegistry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blob:image-zipper/{}", self.0)
    }
}

/// A registered compressed preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedResource {
    pub id: ResourceId,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub byte_len: usize,
}

/// In-memory blob store. Handles stay valid until revoked and ids are never
/// handed out twice.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    blobs: HashMap<ResourceId, Arc<[u8]>>,
    next_id: u64,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, bytes: Vec<u8>) -> ResourceId {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        debug!("Registered {} ({} bytes)", id, bytes.len());
        self.blobs.insert(id, Arc::from(bytes));
        id
    }

    pub fn fetch(&self, id: ResourceId) -> ZipperResult<Arc<[u8]>> {
        self.blobs
            .get(&id)
            .cloned()
            .ok_or_else(|| ZipperError::export(format!("{} has been released", id)))
    }

    /// Releases the bytes behind `id`. Returns false if nothing was held.
    pub fn revoke(&mut self, id: ResourceId) -> bool {
        let released = self.blobs.remove(&id).is_some();
        if released {
            debug!("Revoked {}", id);
        }
        released
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_fetch() {
        let mut registry = ResourceRegistry::new();
        let id = registry.register(vec![1, 2, 3]);

        assert_eq!(&*registry.fetch(id).unwrap(), &[1, 2, 3]);
        assert_eq!(registry.len(), 1);
        assert_eq!(id.to_string(), "blob:image-zipper/0");
    }

    #[test]
    fn test_revoked_handle_cannot_be_fetched() {
        let mut registry = ResourceRegistry::new();
        let id = registry.register(vec![9; 16]);

        assert!(registry.revoke(id));
        assert!(!registry.revoke(id));
        assert!(matches!(registry.fetch(id), Err(ZipperError::ExportFailure(_))));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut registry = ResourceRegistry::new();
        let first = registry.register(vec![1]);
        registry.revoke(first);
        let second = registry.register(vec![1]);

        assert_ne!(first, second);
    }
}

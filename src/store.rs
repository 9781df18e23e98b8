// store.rs - Ordered list of accepted image files

use crate::error::{ZipperError, ZipperResult};
use std::fmt;
use std::sync::Arc;

/// Store-assigned identifier, never reused while the store lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

/// An accepted file waiting in the list.
#[derive(Clone)]
pub struct ImageEntry {
    pub id: EntryId,
    pub display_name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

impl fmt::Debug for ImageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageEntry")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Insertion-ordered list of accepted files. Duplicate names are allowed.
#[derive(Debug, Default)]
pub struct FileList {
    entries: Vec<ImageEntry>,
    next_id: u64,
}

impl FileList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends files in the given order and returns how many were added.
    pub fn append<I>(&mut self, files: I) -> usize
    where
        I: IntoIterator<Item = (String, String, Arc<[u8]>)>,
    {
        let before = self.entries.len();
        for (display_name, mime, bytes) in files {
            let id = EntryId(self.next_id);
            self.next_id += 1;
            self.entries.push(ImageEntry {
                id,
                display_name,
                mime,
                bytes,
            });
        }
        self.entries.len() - before
    }

    pub fn remove_at(&mut self, index: usize) -> ZipperResult<ImageEntry> {
        if index >= self.entries.len() {
            return Err(ZipperError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    pub fn get(&self, index: usize) -> ZipperResult<&ImageEntry> {
        self.entries.get(index).ok_or(ZipperError::IndexOutOfRange {
            index,
            len: self.entries.len(),
        })
    }

    pub fn list_all(&self) -> &[ImageEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> (String, String, Arc<[u8]>) {
        (name.to_string(), "image/png".to_string(), Arc::from(vec![1u8, 2, 3]))
    }

    fn names(list: &FileList) -> Vec<&str> {
        list.list_all()
            .iter()
            .map(|e| e.display_name.as_str())
            .collect()
    }

    #[test]
    fn test_append_keeps_order_and_duplicates() {
        let mut list = FileList::new();
        assert_eq!(list.append(vec![file("a.png"), file("b.png")]), 2);
        assert_eq!(list.append(vec![file("a.png")]), 1);

        assert_eq!(names(&list), vec!["a.png", "b.png", "a.png"]);
        assert_ne!(list.list_all()[0].id, list.list_all()[2].id);
    }

    #[test]
    fn test_remove_at_preserves_relative_order() {
        let mut list = FileList::new();
        list.append(vec![file("a.png"), file("b.png"), file("c.png"), file("d.png")]);

        let removed = list.remove_at(1).unwrap();

        assert_eq!(removed.display_name, "b.png");
        assert_eq!(list.len(), 3);
        assert_eq!(names(&list), vec!["a.png", "c.png", "d.png"]);
    }

    #[test]
    fn test_remove_at_out_of_range_does_not_mutate() {
        let mut list = FileList::new();
        list.append(vec![file("a.png"), file("b.png")]);

        let err = list.remove_at(2).unwrap_err();

        assert_eq!(err, ZipperError::IndexOutOfRange { index: 2, len: 2 });
        assert_eq!(names(&list), vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_ids_are_not_reused_after_clear() {
        let mut list = FileList::new();
        list.append(vec![file("a.png")]);
        let first = list.list_all()[0].id;

        list.clear();
        assert!(list.is_empty());

        list.append(vec![file("a.png")]);
        assert_ne!(list.get(0).unwrap().id, first);
    }
}

//! Property tests shared by every storage backend.

use proptest::prelude::*;
use shelfdb_storage::{FileBackend, InMemoryBackend, StorageBackend};

fn check_offsets(backend: &mut dyn StorageBackend, chunks: &[Vec<u8>]) {
    let mut expected_offset = 0u64;
    let mut placed = Vec::new();

    for chunk in chunks {
        let offset = backend.append(chunk).unwrap();
        assert_eq!(offset, expected_offset);
        expected_offset += chunk.len() as u64;
        placed.push((offset, chunk));
    }

    assert_eq!(backend.size().unwrap(), expected_offset);
    for (offset, chunk) in placed {
        assert_eq!(&backend.read_at(offset, chunk.len()).unwrap(), chunk);
    }
}

proptest! {
    #[test]
    fn memory_appends_are_readable_at_returned_offsets(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16)
    ) {
        let mut backend = InMemoryBackend::new();
        check_offsets(&mut backend, &chunks);
    }

    #[test]
    fn file_appends_are_readable_at_returned_offsets(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..8)
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("prop.db")).unwrap();
        check_offsets(&mut backend, &chunks);
    }
}

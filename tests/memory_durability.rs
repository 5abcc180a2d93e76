//! Memory-layer durability: a stored memory survives a snapshot and
//! restart with identical content and metadata, and a forgotten memory
//! stays forgotten across a restart instead of resurrecting.

use memora::{Confidence, Importance, Memora, MemoryType, StoreOptions};
use tempfile::tempdir;

#[test]
fn stored_memory_survives_snapshot_and_restart() {
    let dir = tempdir().unwrap();
    let id;
    {
        let mut db = Memora::open(dir.path()).unwrap();
        id = db
            .store_memory(
                MemoryType::Preference,
                "User prefers concise answers",
                StoreOptions {
                    confidence: Confidence::High,
                    importance: Importance::High,
                    ..Default::default()
                },
            )
            .unwrap();
        db.create_snapshot().unwrap();
    }

    let db = Memora::open(dir.path()).unwrap();
    let memory = db.get_memory(id).expect("memory restored after restart");
    assert_eq!(memory.content.as_deref(), Some("User prefers concise answers"));
    assert_eq!(memory.memory_type, MemoryType::Preference);
    assert_eq!(memory.confidence, Confidence::High);
    assert_eq!(memory.importance, Importance::High);
    assert!(memory.embedding.as_ref().is_some_and(|e| !e.is_empty()));
}

#[test]
fn forgotten_memory_stays_forgotten_after_restart() {
    let dir = tempdir().unwrap();
    let id;
    {
        let mut db = Memora::open(dir.path()).unwrap();
        id = db
            .store_memory(MemoryType::Fact, "X", StoreOptions::default())
            .unwrap();
        db.forget_memory(id).unwrap();
    }

    let db = Memora::open(dir.path()).unwrap();
    let memory = db.get_memory(id).expect("node survives, only content is gone");
    assert_eq!(memory.content, None);
}

#[test]
fn forget_is_durable_even_without_an_intervening_snapshot() {
    let dir = tempdir().unwrap();
    let id;
    {
        let mut db = Memora::open(dir.path()).unwrap();
        id = db
            .store_memory(MemoryType::Experience, "ephemeral", StoreOptions::default())
            .unwrap();
        db.create_snapshot().unwrap();
        db.forget_memory(id).unwrap();
        // No snapshot here: forgetting must survive via the log alone.
    }

    let db = Memora::open(dir.path()).unwrap();
    assert_eq!(db.get_memory(id).unwrap().content, None);
}

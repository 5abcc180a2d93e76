//! Append-log crash recovery: a corrupted tail frame is silently dropped,
//! never surfaced as an error, and never lets interior corruption slide.

use memora::{Memora, Node, NodeId};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use tempfile::tempdir;

fn log_path(dir: &std::path::Path) -> std::path::PathBuf {
    dir.join("memora.log")
}

fn flip_last_byte(path: &std::path::Path) {
    let mut file = OpenOptions::new().read(true).write(true).open(path).unwrap();
    let len = file.metadata().unwrap().len();
    assert!(len > 0);
    file.seek(SeekFrom::End(-1)).unwrap();
    let mut last = [0u8; 1];
    std::io::Read::read_exact(&mut file, &mut last).unwrap();
    file.seek(SeekFrom::End(-1)).unwrap();
    file.write_all(&[last[0] ^ 0xFF]).unwrap();
}

#[test]
fn tail_crc_corruption_truncates_to_the_last_good_entry() {
    let dir = tempdir().unwrap();
    {
        let mut db = Memora::open(dir.path()).unwrap();
        for i in 1..=10u64 {
            db.insert_node(Node::with_text_label(NodeId::new(i), "x")).unwrap();
        }
    }

    // The CRC of the tag/seq/CRC bytes at the very end of the file belongs
    // to the 10th frame; flipping it corrupts only that frame's checksum.
    flip_last_byte(&log_path(dir.path()));

    let db = Memora::open(dir.path()).unwrap();
    let stats = db.get_stats();
    assert_eq!(stats.node_count, 9);
    assert!(db.get_node(NodeId::new(10)).is_none());
    for i in 1..=9u64 {
        assert!(db.get_node(NodeId::new(i)).is_some());
    }
}

#[test]
fn interior_crc_corruption_is_fatal() {
    let dir = tempdir().unwrap();
    {
        let mut db = Memora::open(dir.path()).unwrap();
        for i in 1..=10u64 {
            db.insert_node(Node::with_text_label(NodeId::new(i), "x")).unwrap();
        }
    }

    // Fixed-size node frames: 13-byte log header, then each frame is
    // length(4)+kind(1)+seq(8)+payload(40)+crc(4) = 57 bytes. Flip a byte
    // inside the 2nd frame's payload so frames 3-10 still decode cleanly.
    const LOG_HEADER_BYTES: u64 = 13;
    const FRAME_BYTES: u64 = 57;
    const FRAME_HEADER_BYTES: u64 = 13; // length + kind + seq, before the payload
    let target = LOG_HEADER_BYTES + FRAME_BYTES + FRAME_HEADER_BYTES + 5;

    let path = log_path(dir.path());
    let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(target)).unwrap();
    let mut byte = [0u8; 1];
    std::io::Read::read_exact(&mut file, &mut byte).unwrap();
    file.seek(SeekFrom::Start(target)).unwrap();
    file.write_all(&[byte[0] ^ 0xFF]).unwrap();

    let err = Memora::open(dir.path()).unwrap_err();
    assert!(matches!(err, memora::MemoraError::Corruption(_)));
}

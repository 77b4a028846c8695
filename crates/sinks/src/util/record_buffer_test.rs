//! Tests for the record buffer

use super::*;
use std::sync::Arc;
use std::thread;

fn texts(records: &[LogRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| String::from_utf8(r.as_bytes().to_vec()).unwrap())
        .collect()
}

// ============================================================================
// LogRecord Tests
// ============================================================================

#[test]
fn test_record_conversions() {
    assert_eq!(LogRecord::from("abc").as_bytes(), b"abc");
    assert_eq!(LogRecord::from(String::from("abc")).len(), 3);
    assert_eq!(LogRecord::from(vec![1u8, 2]).as_bytes(), &[1, 2]);
    assert!(LogRecord::new(Bytes::new()).is_empty());
}

// ============================================================================
// RecordBuffer Tests
// ============================================================================

#[test]
fn test_new_buffer_is_empty() {
    let buffer = RecordBuffer::new();
    assert!(buffer.is_empty());
    assert_eq!(buffer.len(), 0);
    assert_eq!(buffer.pending_bytes(), 0);
    assert!(buffer.drain().is_empty());
}

#[test]
fn test_append_preserves_order() {
    let buffer = RecordBuffer::new();
    buffer.append("one\n".into());
    buffer.append("two\n".into());
    buffer.append("three\n".into());

    assert_eq!(buffer.len(), 3);
    assert_eq!(buffer.pending_bytes(), 14);
    assert_eq!(texts(&buffer.drain()), ["one\n", "two\n", "three\n"]);
}

#[test]
fn test_drain_clears() {
    let buffer = RecordBuffer::new();
    buffer.append("a".into());

    assert_eq!(buffer.drain().len(), 1);
    assert!(buffer.is_empty());
    assert_eq!(buffer.pending_bytes(), 0);
}

#[test]
fn test_restore_goes_before_new_records() {
    let buffer = RecordBuffer::new();
    buffer.append("a".into());
    buffer.append("b".into());

    let drained = buffer.drain();
    buffer.append("c".into());
    buffer.restore(drained);

    assert_eq!(buffer.pending_bytes(), 3);
    assert_eq!(texts(&buffer.drain()), ["a", "b", "c"]);
}

#[test]
fn test_restore_partial_tail() {
    let buffer = RecordBuffer::new();
    for s in ["a", "b", "c", "d"] {
        buffer.append(s.into());
    }

    let drained = buffer.drain();
    // First two were persisted
    buffer.restore(drained[2..].to_vec());

    assert_eq!(texts(&buffer.drain()), ["c", "d"]);
}

#[test]
fn test_restore_empty_is_noop() {
    let buffer = RecordBuffer::new();
    buffer.append("x".into());
    buffer.restore(Vec::new());
    assert_eq!(buffer.len(), 1);
}

#[test]
fn test_concurrent_appends_all_kept() {
    let buffer = Arc::new(RecordBuffer::new());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for i in 0..250 {
                    buffer.append(format!("{t}-{i}\n").into());
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(buffer.len(), 1000);
}

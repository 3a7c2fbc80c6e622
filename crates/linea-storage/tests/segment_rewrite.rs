//! End-to-end scenarios for the segmented store: overflow chaining,
//! neighbor-aware rewrites, and chain flattening.

use std::collections::BTreeMap;

use bytes::Bytes;
use linea_common::constants::PAGE_SIZE;
use linea_common::types::{extract_head64, Key};
use linea_common::StorageOptions;
use linea_storage::page::Page;
use linea_storage::segment::Record;
use linea_storage::SegmentManager;

fn value(text: &str) -> Bytes {
    Bytes::copy_from_slice(text.as_bytes())
}

fn segment_options() -> StorageOptions {
    let mut options = StorageOptions::for_testing();
    options.records_per_page_goal = 10;
    options.records_per_page_delta = 2;
    options
}

/// Quadratic key spacing defeats a single line fit across windows, so the
/// builder emits a run of small segments - exactly what these scenarios
/// need to exercise neighbor selection.
fn quadratic_dataset(n: u64) -> Vec<Record> {
    (0..n).map(|i| (i * i + 7, value(&format!("d{i}")))).collect()
}

fn loaded_manager(records: &[Record]) -> SegmentManager {
    let manager = SegmentManager::open("unused", segment_options()).unwrap();
    manager.bulk_load(records).unwrap();
    manager
}

/// Verifies index/storage agreement: every index entry points at an
/// initialized, checksummed page whose boundary matches the base key.
fn check_index_storage_agreement(manager: &SegmentManager) {
    let mut buf = vec![0u8; PAGE_SIZE];
    for (base, info) in manager.index().snapshot() {
        manager.read_page(info.id(), 0, &mut buf).unwrap();
        let page = Page::new(&buf);
        assert!(page.is_initialized(), "base {base}");
        assert_ne!(page.checksum(), 0, "base {base}");
        assert!(page.verify_checksum(), "base {base}");
        assert_eq!(extract_head64(page.lower_boundary()), base);
    }
}

#[test]
fn rewrite_consumes_overflowing_neighbors() {
    let records = quadratic_dataset(500);
    let manager = loaded_manager(&records);
    let bases: Vec<Key> = manager.index().snapshot().iter().map(|(b, _)| *b).collect();
    assert!(bases.len() >= 6, "dataset must span several segments");

    // Attach overflows to three consecutive segments in the middle.
    let target_bases = [bases[2], bases[3], bases[4]];
    let mut expected: BTreeMap<Key, Bytes> =
        records.iter().map(|(k, v)| (*k, v.clone())).collect();
    let mut old_ids = Vec::new();
    for (idx, base) in target_bases.iter().enumerate() {
        let overflow_key = base + 1;
        assert!(!expected.contains_key(&overflow_key));
        let overflow_value = value(&format!("ov{idx}"));
        let overflow_id = manager
            .chain_overflow(*base, 0, &[(overflow_key, overflow_value.clone())])
            .unwrap();
        expected.insert(overflow_key, overflow_value);
        old_ids.push(manager.index().get(*base).unwrap().id());
        old_ids.push(overflow_id);
        assert!(manager.index().get(*base).unwrap().has_overflow());
    }

    // An in-memory batch: one fresh key, one superseding a disk record.
    let fresh_key = target_bases[1] + 2;
    let superseded_key = *expected
        .range(target_bases[1]..target_bases[2])
        .nth(2)
        .unwrap()
        .0;
    let batch: Vec<Record> = {
        let mut batch = vec![
            (fresh_key, value("fresh")),
            (superseded_key, value("superseding")),
        ];
        batch.sort_by_key(|(k, _)| *k);
        batch
    };
    expected.insert(fresh_key, value("fresh"));
    expected.insert(superseded_key, value("superseding"));

    manager.rewrite_segments(target_bases[1], &batch).unwrap();

    // Old segments and overflows were invalidated into the free list.
    for id in &old_ids {
        assert!(manager.free_list().contains(*id), "id {id} not freed");
    }
    // Rewritten entries carry new ids and no overflow bits.
    for base in &target_bases {
        if let Some(info) = manager.index().get(*base) {
            assert!(!old_ids.contains(&info.id()));
            assert!(!info.has_overflow());
        }
    }
    // Untouched neighbors kept their entries.
    assert!(manager.index().get(bases[1]).is_some());
    assert!(manager.index().get(bases[5]).is_some());

    // No key loss, newest wins on the collision.
    for (k, v) in &expected {
        assert_eq!(manager.get(*k).unwrap().as_ref(), Some(v), "key {k}");
    }
    check_index_storage_agreement(&manager);
}

#[test]
fn rewrite_without_neighbors_touches_one_segment() {
    let records = quadratic_dataset(300);
    let mut options = segment_options();
    options.consider_neighbors_during_rewrite = false;
    let manager = SegmentManager::open("unused", options).unwrap();
    manager.bulk_load(&records).unwrap();

    let bases: Vec<Key> = manager.index().snapshot().iter().map(|(b, _)| *b).collect();
    let target = bases[1];
    manager.chain_overflow(target, 0, &[(target + 1, value("ov"))]).unwrap();
    let neighbor_id = manager.index().get(bases[2]).unwrap().id();

    manager.rewrite_segments(target, &[]).unwrap();

    // The neighbor was left alone even though rewrites were available.
    assert_eq!(manager.index().get(bases[2]).unwrap().id(), neighbor_id);
    assert_eq!(manager.get(target + 1).unwrap(), Some(value("ov")));
    for (k, v) in &records {
        assert_eq!(manager.get(*k).unwrap().as_ref(), Some(v), "key {k}");
    }
}

#[test]
fn flatten_chain_merges_disk_overflow_and_batch() {
    let records = quadratic_dataset(200);
    let manager = loaded_manager(&records);
    let snapshot = manager.index().snapshot();

    // Flatten applies to one-page segments; pick one with a successor.
    let base = snapshot
        .iter()
        .find(|(base, info)| {
            info.page_count() == 1 && manager.index().next_base_after(*base).is_some()
        })
        .map(|(base, _)| *base)
        .expect("dataset yields one-page segments");
    let upper = manager.index().next_base_after(base).unwrap();
    let disk_keys: Vec<Key> = records
        .iter()
        .map(|(k, _)| *k)
        .filter(|k| (base..upper).contains(k))
        .collect();

    // Overflow holds one record; the batch updates it and adds another.
    let overflow_key = base + 1;
    let main_id = manager.index().get(base).unwrap().id();
    let overflow_id = manager
        .chain_overflow(base, 0, &[(overflow_key, value("v-old"))])
        .unwrap();

    let batch_key = base + 2;
    let mut batch = vec![
        (overflow_key, value("v-new")),
        (batch_key, value("v-batch")),
    ];
    batch.sort_by_key(|(k, _)| *k);

    manager.flatten_chain(base, &batch).unwrap();

    // Merged contents: disk records + overflow (superseded) + batch.
    assert_eq!(manager.get(overflow_key).unwrap(), Some(value("v-new")));
    assert_eq!(manager.get(batch_key).unwrap(), Some(value("v-batch")));
    for k in &disk_keys {
        assert!(manager.get(*k).unwrap().is_some(), "key {k}");
    }

    // Old main and overflow pages were zeroed and freed.
    for id in [main_id, overflow_id] {
        assert!(manager.free_list().contains(id));
        let mut buf = vec![0u8; PAGE_SIZE];
        manager.read_page(id, 0, &mut buf).unwrap();
        assert!(buf.iter().all(|b| *b == 0), "old page {id} not zeroed");
    }

    // The index no longer references the invalidated segment.
    let info = manager.index().get(base).unwrap();
    assert_ne!(info.id(), main_id);
    assert!(!info.has_overflow());
    check_index_storage_agreement(&manager);
}

#[test]
fn rewrite_spanning_every_segment_preserves_the_store() {
    // Every segment gets an overflow, so neighbor expansion pulls the whole
    // store - multi-page segments included - through the sliding window in
    // one rewrite.
    let records = quadratic_dataset(500);
    let manager = loaded_manager(&records);
    let snapshot = manager.index().snapshot();
    assert!(snapshot.len() >= 3);

    let mut expected: BTreeMap<Key, Bytes> =
        records.iter().map(|(k, v)| (*k, v.clone())).collect();
    let mut old_ids = Vec::new();
    for (idx, (base, info)) in snapshot.iter().enumerate() {
        let overflow_value = value(&format!("w{idx}"));
        let overflow_id = manager
            .chain_overflow(*base, 0, &[(base + 1, overflow_value.clone())])
            .unwrap();
        expected.insert(base + 1, overflow_value);
        old_ids.push(info.id());
        old_ids.push(overflow_id);
    }

    let middle = snapshot[snapshot.len() / 2].0;
    manager.rewrite_segments(middle, &[]).unwrap();

    for id in &old_ids {
        assert!(manager.free_list().contains(*id), "id {id} not freed");
    }
    for (k, v) in &expected {
        assert_eq!(manager.get(*k).unwrap().as_ref(), Some(v), "key {k}");
    }
    // No segment in the rewritten store carries an overflow any more.
    for (_, info) in manager.index().snapshot() {
        assert!(!info.has_overflow());
    }
    check_index_storage_agreement(&manager);
}

#[test]
fn freed_segments_are_reused_by_later_writes() {
    let records = quadratic_dataset(200);
    let manager = loaded_manager(&records);
    let one_page: Vec<Key> = manager
        .index()
        .snapshot()
        .iter()
        .filter(|(_, info)| info.page_count() == 1)
        .map(|(base, _)| *base)
        .collect();
    assert!(one_page.len() >= 2);

    let base = one_page[0];
    manager.chain_overflow(base, 0, &[(base + 1, value("ov"))]).unwrap();
    manager.flatten_chain(base, &[]).unwrap();
    let freed = manager.free_list().len();
    assert!(freed >= 2);

    // The next flatten acquires ids from the free list.
    let next = one_page[1];
    manager.chain_overflow(next, 0, &[(next + 1, value("ov2"))]).unwrap();
    manager.flatten_chain(next, &[]).unwrap();
    assert!(manager.free_list().len() <= freed + 2);
    for (k, v) in &records {
        assert_eq!(manager.get(*k).unwrap().as_ref(), Some(v), "key {k}");
    }
}

/*!
 * Indexer Tests
 * Aggregation, upward propagation, partial failure, deletion cascade
 */

use proptest::prelude::*;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use fileharbor::{
    Indexer, ManualClock, MetadataCache, PathRegistry, PermissionSet, Role, Store, UserStore,
};

fn fixture(root: &Path) -> (Indexer, ManualClock) {
    let store = Store::in_memory().unwrap();
    let users = UserStore::new(store.clone());
    users
        .create("alice", Role::User, PermissionSet::empty())
        .unwrap();
    let registry = PathRegistry::new(store.clone());
    registry
        .set_path("alice", "/alice", &root.to_string_lossy())
        .unwrap();

    let clock = ManualClock::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000));
    let cache = MetadataCache::new(store, Arc::new(clock.clone()));
    (Indexer::new(cache, registry), clock)
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// root/{a.txt: 3, b.txt: 5, sub/{c.txt: 7, deep/{d.txt: 11}}}
fn build_tree(root: &Path) {
    fs::write(root.join("a.txt"), b"abc").unwrap();
    fs::write(root.join("b.txt"), b"hello").unwrap();
    let deep = root.join("sub/deep");
    fs::create_dir_all(&deep).unwrap();
    fs::write(root.join("sub/c.txt"), b"1234567").unwrap();
    fs::write(deep.join("d.txt"), b"0123456789a").unwrap();
}

#[test]
fn test_aggregation_correctness() {
    let temp = TempDir::new().unwrap();
    build_tree(temp.path());
    let (indexer, _) = fixture(temp.path());

    let total = indexer.index_entry(temp.path(), "/alice", None);
    assert_eq!(total, 26);

    let cache = indexer.cache();
    assert_eq!(cache.get(&key(temp.path())).unwrap().unwrap().size, 26);
    assert_eq!(
        cache.get(&key(&temp.path().join("sub"))).unwrap().unwrap().size,
        18
    );
    assert_eq!(
        cache
            .get(&key(&temp.path().join("sub/deep")))
            .unwrap()
            .unwrap()
            .size,
        11
    );
    assert_eq!(
        cache.get(&key(&temp.path().join("a.txt"))).unwrap().unwrap().size,
        3
    );
}

#[test]
fn test_indexing_is_idempotent() {
    let temp = TempDir::new().unwrap();
    build_tree(temp.path());
    let (indexer, clock) = fixture(temp.path());

    let first = indexer.index_entry(temp.path(), "/alice", None);
    let stamp_before = indexer
        .cache()
        .get(&key(temp.path()))
        .unwrap()
        .unwrap()
        .last_indexed;

    clock.advance(Duration::from_secs(600));
    let second = indexer.index_entry(temp.path(), "/alice", None);

    assert_eq!(first, second);
    let record = indexer.cache().get(&key(temp.path())).unwrap().unwrap();
    assert_eq!(record.size, first);
    assert!(record.last_indexed > stamp_before);
}

#[test]
fn test_upward_propagation_after_file_change() {
    let temp = TempDir::new().unwrap();
    build_tree(temp.path());
    let (indexer, _) = fixture(temp.path());
    indexer.index_entry(temp.path(), "/alice", None);

    // Grow the deepest file from 11 to 100 bytes
    let target = temp.path().join("sub/deep/d.txt");
    fs::write(&target, vec![b'x'; 100]).unwrap();
    indexer
        .update_metadata(&target, "/alice/sub/deep/d.txt")
        .unwrap();

    let cache = indexer.cache();
    assert_eq!(
        cache
            .get(&key(&temp.path().join("sub/deep")))
            .unwrap()
            .unwrap()
            .size,
        100
    );
    assert_eq!(
        cache.get(&key(&temp.path().join("sub"))).unwrap().unwrap().size,
        107
    );
    assert_eq!(cache.get(&key(temp.path())).unwrap().unwrap().size, 115);

    // Each ancestor equals the sum of its own children's cached sizes
    assert_eq!(
        cache.sum_child_sizes(&key(&temp.path().join("sub"))).unwrap(),
        107
    );
    assert_eq!(cache.sum_child_sizes(&key(temp.path())).unwrap(), 115);
}

#[cfg(unix)]
#[test]
fn test_partial_failure_contributes_zero() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("first.txt"), b"1234").unwrap();
    // A dangling symlink makes the stat of the second entry fail
    std::os::unix::fs::symlink("/nonexistent-target", temp.path().join("second.txt")).unwrap();
    fs::write(temp.path().join("third.txt"), b"123456").unwrap();

    let (indexer, _) = fixture(temp.path());
    let total = indexer.index_entry(temp.path(), "/alice", None);
    assert_eq!(total, 10);

    let cache = indexer.cache();
    assert!(cache.get(&key(&temp.path().join("first.txt"))).unwrap().is_some());
    assert!(cache.get(&key(&temp.path().join("third.txt"))).unwrap().is_some());
    assert!(cache.get(&key(&temp.path().join("second.txt"))).unwrap().is_none());
    assert_eq!(cache.get(&key(temp.path())).unwrap().unwrap().size, 10);
}

#[test]
fn test_delete_metadata_cascades_and_recomputes() {
    let temp = TempDir::new().unwrap();
    build_tree(temp.path());
    let (indexer, _) = fixture(temp.path());
    indexer.index_entry(temp.path(), "/alice", None);

    let sub = temp.path().join("sub");
    indexer.delete_metadata(&sub).unwrap();

    let cache = indexer.cache();
    assert!(cache.get(&key(&sub)).unwrap().is_none());
    assert!(cache.get(&key(&sub.join("c.txt"))).unwrap().is_none());
    assert!(cache.get(&key(&sub.join("deep/d.txt"))).unwrap().is_none());
    assert!(cache.get(&key(&temp.path().join("a.txt"))).unwrap().is_some());

    // The parent's aggregate now reflects only the remaining children
    assert_eq!(cache.get(&key(temp.path())).unwrap().unwrap().size, 8);
}

#[test]
fn test_missing_path_contributes_zero_and_no_row() {
    let temp = TempDir::new().unwrap();
    let (indexer, _) = fixture(temp.path());

    let ghost = temp.path().join("ghost.txt");
    let total = indexer.index_entry(&ghost, "/alice/ghost.txt", None);
    assert_eq!(total, 0);
    assert!(indexer.cache().get(&key(&ghost)).unwrap().is_none());
}

#[test]
fn test_sweep_indexes_every_registered_root() {
    let temp = TempDir::new().unwrap();
    let alice_root = temp.path().join("alice");
    let bob_root = temp.path().join("bob");
    fs::create_dir_all(&alice_root).unwrap();
    fs::create_dir_all(&bob_root).unwrap();
    fs::write(alice_root.join("a.txt"), b"aa").unwrap();
    fs::write(bob_root.join("b.txt"), b"bbb").unwrap();

    let store = Store::in_memory().unwrap();
    let users = UserStore::new(store.clone());
    users
        .create("alice", Role::User, PermissionSet::empty())
        .unwrap();
    users
        .create("bob", Role::User, PermissionSet::empty())
        .unwrap();
    let registry = PathRegistry::new(store.clone());
    registry
        .set_path("alice", "/alice", &alice_root.to_string_lossy())
        .unwrap();
    registry
        .set_path("bob", "/bob", &bob_root.to_string_lossy())
        .unwrap();

    let clock = ManualClock::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000));
    let indexer = Indexer::new(
        MetadataCache::new(store, Arc::new(clock)),
        registry,
    );

    assert!(indexer.index_all_roots().unwrap());
    assert_eq!(indexer.cache().get(&key(&alice_root)).unwrap().unwrap().size, 2);
    assert_eq!(indexer.cache().get(&key(&bob_root)).unwrap().unwrap().size, 3);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_directory_size_equals_recursive_sum(
        root_sizes in proptest::collection::vec(0usize..2048, 0..6),
        sub_sizes in proptest::collection::vec(0usize..2048, 0..6),
    ) {
        let temp = TempDir::new().unwrap();
        for (i, size) in root_sizes.iter().enumerate() {
            fs::write(temp.path().join(format!("f{i}.bin")), vec![0u8; *size]).unwrap();
        }
        let sub = temp.path().join("sub");
        fs::create_dir_all(&sub).unwrap();
        for (i, size) in sub_sizes.iter().enumerate() {
            fs::write(sub.join(format!("g{i}.bin")), vec![0u8; *size]).unwrap();
        }

        let (indexer, _) = fixture(temp.path());
        let expected: usize = root_sizes.iter().sum::<usize>() + sub_sizes.iter().sum::<usize>();
        let total = indexer.index_entry(temp.path(), "/alice", None);
        prop_assert_eq!(total, expected as u64);

        let sub_expected: usize = sub_sizes.iter().sum();
        let record = indexer.cache().get(&sub.to_string_lossy()).unwrap().unwrap();
        prop_assert_eq!(record.size, sub_expected as u64);
    }
}

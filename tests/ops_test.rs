/*!
 * File Operation Tests
 * Mutations, conflicts, permission checks, metadata consistency
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use fileharbor::{
    CoreError, FileOps, Identity, Indexer, ManualClock, MetadataCache, PathRegistry, PathResolver,
    Permission, PermissionSet, Role, Store, UserStore,
};

struct Fixture {
    _temp: TempDir,
    ops: FileOps,
    indexer: Indexer,
    alice_home: PathBuf,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let store = Store::in_memory().unwrap();
    let users = UserStore::new(store.clone());
    let registry = PathRegistry::new(store.clone());

    let alice_home = temp.path().join("alice");
    fs::create_dir_all(&alice_home).unwrap();

    users
        .create("alice", Role::User, PermissionSet::all())
        .unwrap();
    users
        .create(
            "bob",
            Role::User,
            PermissionSet::from_iter([Permission::Read]),
        )
        .unwrap();
    registry
        .set_path("alice", "/alice", &alice_home.to_string_lossy())
        .unwrap();
    registry
        .set_path("bob", "/bob", &temp.path().join("bob").to_string_lossy())
        .unwrap();

    let clock = ManualClock::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000));
    let cache = MetadataCache::new(store, Arc::new(clock));
    let indexer = Indexer::new(cache, registry.clone());
    let ops = FileOps::new(PathResolver::new(registry), indexer.clone(), users);

    Fixture {
        _temp: temp,
        ops,
        indexer,
        alice_home,
    }
}

fn alice() -> Identity {
    Identity::new(1, "alice", Role::User)
}

fn bob() -> Identity {
    Identity::new(2, "bob", Role::User)
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn test_touch_creates_file_and_metadata() {
    let fx = fixture();
    let created = fx.ops.touch(&alice(), "/alice", "notes.txt").unwrap();
    assert_eq!(created, "/alice/notes.txt");

    let physical = fx.alice_home.join("notes.txt");
    assert!(physical.is_file());

    let record = fx.indexer.cache().get(&key(&physical)).unwrap().unwrap();
    assert_eq!(record.size, 0);
    assert!(!record.is_directory);
}

#[test]
fn test_touch_conflict() {
    let fx = fixture();
    fx.ops.touch(&alice(), "/alice", "notes.txt").unwrap();
    let err = fx.ops.touch(&alice(), "/alice", "notes.txt").unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[test]
fn test_mkdir_creates_directory() {
    let fx = fixture();
    let created = fx.ops.mkdir(&alice(), "/alice", "photos").unwrap();
    assert_eq!(created, "/alice/photos");
    assert!(fx.alice_home.join("photos").is_dir());

    let err = fx.ops.mkdir(&alice(), "/alice", "photos").unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[test]
fn test_rename_moves_entry_and_metadata() {
    let fx = fixture();
    fs::write(fx.alice_home.join("draft.txt"), b"hello").unwrap();
    fx.indexer.index_entry(&fx.alice_home, "/alice", None);

    let renamed = fx
        .ops
        .rename(&alice(), "/alice/draft.txt", "final.txt")
        .unwrap();
    assert_eq!(renamed, "/alice/final.txt");
    assert!(!fx.alice_home.join("draft.txt").exists());
    assert!(fx.alice_home.join("final.txt").is_file());

    let cache = fx.indexer.cache();
    assert!(cache.get(&key(&fx.alice_home.join("draft.txt"))).unwrap().is_none());
    let record = cache
        .get(&key(&fx.alice_home.join("final.txt")))
        .unwrap()
        .unwrap();
    assert_eq!(record.size, 5);
}

#[test]
fn test_rename_conflict_and_missing() {
    let fx = fixture();
    fs::write(fx.alice_home.join("a.txt"), b"a").unwrap();
    fs::write(fx.alice_home.join("b.txt"), b"b").unwrap();

    let err = fx.ops.rename(&alice(), "/alice/a.txt", "b.txt").unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    let err = fx
        .ops
        .rename(&alice(), "/alice/ghost.txt", "c.txt")
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[test]
fn test_permission_checks_reject_missing_capability() {
    let fx = fixture();
    fs::create_dir_all(fx._temp.path().join("bob")).unwrap();
    fs::write(fx._temp.path().join("bob/file.txt"), b"x").unwrap();

    let err = fx
        .ops
        .rename(&bob(), "/bob/file.txt", "renamed.txt")
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let err = fx
        .ops
        .delete(&bob(), &["/bob/file.txt".to_string()])
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let err = fx.ops.mkdir(&bob(), "/bob", "new").unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
}

#[test]
fn test_delete_removes_subtree_and_recomputes_parent() {
    let fx = fixture();
    fs::write(fx.alice_home.join("keep.txt"), b"keep").unwrap();
    let sub = fx.alice_home.join("sub");
    fs::create_dir_all(sub.join("nested")).unwrap();
    fs::write(sub.join("a.txt"), b"12345").unwrap();
    fs::write(sub.join("nested/b.txt"), b"123").unwrap();
    fx.indexer.index_entry(&fx.alice_home, "/alice", None);

    let outcome = fx
        .ops
        .delete(&alice(), &["/alice/sub".to_string()])
        .unwrap();
    assert!(outcome.all_ok());
    assert!(!sub.exists());

    let cache = fx.indexer.cache();
    assert!(cache.get(&key(&sub)).unwrap().is_none());
    assert!(cache.get(&key(&sub.join("a.txt"))).unwrap().is_none());
    assert!(cache.get(&key(&sub.join("nested/b.txt"))).unwrap().is_none());

    // The home aggregate now reflects only the surviving file
    let record = cache.get(&key(&fx.alice_home)).unwrap().unwrap();
    assert_eq!(record.size, 4);
}

#[test]
fn test_delete_reports_per_path_outcomes() {
    let fx = fixture();
    fs::write(fx.alice_home.join("real.txt"), b"x").unwrap();

    let outcome = fx
        .ops
        .delete(
            &alice(),
            &["/alice/real.txt".to_string(), "/alice/ghost.txt".to_string()],
        )
        .unwrap();
    assert!(!outcome.all_ok());
    assert!(outcome.results[0].error.is_none());
    assert!(matches!(
        outcome.results[1].error,
        Some(CoreError::NotFound(_))
    ));
}

#[test]
fn test_move_entries_into_destination() {
    let fx = fixture();
    fs::write(fx.alice_home.join("a.txt"), b"12345").unwrap();
    fx.ops.mkdir(&alice(), "/alice", "archive").unwrap();
    fx.indexer.index_entry(&fx.alice_home, "/alice", None);

    let outcome = fx
        .ops
        .move_entries(&alice(), &["/alice/a.txt".to_string()], "/alice/archive")
        .unwrap();
    assert!(outcome.all_ok());
    assert_eq!(
        outcome.results[0].new_path.as_deref(),
        Some("/alice/archive/a.txt")
    );
    assert!(fx.alice_home.join("archive/a.txt").is_file());
    assert!(!fx.alice_home.join("a.txt").exists());

    let cache = fx.indexer.cache();
    assert!(cache.get(&key(&fx.alice_home.join("a.txt"))).unwrap().is_none());
    assert_eq!(
        cache
            .get(&key(&fx.alice_home.join("archive/a.txt")))
            .unwrap()
            .unwrap()
            .size,
        5
    );
    // The destination directory's aggregate includes the moved file
    assert_eq!(
        cache
            .get(&key(&fx.alice_home.join("archive")))
            .unwrap()
            .unwrap()
            .size,
        5
    );
}

#[test]
fn test_move_conflict_is_reported_per_path() {
    let fx = fixture();
    fs::write(fx.alice_home.join("a.txt"), b"x").unwrap();
    fx.ops.mkdir(&alice(), "/alice", "dest").unwrap();
    fs::write(fx.alice_home.join("dest/a.txt"), b"y").unwrap();

    let outcome = fx
        .ops
        .move_entries(&alice(), &["/alice/a.txt".to_string()], "/alice/dest")
        .unwrap();
    assert!(!outcome.all_ok());
    assert!(matches!(
        outcome.results[0].error,
        Some(CoreError::Conflict(_))
    ));
    // The source is left untouched on conflict
    assert!(fx.alice_home.join("a.txt").exists());
}

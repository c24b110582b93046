use super::*;
use tempfile::TempDir;

#[test]
fn test_write_atomic_creates_parent_and_replaces_content() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("nested").join("state.json");

    write_atomic(&target, b"first").unwrap();
    write_atomic(&target, b"second").unwrap();

    assert_eq!(fs::read_to_string(&target).unwrap(), "second");
    let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path() != target)
        .collect();
    assert!(leftovers.is_empty(), "temporary files left behind");
}

#[cfg(target_family = "unix")]
#[test]
fn test_written_files_are_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let target = dir.path().join("private").join("secret");
    write_atomic(&target, b"token").unwrap();

    let mode = fs::metadata(&target).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    let dir_mode = fs::metadata(target.parent().unwrap()).unwrap().permissions().mode();
    assert_eq!(dir_mode & 0o777, 0o700);
}

#[test]
fn test_lock_can_be_reacquired_after_drop() {
    let dir = TempDir::new().unwrap();
    let lock_path = dir.path().join("store.lock");

    let first = FileLock::exclusive(&lock_path).unwrap();
    assert_eq!(first.path(), lock_path.as_path());
    drop(first);

    let second = FileLock::exclusive(&lock_path);
    assert!(second.is_ok());
}

#[test]
fn test_lock_serializes_threads() {
    use std::sync::{Arc, Mutex};
    use std::thread;

    let dir = TempDir::new().unwrap();
    let lock_path = Arc::new(dir.path().join("store.lock"));
    let log = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let lock_path = Arc::clone(&lock_path);
            let log = Arc::clone(&log);
            thread::spawn(move || {
                let _guard = FileLock::exclusive(&lock_path).unwrap();
                log.lock().unwrap().push(("enter", i));
                thread::sleep(std::time::Duration::from_millis(5));
                log.lock().unwrap().push(("exit", i));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let log = log.lock().unwrap();
    for pair in log.chunks(2) {
        assert_eq!(pair[0].0, "enter");
        assert_eq!(pair[1].0, "exit");
        assert_eq!(pair[0].1, pair[1].1);
    }
}

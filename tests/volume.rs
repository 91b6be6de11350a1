//! End-to-end tests against the public `VolumeManager` API (§6.2, §8)
//! that don't fit naturally as `#[cfg(test)]` unit tests inside a single
//! module — persistence across reopen, cross-cutting failure semantics,
//! and filename validation as seen from outside the crate.

use fsv2::{VolumeError, VolumeManager};

fn geometry(max_files: u32, max_blocks: u32, block_size: u32) -> (u32, u32, u32, u32) {
    let total = 24 + 16 * max_files + 4 * max_blocks + block_size * max_blocks;
    (total, block_size, max_files, max_blocks)
}

#[test]
fn persistence_holds_across_several_files_and_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vol.img");
    let (total, block_size, max_files, max_blocks) = geometry(4, 32, 64);

    {
        let vm = VolumeManager::open(&path, total, block_size, max_files, max_blocks).unwrap();
        vm.create_file("alpha").unwrap();
        vm.create_file("beta").unwrap();
        vm.write_file("alpha", b"the quick brown fox").unwrap();
        vm.write_file("beta", &[0x42; 200]).unwrap();
        vm.delete_file("beta").unwrap();
        vm.create_file("gamma").unwrap();
        vm.write_file("gamma", b"").unwrap();
    }

    let vm = VolumeManager::open(&path, total, block_size, max_files, max_blocks).unwrap();
    let mut names = vm.list_files();
    names.sort();
    assert_eq!(names, vec!["alpha".to_string(), "gamma".to_string()]);
    assert_eq!(vm.read_file("alpha").unwrap(), b"the quick brown fox");
    assert_eq!(vm.read_file("gamma").unwrap(), Vec::<u8>::new());
    assert!(matches!(vm.read_file("beta"), Err(VolumeError::NotFound)));
}

#[test]
fn filename_boundaries_are_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vol.img");
    let (total, block_size, max_files, max_blocks) = geometry(2, 8, 16);
    let vm = VolumeManager::open(&path, total, block_size, max_files, max_blocks).unwrap();

    assert!(vm.create_file("").is_err());
    assert!(vm.create_file("   ").is_err());
    assert!(vm.create_file("twelve-bytes!").is_err()); // 13 bytes
    assert!(vm.create_file("elevenbytes").is_ok()); // exactly 11 bytes
}

#[test]
fn create_existing_name_is_rejected_without_disturbing_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vol.img");
    let (total, block_size, max_files, max_blocks) = geometry(2, 8, 16);
    let vm = VolumeManager::open(&path, total, block_size, max_files, max_blocks).unwrap();

    vm.create_file("dup").unwrap();
    vm.write_file("dup", b"payload").unwrap();
    assert!(matches!(
        vm.create_file("dup"),
        Err(VolumeError::AlreadyExists)
    ));
    assert_eq!(vm.read_file("dup").unwrap(), b"payload");
}

#[test]
fn write_rejected_when_blocks_exhausted_leaves_entry_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vol.img");
    let (total, block_size, max_files, max_blocks) = geometry(2, 2, 4);
    let vm = VolumeManager::open(&path, total, block_size, max_files, max_blocks).unwrap();

    vm.create_file("a").unwrap();
    vm.write_file("a", &[1, 2, 3, 4]).unwrap(); // exactly 1 block

    vm.create_file("b").unwrap();
    // needs 2 blocks but only 1 remains free
    assert!(matches!(
        vm.write_file("b", &[1, 2, 3, 4, 5]),
        Err(VolumeError::NoSpace)
    ));
    assert_eq!(vm.read_file("b").unwrap(), Vec::<u8>::new());
    assert_eq!(vm.read_file("a").unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn inode_table_exhaustion_is_reported_as_no_space() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vol.img");
    let (total, block_size, max_files, max_blocks) = geometry(1, 8, 16);
    let vm = VolumeManager::open(&path, total, block_size, max_files, max_blocks).unwrap();

    vm.create_file("only").unwrap();
    assert!(matches!(vm.create_file("second"), Err(VolumeError::NoSpace)));
}

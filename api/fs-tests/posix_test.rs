use super::FSName;
use regionfs_api::fs::{FileSysSupport, PosixSupport};
use regionfs_api::types::{TimeSpec, BLOCK_SIZE, NAME_MAX_LEN};
use std::path::PathBuf;

#[path = "utils.rs"]
mod utils;

static LEN: u64 = 1 << 20;
static UID: u32 = 1000;
static GID: u32 = 1000;

fn region_prep_path(name: &str) -> PathBuf {
    utils::region_prep_path(&("fs-images-posix-".to_string() + name), "img")
}

//Write a small file, remount from the backing file, and find everything unchanged
#[test]
fn hello_remount() {
    let path = region_prep_path("hello");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();

    my_fs.mkdir("/a").unwrap();
    my_fs.mknod("/a/f").unwrap();
    assert_eq!(my_fs.write("/a/f", b"Hello\n", 0).unwrap(), 6);

    //Unmount, drop the mapping, reload from the file
    let reg = my_fs.unmountfs();
    drop(reg);
    let mut my_fs = FSName::mountfs(utils::region_open(&path)).unwrap();

    let mut buf = [0u8; 6];
    assert_eq!(my_fs.read("/a/f", &mut buf, 0).unwrap(), 6);
    assert_eq!(&buf, b"Hello\n");
    let stat = my_fs.getattr(UID, GID, "/a/f").unwrap();
    assert_eq!(stat.size, 6);
    assert_eq!(stat.mode, libc::S_IFREG as u32 | 0o755);
    assert_eq!(stat.nlink, 1);
    assert_eq!(stat.uid, UID);
    assert_eq!(stat.gid, GID);

    let stat = my_fs.getattr(UID, GID, "/a").unwrap();
    assert_eq!(stat.mode, libc::S_IFDIR as u32 | 0o755);
    assert_eq!(stat.nlink, 2); //no subdirectories yet

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

//Truncate-grow makes holes that read as zeroes, and consumes free blocks
#[test]
fn truncate_and_rename() {
    let path = region_prep_path("truncate");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();

    my_fs.mkdir("/a").unwrap();
    my_fs.mknod("/a/f").unwrap();
    my_fs.write("/a/f", b"Hello\n", 0).unwrap();

    let before = my_fs.statfs().unwrap();
    my_fs.truncate("/a/f", 4096).unwrap();
    let after = my_fs.statfs().unwrap();
    assert!(before.blocks_free - after.blocks_free >= 4);

    let mut buf = vec![0u8; 4096];
    assert_eq!(my_fs.read("/a/f", &mut buf, 0).unwrap(), 4096);
    assert_eq!(&buf[..6], b"Hello\n");
    assert!(buf[6..].iter().all(|&b| b == 0));

    //Rename over an existing file replaces it
    my_fs.mknod("/a/b").unwrap();
    my_fs.rename("/a/f", "/a/b").unwrap();
    assert_eq!(my_fs.getattr(UID, GID, "/a/b").unwrap().size, 4096);
    assert_eq!(
        my_fs.getattr(UID, GID, "/a/f").unwrap_err().errno(),
        libc::ENOENT
    );
    assert_eq!(my_fs.readdir("/a").unwrap(), vec!["b".to_string()]);
    assert_eq!(my_fs.getattr(UID, GID, "/a").unwrap().nlink, 2);

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

#[test]
fn rmdir_order() {
    let path = region_prep_path("rmdir");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();

    my_fs.mkdir("/x").unwrap();
    my_fs.mkdir("/x/y").unwrap();
    assert_eq!(my_fs.rmdir("/x").unwrap_err().errno(), libc::ENOTEMPTY);
    my_fs.rmdir("/x/y").unwrap();
    my_fs.rmdir("/x").unwrap();
    assert_eq!(my_fs.open("/x").unwrap_err().errno(), libc::ENOENT);

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

//Keep doubling a file until the region is full; committed bytes stay intact
#[test]
fn fill_to_capacity() {
    let path = region_prep_path("fill");
    let mut my_fs = FSName::mkfs(&path, 4096).unwrap();

    my_fs.mknod("/f").unwrap();
    my_fs.write("/f", b"abc", 0).unwrap();

    let mut size: i64 = 1024;
    let mut last_ok: i64 = 3;
    let err = loop {
        match my_fs.truncate("/f", size) {
            Ok(()) => {
                last_ok = size;
                size *= 2;
            }
            Err(e) => break e,
        }
    };
    assert_eq!(err.errno(), libc::ENOSPC);

    //The failed truncate left the last committed size and contents alone
    assert_eq!(
        my_fs.getattr(UID, GID, "/f").unwrap().size,
        last_ok as u64
    );
    let mut buf = [0u8; 3];
    assert_eq!(my_fs.read("/f", &mut buf, 0).unwrap(), 3);
    assert_eq!(&buf, b"abc");

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

//A write a megabyte past the end grows the file with explicit zeroes
#[test]
fn far_write() {
    let path = region_prep_path("far");
    let mut my_fs = FSName::mkfs(&path, 2 << 20).unwrap();

    my_fs.mknod("/f").unwrap();
    my_fs.write("/f", b"Hello\n", 0).unwrap();
    assert_eq!(my_fs.write("/f", b"X", 1_000_000).unwrap(), 1);
    assert_eq!(my_fs.getattr(UID, GID, "/f").unwrap().size, 1_000_001);

    let mut buf = [0u8; 14];
    assert_eq!(my_fs.read("/f", &mut buf, 6).unwrap(), 14);
    assert!(buf.iter().all(|&b| b == 0));
    let mut buf = [0u8; 1];
    assert_eq!(my_fs.read("/f", &mut buf, 1_000_000).unwrap(), 1);
    assert_eq!(buf[0], b'X');

    //A window straddling the written byte
    let mut buf = [0u8; 11];
    assert_eq!(my_fs.read("/f", &mut buf, 999_995).unwrap(), 6);
    assert_eq!(&buf[..6], &[0, 0, 0, 0, 0, b'X']);

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

#[test]
fn op_errors() {
    let path = region_prep_path("errors");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();

    my_fs.mkdir("/d").unwrap();
    my_fs.mknod("/d/f").unwrap();

    assert_eq!(
        my_fs.getattr(UID, GID, "/nope").unwrap_err().errno(),
        libc::ENOENT
    );
    assert_eq!(my_fs.readdir("/d/f").unwrap_err().errno(), libc::ENOTDIR);
    assert_eq!(my_fs.unlink("/d").unwrap_err().errno(), libc::EISDIR);
    assert_eq!(my_fs.rmdir("/d/f").unwrap_err().errno(), libc::ENOTDIR);
    assert_eq!(my_fs.mknod("/d/f").unwrap_err().errno(), libc::EEXIST);
    assert_eq!(my_fs.mkdir("/d/f").unwrap_err().errno(), libc::EEXIST);
    assert_eq!(
        my_fs
            .mknod(&format!("/d/{}", "x".repeat(NAME_MAX_LEN + 1)))
            .unwrap_err()
            .errno(),
        libc::ENAMETOOLONG
    );
    assert_eq!(
        my_fs.mknod("/nope/f").unwrap_err().errno(),
        libc::ENOENT
    );
    //A missing parent outranks an oversized basename
    assert_eq!(
        my_fs
            .mknod(&format!("/nope/{}", "x".repeat(NAME_MAX_LEN + 1)))
            .unwrap_err()
            .errno(),
        libc::ENOENT
    );

    //Negative off_t inputs
    assert_eq!(
        my_fs.truncate("/d/f", -1).unwrap_err().errno(),
        libc::EFAULT
    );
    let mut buf = [0u8; 4];
    assert_eq!(
        my_fs.read("/d/f", &mut buf, -1).unwrap_err().errno(),
        libc::EFAULT
    );
    assert_eq!(
        my_fs.write("/d/f", b"x", -1).unwrap_err().errno(),
        libc::EFAULT
    );

    //Content operations on directories
    assert_eq!(
        my_fs.read("/d", &mut buf, 0).unwrap_err().errno(),
        libc::EISDIR
    );
    assert_eq!(
        my_fs.write("/d", b"x", 0).unwrap_err().errno(),
        libc::EISDIR
    );
    assert_eq!(my_fs.truncate("/d", 4).unwrap_err().errno(), libc::EISDIR);

    //Moving a directory below itself
    my_fs.mkdir("/d/sub").unwrap();
    assert_eq!(
        my_fs.rename("/d", "/d/sub/d").unwrap_err().errno(),
        libc::EINVAL
    );

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

#[test]
fn times_and_statfs() {
    let path = region_prep_path("times");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();

    my_fs.mknod("/f").unwrap();
    let atime = TimeSpec { sec: 123, nsec: 456 };
    let mtime = TimeSpec { sec: 789, nsec: 12 };
    my_fs.utimens("/f", atime, mtime).unwrap();
    let stat = my_fs.getattr(UID, GID, "/f").unwrap();
    assert_eq!(stat.atime, atime);
    assert_eq!(stat.mtime, mtime);

    //A read refreshes the access time
    let mut buf = [0u8; 1];
    my_fs.write("/f", b"z", 0).unwrap();
    my_fs.read("/f", &mut buf, 0).unwrap();
    let stat = my_fs.getattr(UID, GID, "/f").unwrap();
    assert!(stat.atime.sec >= atime.sec);

    let fsstat = my_fs.statfs().unwrap();
    assert_eq!(fsstat.block_size, BLOCK_SIZE);
    assert_eq!(fsstat.blocks, LEN / BLOCK_SIZE);
    assert_eq!(fsstat.blocks_avail, fsstat.blocks_free);
    assert!(fsstat.blocks_free < fsstat.blocks);
    assert_eq!(fsstat.name_max, NAME_MAX_LEN as u64);

    //open is a bare existence check
    my_fs.open("/f").unwrap();
    assert_eq!(my_fs.open("/g").unwrap_err().errno(), libc::ENOENT);

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

//Everything observable survives an unmount/remount cycle
#[test]
fn remount_sweep() {
    let path = region_prep_path("sweep");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();

    my_fs.mkdir("/a").unwrap();
    my_fs.mkdir("/a/b").unwrap();
    my_fs.mknod("/a/f").unwrap();
    my_fs.mknod("/a/b/g").unwrap();
    my_fs.write("/a/f", b"first", 0).unwrap();
    my_fs.write("/a/b/g", b"second", 0).unwrap();
    my_fs.utimens("/a/f", TimeSpec { sec: 5, nsec: 6 }, TimeSpec { sec: 7, nsec: 8 })
        .unwrap();

    let root_list = my_fs.readdir("/").unwrap();
    let a_list = my_fs.readdir("/a").unwrap();
    let a_stat = my_fs.getattr(UID, GID, "/a").unwrap();
    let f_stat = my_fs.getattr(UID, GID, "/a/f").unwrap();
    let fsstat = my_fs.statfs().unwrap();

    let reg = my_fs.unmountfs();
    drop(reg);
    let mut my_fs = FSName::mountfs(utils::region_open(&path)).unwrap();

    assert_eq!(my_fs.readdir("/").unwrap(), root_list);
    assert_eq!(my_fs.readdir("/a").unwrap(), a_list);
    assert_eq!(my_fs.getattr(UID, GID, "/a").unwrap(), a_stat);
    assert_eq!(my_fs.getattr(UID, GID, "/a/f").unwrap(), f_stat);
    assert_eq!(my_fs.statfs().unwrap(), fsstat);
    assert_eq!(a_stat.nlink, 3); //"/a" holds one subdirectory

    let mut buf = [0u8; 6];
    assert_eq!(my_fs.read("/a/b/g", &mut buf, 0).unwrap(), 6);
    assert_eq!(&buf, b"second");

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

use super::FSName;
use regionfs_api::fs::{AllocSupport, FileRWSupport, FileSysSupport, InodeSupport, PathSupport};
use regionfs_api::types::{FType, BLOCK_SIZE, MIN_REGION_SIZE};
use std::path::PathBuf;

#[path = "utils.rs"]
mod utils;

static LEN: u64 = 1 << 20;

fn region_prep_path(name: &str) -> PathBuf {
    utils::region_prep_path(&("fs-images-file-".to_string() + name), "img")
}

#[test]
fn write_read() {
    let path = region_prep_path("write_read");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();

    my_fs.t_create("/f", FType::TFile).unwrap();
    let mut ino = my_fs.resolve_path("/f").unwrap();

    assert_eq!(my_fs.i_write(&mut ino, b"Hello\n", 0).unwrap(), 6);
    assert_eq!(ino.node.file_parts().unwrap().0, 6);

    let mut buf = [0u8; 6];
    assert_eq!(my_fs.i_read(&mut ino, &mut buf, 0).unwrap(), 6);
    assert_eq!(&buf, b"Hello\n");

    //Reads clip at the end of the file
    let mut buf = [0u8; 16];
    assert_eq!(my_fs.i_read(&mut ino, &mut buf, 3).unwrap(), 3);
    assert_eq!(&buf[..3], b"lo\n");
    assert_eq!(my_fs.i_read(&mut ino, &mut buf, 6).unwrap(), 0);
    assert_eq!(my_fs.i_read(&mut ino, &mut buf, 100).unwrap(), 0);

    //Overwrites in the middle leave the rest alone
    assert_eq!(my_fs.i_write(&mut ino, b"YO", 1).unwrap(), 2);
    let mut buf = [0u8; 6];
    my_fs.i_read(&mut ino, &mut buf, 0).unwrap();
    assert_eq!(&buf, b"HYOlo\n");
    assert_eq!(ino.node.file_parts().unwrap().0, 6);

    //Zero-length writes do nothing
    assert_eq!(my_fs.i_write(&mut ino, b"", 3).unwrap(), 0);

    //The state survives re-resolution
    let check = my_fs.resolve_path("/f").unwrap();
    assert_eq!(check.node.file_parts().unwrap().0, 6);

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

#[test]
fn multi_block() {
    let path = region_prep_path("multi");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();

    my_fs.t_create("/big", FType::TFile).unwrap();
    let mut ino = my_fs.resolve_path("/big").unwrap();

    //Three blocks worth of patterned data in one write
    let n = (2 * BLOCK_SIZE + 952) as usize;
    let pattern: Vec<u8> = (0..n).map(|i| (i % 251) as u8).collect();
    assert_eq!(
        my_fs.i_write(&mut ino, &pattern, 0).unwrap(),
        pattern.len() as u64
    );
    assert_eq!(ino.node.file_parts().unwrap().0, pattern.len() as u64);

    //Read it all back
    let mut all = vec![0u8; n];
    assert_eq!(my_fs.i_read(&mut ino, &mut all, 0).unwrap(), n as u64);
    assert_eq!(all, pattern);

    //And a window straddling a block boundary
    let mut window = vec![0u8; 100];
    assert_eq!(
        my_fs.i_read(&mut ino, &mut window, BLOCK_SIZE - 24).unwrap(),
        100
    );
    assert_eq!(
        &window[..],
        &pattern[(BLOCK_SIZE - 24) as usize..(BLOCK_SIZE + 76) as usize]
    );

    //Overwrite across the same boundary
    let stripe = vec![0xAB; 64];
    assert_eq!(
        my_fs.i_write(&mut ino, &stripe, BLOCK_SIZE - 32).unwrap(),
        64
    );
    let mut check = vec![0u8; 64];
    my_fs.i_read(&mut ino, &mut check, BLOCK_SIZE - 32).unwrap();
    assert_eq!(check, stripe);
    //Size is unchanged by interior overwrites
    assert_eq!(ino.node.file_parts().unwrap().0, n as u64);

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

#[test]
fn holes() {
    let path = region_prep_path("holes");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();

    my_fs.t_create("/h", FType::TFile).unwrap();
    let mut ino = my_fs.resolve_path("/h").unwrap();
    my_fs.i_write(&mut ino, b"Hello\n", 0).unwrap();

    //A write far past the end turns the gap into explicit zeroes
    assert_eq!(my_fs.i_write(&mut ino, b"X", 5000).unwrap(), 1);
    assert_eq!(ino.node.file_parts().unwrap().0, 5001);

    let mut all = vec![0u8; 5001];
    assert_eq!(my_fs.i_read(&mut ino, &mut all, 0).unwrap(), 5001);
    assert_eq!(&all[..6], b"Hello\n");
    assert!(all[6..5000].iter().all(|&b| b == 0));
    assert_eq!(all[5000], b'X');

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

#[test]
fn resize() {
    let path = region_prep_path("resize");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();

    my_fs.t_create("/f", FType::TFile).unwrap();
    let free_empty = my_fs.free_size().unwrap();
    let mut ino = my_fs.resolve_path("/f").unwrap();
    my_fs.i_write(&mut ino, b"Hello\n", 0).unwrap();

    //Grow: old bytes stay, the rest reads as zeroes
    my_fs.i_resize(&mut ino, 4096).unwrap();
    assert_eq!(ino.node.file_parts().unwrap().0, 4096);
    let mut all = vec![0u8; 4096];
    assert_eq!(my_fs.i_read(&mut ino, &mut all, 0).unwrap(), 4096);
    assert_eq!(&all[..6], b"Hello\n");
    assert!(all[6..].iter().all(|&b| b == 0));

    //Shrink into the first block
    my_fs.i_resize(&mut ino, 3).unwrap();
    assert_eq!(ino.node.file_parts().unwrap().0, 3);
    let mut buf = [0u8; 8];
    assert_eq!(my_fs.i_read(&mut ino, &mut buf, 0).unwrap(), 3);
    assert_eq!(&buf[..3], b"Hel");

    //Growing again after a shrink re-zeroes what was cut off
    my_fs.i_resize(&mut ino, 6).unwrap();
    let mut buf = [0u8; 6];
    assert_eq!(my_fs.i_read(&mut ino, &mut buf, 0).unwrap(), 6);
    assert_eq!(&buf, b"Hel\0\0\0");

    //Shrinking to nothing returns every block to the allocator
    my_fs.i_resize(&mut ino, 0).unwrap();
    assert_eq!(ino.node.file_parts().unwrap(), (0, 0));
    assert_eq!(my_fs.free_size().unwrap(), free_empty);

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

//A growing resize that hits the end of the region must leave the file as it was
#[test]
fn resize_enospc() {
    let path = region_prep_path("enospc");
    let mut my_fs = FSName::mkfs(&path, MIN_REGION_SIZE * 2).unwrap();

    my_fs.t_create("/f", FType::TFile).unwrap();
    let mut ino = my_fs.resolve_path("/f").unwrap();
    my_fs.i_write(&mut ino, b"abc", 0).unwrap();
    let free_before = my_fs.free_size().unwrap();

    assert!(my_fs.i_resize(&mut ino, 100_000).is_err());

    //Size and contents are untouched, and nothing leaked
    let mut ino = my_fs.resolve_path("/f").unwrap();
    assert_eq!(ino.node.file_parts().unwrap().0, 3);
    let mut buf = [0u8; 8];
    assert_eq!(my_fs.i_read(&mut ino, &mut buf, 0).unwrap(), 3);
    assert_eq!(&buf[..3], b"abc");
    assert_eq!(my_fs.free_size().unwrap(), free_before);

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

#[test]
fn directories_rejected() {
    let path = region_prep_path("dirs");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();

    let mut root = my_fs.i_root().unwrap();
    let mut buf = [0u8; 8];
    assert!(my_fs.i_read(&mut root, &mut buf, 0).is_err());
    assert!(my_fs.i_write(&mut root, b"nope", 0).is_err());
    assert!(my_fs.i_resize(&mut root, 10).is_err());

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

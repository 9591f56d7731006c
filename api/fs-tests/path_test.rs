use super::FSName;
use regionfs_api::fs::{AllocSupport, FileSysSupport, InodeSupport, PathSupport};
use regionfs_api::types::FType;
use std::path::PathBuf;

#[path = "utils.rs"]
mod utils;

static LEN: u64 = 1 << 20;

fn region_prep_path(name: &str) -> PathBuf {
    utils::region_prep_path(&("fs-images-path-".to_string() + name), "img")
}

#[test]
fn resolve() {
    let path = region_prep_path("resolve");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();
    let root_off = my_fs.i_root().unwrap().off;

    //The root under all its spellings
    assert_eq!(my_fs.resolve_path("/").unwrap().off, root_off);
    assert_eq!(my_fs.resolve_path("/.").unwrap().off, root_off);
    assert_eq!(my_fs.resolve_path("/..").unwrap().off, root_off);
    assert_eq!(my_fs.resolve_path("//").unwrap().off, root_off);

    //Relative paths make no sense here
    assert!(my_fs.resolve_path("").is_err());
    assert!(my_fs.resolve_path("a").is_err());
    assert!(my_fs.resolve_path("/ghost").is_err());

    my_fs.t_create("/a", FType::TDir).unwrap();
    my_fs.t_create("/a/f", FType::TFile).unwrap();

    let f = my_fs.resolve_path("/a/f").unwrap();
    assert!(f.node.is_file());
    assert_eq!(my_fs.resolve_path("/a/./f").unwrap().off, f.off);
    assert_eq!(my_fs.resolve_path("/a/../a/f").unwrap().off, f.off);
    assert_eq!(my_fs.resolve_path("/a/f/").unwrap().off, f.off);

    //Files in intermediate position do not resolve
    assert!(my_fs.resolve_path("/a/f/x").is_err());

    //Parent resolution splits off the final name
    let (parent, name) = my_fs.resolve_parent("/a/f").unwrap();
    assert_eq!(parent.off, my_fs.resolve_path("/a").unwrap().off);
    assert_eq!(name, "f");
    let (parent, name) = my_fs.resolve_parent("/a/./new").unwrap();
    assert!(parent.node.is_dir());
    assert_eq!(name, "new");
    //"/", "." and ".." do not name an entry to operate on
    assert!(my_fs.resolve_parent("/").is_err());
    assert!(my_fs.resolve_parent("/a/.").is_err());
    assert!(my_fs.resolve_parent("/a/..").is_err());

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

#[test]
fn create() {
    let path = region_prep_path("create");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();

    let d = my_fs.t_create("/docs", FType::TDir).unwrap();
    assert!(d.node.is_dir());
    assert_eq!(d.node.dir_parts().unwrap().0, 1);
    let f = my_fs.t_create("/docs/readme", FType::TFile).unwrap();
    assert_eq!(f.node.file_parts().unwrap(), (0, 0));

    //The new directory's parent slot leads back up
    assert_eq!(
        my_fs.resolve_path("/docs/..").unwrap().off,
        my_fs.i_root().unwrap().off
    );

    //Duplicates, missing parents, file parents and long names are all refused
    assert!(my_fs.t_create("/docs", FType::TFile).is_err());
    assert!(my_fs.t_create("/docs/readme", FType::TFile).is_err());
    assert!(my_fs.t_create("/ghost/x", FType::TFile).is_err());
    assert!(my_fs.t_create("/docs/readme/x", FType::TFile).is_err());
    assert!(my_fs
        .t_create(&format!("/docs/{}", "x".repeat(300)), FType::TFile)
        .is_err());

    //A parent directory can hold more children than its initial table
    for i in 0..10 {
        my_fs
            .t_create(&format!("/docs/note{}", i), FType::TFile)
            .unwrap();
    }
    assert_eq!(
        my_fs.resolve_path("/docs").unwrap().node.dir_parts().unwrap().0,
        12
    );

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

#[test]
fn unlink_rmdir() {
    let path = region_prep_path("unlink");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();

    my_fs.t_create("/d", FType::TDir).unwrap();

    //A create/unlink pair leaves no trace in the allocator
    let free1 = my_fs.free_size().unwrap();
    my_fs.t_create("/d/f", FType::TFile).unwrap();
    my_fs.t_unlink("/d/f").unwrap();
    assert_eq!(my_fs.free_size().unwrap(), free1);
    assert!(my_fs.resolve_path("/d/f").is_err());

    //Same for a directory pair
    my_fs.t_create("/x", FType::TDir).unwrap();
    my_fs.t_create("/x/y", FType::TDir).unwrap();
    assert!(my_fs.t_rmdir("/x").is_err()); //not empty
    my_fs.t_rmdir("/x/y").unwrap();
    my_fs.t_rmdir("/x").unwrap();
    assert!(my_fs.resolve_path("/x").is_err());

    //Type mismatches
    my_fs.t_create("/d/sub", FType::TDir).unwrap();
    assert!(my_fs.t_unlink("/d/sub").is_err()); //unlink on a directory
    assert!(my_fs.t_rmdir("/d/f2").is_err()); //no such entry
    my_fs.t_create("/d/f2", FType::TFile).unwrap();
    assert!(my_fs.t_rmdir("/d/f2").is_err()); //rmdir on a file
    assert!(my_fs.t_unlink("/ghost/f").is_err());

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

#[test]
fn rename_moves() {
    let path = region_prep_path("rename");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();

    my_fs.t_create("/a", FType::TDir).unwrap();
    my_fs.t_create("/b", FType::TDir).unwrap();
    my_fs.t_create("/a/f", FType::TFile).unwrap();

    my_fs.t_rename("/a/f", "/b/g").unwrap();
    assert!(my_fs.resolve_path("/a/f").is_err());
    let g = my_fs.resolve_path("/b/g").unwrap();
    assert!(g.node.is_file());
    assert!(g.node.name.matches("g"));
    assert_eq!(
        my_fs.resolve_path("/a").unwrap().node.dir_parts().unwrap().0,
        1
    );
    assert_eq!(
        my_fs.resolve_path("/b").unwrap().node.dir_parts().unwrap().0,
        2
    );

    //Renaming a path onto itself changes nothing
    my_fs.t_rename("/b/g", "/b/g").unwrap();
    assert_eq!(my_fs.resolve_path("/b/g").unwrap().off, g.off);

    //Moving a directory re-points its parent slot
    my_fs.t_rename("/b", "/a/b").unwrap();
    assert_eq!(my_fs.resolve_path("/a/b/g").unwrap().off, g.off);
    assert_eq!(
        my_fs.resolve_path("/a/b/..").unwrap().off,
        my_fs.resolve_path("/a").unwrap().off
    );

    //A plain rename in place, new name only
    my_fs.t_rename("/a/b/g", "/a/b/h").unwrap();
    assert!(my_fs.resolve_path("/a/b/g").is_err());
    assert_eq!(my_fs.resolve_path("/a/b/h").unwrap().off, g.off);
    assert_eq!(
        my_fs
            .resolve_path("/a/b")
            .unwrap()
            .node
            .dir_parts()
            .unwrap()
            .0,
        2
    );

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

#[test]
fn rename_replace() {
    let path = region_prep_path("replace");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();

    my_fs.t_create("/a", FType::TDir).unwrap();
    my_fs.t_create("/a/src", FType::TFile).unwrap();
    my_fs.t_create("/a/dst", FType::TFile).unwrap();

    //Replacing a file removes the old target for good
    let src_off = my_fs.resolve_path("/a/src").unwrap().off;
    my_fs.t_rename("/a/src", "/a/dst").unwrap();
    assert!(my_fs.resolve_path("/a/src").is_err());
    assert_eq!(my_fs.resolve_path("/a/dst").unwrap().off, src_off);
    assert_eq!(
        my_fs.resolve_path("/a").unwrap().node.dir_parts().unwrap().0,
        2
    );

    //Directories only replace empty directories
    my_fs.t_create("/d1", FType::TDir).unwrap();
    my_fs.t_create("/d2", FType::TDir).unwrap();
    my_fs.t_create("/d2/kid", FType::TFile).unwrap();
    assert!(my_fs.t_rename("/d1", "/d2").is_err()); //not empty
    my_fs.t_unlink("/d2/kid").unwrap();
    my_fs.t_rename("/d1", "/d2").unwrap();
    assert!(my_fs.resolve_path("/d1").is_err());
    assert!(my_fs.resolve_path("/d2").unwrap().node.is_dir());

    //Type mismatches in both directions
    my_fs.t_create("/f", FType::TFile).unwrap();
    assert!(my_fs.t_rename("/f", "/d2").is_err()); //file over directory
    assert!(my_fs.t_rename("/d2", "/f").is_err()); //directory over file

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

#[test]
fn rename_guards() {
    let path = region_prep_path("guards");
    let mut my_fs = FSName::mkfs(&path, LEN).unwrap();

    my_fs.t_create("/p", FType::TDir).unwrap();
    my_fs.t_create("/p/q", FType::TDir).unwrap();

    //A directory cannot move below itself
    assert!(my_fs.t_rename("/p", "/p/q/r").is_err());
    assert!(my_fs.t_rename("/p", "/p/r").is_err());
    //Both still where they were
    assert!(my_fs.resolve_path("/p/q").unwrap().node.is_dir());

    //The source has to exist
    assert!(my_fs.t_rename("/ghost", "/p/x").is_err());
    //And the target parent too
    assert!(my_fs.t_rename("/p/q", "/ghost/q").is_err());

    let reg = my_fs.unmountfs();
    utils::region_destruct(reg);
}

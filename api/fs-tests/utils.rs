#![allow(dead_code)]

//Some more general testing utilities
use regionfs_api::controller::Region;
use std::fs::{create_dir_all, remove_dir, remove_file};
use std::path::{Path, PathBuf};

//Create the necessary folders 'name' leading up to 'img_name', starting from the crate root
//Additionally, remove 'img_name' if it already exists in the file system, to make sure we can start from a fresh region
pub fn region_prep_path(name: &str, img_name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push(name);
    path.push(img_name);

    if path.exists() {
        //Remove the file in case it already exists
        remove_file(&path).unwrap();
    }
    {
        //Create any missing directories first, if applicable
        let prefix = path.parent().unwrap();
        create_dir_all(prefix).unwrap();
    }

    return path;
}

//Undo folder creation, including removing the parent
pub fn region_unprep_path(path: &Path) {
    //Ensure that the file has been deleted before going on
    remove_file(path).unwrap();

    let parent = path.parent().unwrap();
    remove_dir(parent).unwrap(); //Safety; only remove if empty
}

//Create a fresh region
pub fn region_setup(path: &Path, len: u64) -> Region {
    Region::new(path, len).unwrap()
}

//Open an existing region, recovering its length from the backing file
pub fn region_open(path: &Path) -> Region {
    Region::load(path).unwrap()
}

//Destruct the given region and remove the parent directory that it was located in
pub fn region_destruct(reg: Region) {
    let path = reg.region_path().to_owned();
    drop(reg); //Flush the mapping before removing the backing file
    region_unprep_path(&path);
}

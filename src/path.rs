//! Data file discovery.
//!
//! The engine looks for its static data in a list of directories, either
//! from the `CHEWING_PATH` environment variable or the platform defaults,
//! and keeps the user phrase store under `CHEWING_USER_PATH` or the
//! platform data directory.

use std::env;
use std::path::{Path, PathBuf};

/// Directories to search for system data, delimited by the OS path
/// separator.
pub const SEARCH_PATH_ENV: &str = "CHEWING_PATH";
/// Directory holding the user phrase store.
pub const USER_PATH_ENV: &str = "CHEWING_USER_PATH";

const DATA_DIR_NAME: &str = "liuyin";

/// The ordered list of directories to search for system data files.
pub fn data_search_paths() -> Vec<PathBuf> {
    if let Some(paths) = env::var_os(SEARCH_PATH_ENV) {
        return env::split_paths(&paths).collect();
    }
    let mut paths = vec![];
    if let Some(data_dir) = dirs_next::data_dir() {
        paths.push(data_dir.join(DATA_DIR_NAME));
    }
    paths.push(PathBuf::from("/usr/local/share").join(DATA_DIR_NAME));
    paths.push(PathBuf::from("/usr/share").join(DATA_DIR_NAME));
    paths
}

/// The first directory of `paths` containing every file in `files`.
pub fn find_path_by_files<P: AsRef<Path>>(paths: &[P], files: &[&str]) -> Option<PathBuf> {
    paths
        .iter()
        .map(|path| path.as_ref())
        .find(|path| files.iter().all(|file| path.join(file).is_file()))
        .map(Path::to_path_buf)
}

/// The directory for the user phrase store. The directory may not exist
/// yet; the caller decides whether to create it.
pub fn user_data_dir() -> Option<PathBuf> {
    if let Some(path) = env::var_os(USER_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs_next::data_dir().map(|dir| dir.join(DATA_DIR_NAME))
}

//! Resolution of program names to executable paths.
//!
//! Lookup happens in the shell before forking, so a child only has to `exec`
//! the path it was given and the "command not found" case is known up front.

use std::borrow::Cow;
use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it is an executable file.
/// - Path with a separator (`./foo`, `bin/sh`): returns it if it is an
///   executable file, relative to the current directory.
/// - Single path component (no separators): search each directory in
///   `search_paths` (PATH) and return the first executable match.
/// - Empty path: returns `None`.
///
/// Returns either a borrowed reference to the provided `path` or an owned
/// `PathBuf` when the result is discovered via PATH lookup.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(single), None) if !path.is_absolute() && !path.starts_with(".") => {
            find_in_path(search_paths, single.as_os_str()).map(Cow::Owned)
        }
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

/// Like [`find_command_path`], searching the process's own `PATH`.
pub fn resolve(name: &str) -> Option<PathBuf> {
    let search_paths = std::env::var_os("PATH").unwrap_or_default();
    find_command_path(&search_paths, Path::new(name)).map(Cow::into_owned)
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|path| find_by_path(path).is_some())
}

fn find_by_path(path: &Path) -> Option<&Path> {
    let meta = path.metadata().ok()?;
    (meta.is_file() && meta.permissions().mode() & 0o111 != 0).then_some(path)
}

//! debhelper declaration files: `links` and `clean`.
//!
//! Go packages declare extra import paths through `*.links` files whose
//! entries point into `usr/share/gocode/src`. Those entries are recreated as
//! relative symlinks inside the staging root so every declared path
//! resolves. `*.clean` files list build leftovers to delete.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::toolbox::{ToolError, create_public_dir_all};

/// Installed location of Go sources in Debian binary packages.
pub const GOCODE_PREFIX: &str = "usr/share/gocode/src";

/// Regular files in `packaging` named `suffix` or ending in `suffix`,
/// sorted by name.
pub fn declaration_files(packaging: &Path, suffix: &str) -> Result<Vec<PathBuf>, ToolError> {
    let entries = match fs::read_dir(packaging) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ToolError::io(packaging)(e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(ToolError::io(packaging))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.ends_with(suffix) {
            continue;
        }
        if entry.file_type().map_err(ToolError::io(packaging))?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Recreate the `usr/share/gocode/src` links declared in `packaging`
/// under `staging`. Returns the number of links created.
pub fn apply_links(packaging: &Path, staging: &Path) -> Result<usize, ToolError> {
    let mut created = 0;
    for file in declaration_files(packaging, "links")? {
        let text = fs::read_to_string(&file).map_err(ToolError::io(&file))?;
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [source, target] = fields[..] else {
                tracing::warn!(file = %file.display(), line, "malformed links line, skipping");
                continue;
            };

            let Some(source) = under_gocode(source) else {
                continue;
            };
            let target = under_gocode(target).unwrap_or_else(|| target.trim_start_matches('/'));
            if !is_plain(source) || !is_plain(target) {
                tracing::warn!(file = %file.display(), line, "link escapes the tree, skipping");
                continue;
            }

            let source = staging.join(source);
            let target = staging.join(target);
            if create_link(&source, &target)? {
                created += 1;
            }
        }
    }
    Ok(created)
}

/// Delete the paths declared in `packaging`'s clean files, relative to
/// `package_dir`. Missing paths are ignored. Returns the number removed.
pub fn apply_clean(packaging: &Path, package_dir: &Path) -> Result<usize, ToolError> {
    let mut removed = 0;
    for file in declaration_files(packaging, "clean")? {
        let text = fs::read_to_string(&file).map_err(ToolError::io(&file))?;
        for entry in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if !is_plain(entry) {
                tracing::warn!(file = %file.display(), entry, "clean entry escapes the tree, skipping");
                continue;
            }

            let path = package_dir.join(entry);
            let result = match fs::symlink_metadata(&path) {
                Ok(meta) if meta.is_dir() => fs::remove_dir(&path),
                Ok(_) => fs::remove_file(&path),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(ToolError::io(&path)(e)),
            }
        }
    }
    Ok(removed)
}

/// Path of `to` as seen from the directory `from_dir`.
///
/// Both paths must share a root (here: the staging directory).
pub fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let to: Vec<Component<'_>> = to.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for component in &to[common..] {
        rel.push(component);
    }
    rel
}

fn under_gocode(path: &str) -> Option<&str> {
    path.trim_start_matches('/')
        .strip_prefix(GOCODE_PREFIX)
        .map(|rest| rest.trim_start_matches('/'))
}

fn is_plain(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Returns false when the link already existed.
fn create_link(source: &Path, target: &Path) -> Result<bool, ToolError> {
    let parent = target.parent().unwrap_or(target);
    create_public_dir_all(parent)?;

    let link = relative_path(parent, source);
    match symlink(&link, target) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(ToolError::io(target)(e)),
    }
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(not(unix))]
fn symlink(_original: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks require a unix host",
    ))
}

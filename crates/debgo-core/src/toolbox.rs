//! External tools used during assembly.
//!
//! Archive extraction and patch application shell out to `tar` and `quilt`;
//! everything goes through the [`Toolbox`] trait so tests can substitute
//! in-process fakes.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("'{tool}' not found. Please install it: apt install {package}")]
    NotFound {
        tool: &'static str,
        package: &'static str,
    },

    #[error("failed to spawn `{command}` in {}: {source}", cwd.display())]
    Spawn {
        command: String,
        cwd: PathBuf,
        source: io::Error,
    },

    #[error("`{command}` in {} failed ({status}): {stderr}", cwd.display())]
    Failed {
        command: String,
        cwd: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("IO error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl ToolError {
    /// Wrap an IO error with the path it concerns.
    pub fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub trait Toolbox: Send + Sync {
    /// Member paths of an archive, in archive order.
    fn list_archive(&self, archive: &Path) -> Result<Vec<String>, ToolError>;

    /// Extract `archive` into the existing directory `dest`, dropping
    /// `strip` leading path components from every member.
    fn extract_archive(&self, archive: &Path, dest: &Path, strip: usize) -> Result<(), ToolError>;

    /// Apply every patch of the series in `patches_dir` to `source_dir`.
    fn apply_patch_series(&self, source_dir: &Path, patches_dir: &Path) -> Result<(), ToolError>;

    /// Make a tree world-readable and owner-writable (`u+rwX,g+rX-w,o+rX-w`).
    fn normalize_permissions(&self, dir: &Path) -> Result<(), ToolError>;
}

/// The host's `tar` and `quilt`.
#[derive(Debug, Clone)]
pub struct SystemTools {
    tar: PathBuf,
    quilt: Option<PathBuf>,
}

impl SystemTools {
    /// Locate the tools on `PATH`.
    ///
    /// `tar` is required up front; a missing `quilt` only fails once a
    /// package actually carries patches.
    pub fn detect() -> Result<Self, ToolError> {
        let tar = which::which("tar").map_err(|_| ToolError::NotFound {
            tool: "tar",
            package: "tar",
        })?;
        let quilt = which::which("quilt").ok();
        if quilt.is_none() {
            tracing::warn!("quilt not found on PATH; packages with patches will fail");
        }
        Ok(Self { tar, quilt })
    }
}

impl Toolbox for SystemTools {
    fn list_archive(&self, archive: &Path) -> Result<Vec<String>, ToolError> {
        let mut cmd = Command::new(&self.tar);
        cmd.arg("tf").arg(archive);
        let stdout = run(&mut cmd, None)?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn extract_archive(&self, archive: &Path, dest: &Path, strip: usize) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.tar);
        cmd.arg("xf")
            .arg(archive)
            .arg("-C")
            .arg(dest)
            .arg(format!("--strip-components={strip}"));
        run(&mut cmd, None).map(drop)
    }

    fn apply_patch_series(&self, source_dir: &Path, patches_dir: &Path) -> Result<(), ToolError> {
        let quilt = self.quilt.as_ref().ok_or(ToolError::NotFound {
            tool: "quilt",
            package: "quilt",
        })?;
        let patches = std::path::absolute(patches_dir).map_err(ToolError::io(patches_dir))?;

        let mut cmd = Command::new(quilt);
        cmd.args(["push", "-a"])
            .env("QUILT_PATCHES", patches)
            .current_dir(source_dir);
        run(&mut cmd, Some(source_dir)).map(drop)
    }

    fn normalize_permissions(&self, dir: &Path) -> Result<(), ToolError> {
        normalize_tree(dir)
    }
}

/// Run a command to completion, returning its stdout.
fn run(cmd: &mut Command, cwd: Option<&Path>) -> Result<Vec<u8>, ToolError> {
    let command = describe(cmd);
    let cwd = match cwd {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().unwrap_or_default(),
    };

    let output = match cmd.output() {
        Ok(o) => o,
        Err(source) => {
            return Err(ToolError::Spawn {
                command,
                cwd,
                source,
            });
        }
    };

    if !output.status.success() {
        return Err(ToolError::Failed {
            command,
            cwd,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output.stdout)
}

fn describe(cmd: &Command) -> String {
    let mut parts: Vec<OsString> = vec![cmd.get_program().to_os_string()];
    parts.extend(cmd.get_args().map(std::ffi::OsStr::to_os_string));
    parts
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Mode after `chmod u+rwX,g+rX-w,o+rX-w`.
///
/// `X` grants execute to directories and to files already executable by
/// anyone.
pub fn normalized_mode(mode: u32, is_dir: bool) -> u32 {
    let executable = is_dir || mode & 0o111 != 0;
    let mut mode = (mode | 0o644) & !0o022;
    if executable {
        mode |= 0o111;
    }
    mode
}

/// Apply [`normalized_mode`] to every entry below `root`, symlinks excepted.
///
/// Directories are fixed before they are read so unreadable trees from
/// upstream tarballs can still be walked.
#[cfg(unix)]
pub fn normalize_tree(root: &Path) -> Result<(), ToolError> {
    use std::os::unix::fs::PermissionsExt;

    let mut pending = vec![root.to_path_buf()];
    while let Some(path) = pending.pop() {
        let meta = fs::symlink_metadata(&path).map_err(ToolError::io(&path))?;
        if meta.file_type().is_symlink() {
            continue;
        }

        let mode = meta.permissions().mode() & 0o7777;
        let wanted = normalized_mode(mode, meta.is_dir());
        if wanted != mode {
            fs::set_permissions(&path, fs::Permissions::from_mode(wanted))
                .map_err(ToolError::io(&path))?;
        }

        if meta.is_dir() {
            for entry in fs::read_dir(&path).map_err(ToolError::io(&path))? {
                pending.push(entry.map_err(ToolError::io(&path))?.path());
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn normalize_tree(_root: &Path) -> Result<(), ToolError> {
    Ok(())
}

/// `create_dir_all` that leaves every directory it creates at `0755`,
/// whatever the process umask. Existing directories are not touched.
#[cfg(unix)]
pub fn create_public_dir_all(dir: &Path) -> Result<(), ToolError> {
    use std::os::unix::fs::PermissionsExt;

    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }
    if let Some(parent) = dir.parent() {
        create_public_dir_all(parent)?;
    }
    match fs::create_dir(dir) {
        Ok(()) => fs::set_permissions(dir, fs::Permissions::from_mode(0o755))
            .map_err(ToolError::io(dir)),
        // Another package created it first.
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(ToolError::io(dir)(e)),
    }
}

#[cfg(not(unix))]
pub fn create_public_dir_all(dir: &Path) -> Result<(), ToolError> {
    fs::create_dir_all(dir).map_err(ToolError::io(dir))
}

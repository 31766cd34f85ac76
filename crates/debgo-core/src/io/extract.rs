//! Archive unpacking with leading-directory detection.

use std::path::Path;

use crate::toolbox::{ToolError, Toolbox, create_public_dir_all};

/// Number of leading path components to strip from an archive's members.
///
/// Release tarballs normally wrap everything in one top-level directory
/// (`foo-1.0/...`), which is dropped. If any member sits at the top level
/// the archive is flat and nothing is stripped.
pub fn strip_components(members: &[String]) -> usize {
    if members.iter().any(|m| !m.contains('/')) {
        0
    } else {
        1
    }
}

/// Extract `archive` into `dest`, creating it first.
pub fn unpack(tools: &dyn Toolbox, archive: &Path, dest: &Path) -> Result<(), ToolError> {
    let members = tools.list_archive(archive)?;
    let strip = strip_components(&members);
    create_public_dir_all(dest)?;
    tracing::trace!(archive = %archive.display(), dest = %dest.display(), strip, "unpacking");
    tools.extract_archive(archive, dest, strip)
}

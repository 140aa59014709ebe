use std::path::{Component, Path, PathBuf};

use crate::types::error::DatabaseError;

/// Lexically clean a path: drop `.` components and fold `..` into its
/// parent where one exists. The filesystem is not consulted.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Absolute and normalized form used to compare paths for identity.
pub fn canonical_form(path: &Path) -> Result<PathBuf, DatabaseError> {
    let absolute = std::path::absolute(path).map_err(|e| DatabaseError::from_io(e, path))?;
    Ok(normalize(&absolute))
}

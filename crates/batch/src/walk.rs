use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("Source directory not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Directory walk did not finish within {0:?}")]
    Timeout(Duration),
    #[error("Directory walk aborted: {0}")]
    Aborted(String),
}

/// Case-insensitive file-name suffix allow-list. Entries may be written
/// with or without the leading dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    suffixes: Vec<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut suffixes: Vec<String> = Vec::new();
        for ext in extensions {
            let ext = ext.as_ref().trim().trim_start_matches('.').to_lowercase();
            if ext.is_empty() {
                continue;
            }
            let suffix = format!(".{ext}");
            if !suffixes.contains(&suffix) {
                suffixes.push(suffix);
            }
        }
        Self { suffixes }
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();
        self.suffixes.iter().any(|s| name.ends_with(s.as_str()))
    }
}

/// Recursively list matching files under `root`.
///
/// Entries of every directory are visited in byte-wise name order. Symlinked
/// directories are not followed; symlinks to files are listed. Unreadable
/// subdirectories are logged and skipped; an unreadable root is an error.
pub fn walk(root: &Path, filter: &ExtensionFilter) -> Result<Vec<PathBuf>, WalkError> {
    if !root.is_dir() {
        return Err(WalkError::NotFound(root.to_path_buf()));
    }
    let mut found = Vec::new();
    visit(root, filter, &mut found)?;
    Ok(found)
}

fn visit(dir: &Path, filter: &ExtensionFilter, found: &mut Vec<PathBuf>) -> Result<(), WalkError> {
    let io_err = |source| WalkError::Io { path: dir.to_path_buf(), source };

    let mut entries = fs::read_dir(dir)
        .map_err(io_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping entry");
                continue;
            }
        };

        if file_type.is_dir() {
            if let Err(e) = visit(&path, filter, found) {
                warn!(error = %e, "Skipping unreadable directory");
            }
        } else if file_type.is_symlink() {
            // Only symlinks that resolve to files are taken.
            if fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false) && filter.matches(&path) {
                found.push(path);
            }
        } else if file_type.is_file() && filter.matches(&path) {
            found.push(path);
        }
    }
    Ok(())
}

/// [`walk`] on a blocking thread, bounded by `limit`.
pub async fn enumerate(root: PathBuf, filter: ExtensionFilter, limit: Duration) -> Result<Vec<PathBuf>, WalkError> {
    let task = tokio::task::spawn_blocking(move || walk(&root, &filter));
    match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(WalkError::Aborted(join.to_string())),
        Err(_) => Err(WalkError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    fn names(root: &Path, paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn filter_normalizes_entries() {
        let filter = ExtensionFilter::new(["png", ".JPG", " .tif ", "", "PNG"]);
        assert_eq!(filter.suffixes(), [".png", ".jpg", ".tif"]);
        assert!(filter.matches(Path::new("/scans/A.PNG")));
        assert!(filter.matches(Path::new("photo.Jpg")));
        assert!(!filter.matches(Path::new("notes.txt")));
        assert!(!filter.matches(Path::new("png")));
    }

    #[test]
    fn walks_recursively_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for name in ["b.png", "a.PNG", "notes.txt", "sub/z.jpg", "sub/deeper/c.jpeg", "C.png"] {
            touch(&root.join(name));
        }

        let filter = ExtensionFilter::new([".png", ".jpg", ".jpeg"]);
        let found = walk(root, &filter).unwrap();
        assert_eq!(names(root, &found), ["C.png", "a.PNG", "b.png", "sub/deeper/c.jpeg", "sub/z.jpg"]);
    }

    #[test]
    fn record_count_matches_file_count() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..25 {
            touch(&dir.path().join(format!("d{}/f{i}.png", i % 3)));
            touch(&dir.path().join(format!("d{}/f{i}.log", i % 3)));
        }
        let found = walk(dir.path(), &ExtensionFilter::new(["png"])).unwrap();
        assert_eq!(found.len(), 25);
    }

    #[test]
    fn missing_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = walk(&dir.path().join("nope"), &ExtensionFilter::new(["png"])).unwrap_err();
        assert!(matches!(err, WalkError::NotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        touch(&outside.path().join("hidden.png"));
        touch(&dir.path().join("real.png"));
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.png"), dir.path().join("alias.png")).unwrap();

        let found = walk(dir.path(), &ExtensionFilter::new(["png"])).unwrap();
        assert_eq!(names(dir.path(), &found), ["alias.png", "real.png"]);
    }

    #[tokio::test]
    async fn enumerate_runs_off_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("one.tiff"));
        let found = enumerate(dir.path().to_path_buf(), ExtensionFilter::new(["tiff"]), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}

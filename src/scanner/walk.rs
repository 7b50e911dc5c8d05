use glob::Pattern;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::Error;

/// Finds directories that are empty either directly or because everything inside them
/// is an empty directory.
///
/// The filesystem is the only source of truth: every call walks the tree again and
/// never modifies it.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    ignore_patterns: Vec<Pattern>,
    include_root: bool,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directories matching any of `globs` (and everything below them) are never
    /// reported and keep their parents from being reported.
    pub fn with_ignore_patterns<S: AsRef<str>>(mut self, globs: &[S]) -> Result<Self, Error> {
        self.ignore_patterns = globs
            .iter()
            .map(|glob| Pattern::new(glob.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self)
    }

    /// Whether the walk root itself may be part of the result.
    pub fn include_root(mut self, include: bool) -> Self {
        self.include_root = include;
        self
    }

    /// Walk `root` bottom-up and return every transitively empty directory below it.
    ///
    /// A directory is empty when it holds no non-directory entry and all of its
    /// subdirectories are empty. Symlinks are never followed and count as entries,
    /// so a link to a directory keeps its parent. Directories that cannot be listed
    /// are treated as occupied.
    pub fn classify(&self, root: &Path) -> Result<BTreeSet<PathBuf>, Error> {
        check_root(root)?;

        let mut empty_dirs = BTreeSet::new();
        // Directories seen to contain something that must stay. Children are yielded
        // before their parent, so a directory's entry here is complete by the time
        // the directory itself comes up.
        let mut occupied: HashSet<PathBuf> = HashSet::new();

        let walker = WalkDir::new(root).follow_links(false).contents_first(true);

        for entry_result in walker {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(err) => {
                    match err.path() {
                        Some(path) => {
                            warn!("Unable to read {}: {}", path.display(), err);
                            occupied.insert(path.to_path_buf());
                            if let Some(parent) = path.parent() {
                                occupied.insert(parent.to_path_buf());
                            }
                        }
                        None => warn!("Error walking {}: {}", root.display(), err),
                    }
                    continue;
                }
            };

            let path = entry.path();
            let is_root = entry.depth() == 0;
            let has_contents = occupied.remove(path);

            if entry.file_type().is_dir() && !has_contents && !self.is_ignored(root, path) {
                if !is_root || self.include_root {
                    debug!("Empty directory: {}", path.display());
                    empty_dirs.insert(path.to_path_buf());
                }
            } else if !is_root {
                if let Some(parent) = path.parent() {
                    occupied.insert(parent.to_path_buf());
                }
            }
        }

        Ok(empty_dirs)
    }

    fn is_ignored(&self, root: &Path, path: &Path) -> bool {
        if self.ignore_patterns.is_empty() {
            return false;
        }
        for ancestor in path.ancestors() {
            if self
                .ignore_patterns
                .iter()
                .any(|pattern| pattern.matches_path(ancestor))
            {
                return true;
            }
            if ancestor == root {
                break;
            }
        }
        false
    }
}

/// Classify with default settings: no ignore patterns, root excluded.
pub fn classify(root: &Path) -> Result<BTreeSet<PathBuf>, Error> {
    Classifier::new().classify(root)
}

fn check_root(root: &Path) -> Result<(), Error> {
    match fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(Error::NotADirectory(root.to_path_buf())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(Error::PathNotFound(root.to_path_buf()))
        }
        Err(err) => Err(Error::Io(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn set(paths: &[PathBuf]) -> BTreeSet<PathBuf> {
        paths.iter().cloned().collect()
    }

    #[test]
    fn test_leaf_and_chain_are_empty() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir(root.join("leaf")).unwrap();

        let result = classify(root).unwrap();
        assert_eq!(
            result,
            set(&[
                root.join("a"),
                root.join("a/b"),
                root.join("a/b/c"),
                root.join("leaf"),
            ])
        );
    }

    #[test]
    fn test_file_blocks_directory_and_ancestors() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("a/empty")).unwrap();
        fs::write(root.join("a/b/keep.txt"), "x").unwrap();

        let result = classify(root).unwrap();
        // c and empty are empty; b holds a file; a holds b.
        assert_eq!(result, set(&[root.join("a/b/c"), root.join("a/empty")]));
    }

    #[test]
    fn test_hidden_file_counts_as_content() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir(root.join("dotted")).unwrap();
        fs::write(root.join("dotted/.keep"), "").unwrap();

        assert!(classify(root).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_is_not_followed_and_blocks_parent() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("target")).unwrap();
        fs::create_dir_all(root.join("holder")).unwrap();
        std::os::unix::fs::symlink(root.join("target"), root.join("holder/link")).unwrap();
        // A loop that would never terminate if followed.
        std::os::unix::fs::symlink(root, root.join("target/loop")).unwrap();

        let result = classify(root).unwrap();
        assert!(result.is_empty(), "unexpected: {:?}", result);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_keeps_itself_and_parent() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().unwrap();
        let root = tmp.path();
        let locked = root.join("parent/locked");
        fs::create_dir_all(locked.join("hidden")).unwrap();
        fs::create_dir_all(root.join("free")).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users read through mode 000; nothing to observe then.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = classify(root);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(result.unwrap(), set(&[root.join("free")]));
    }

    #[test]
    fn test_root_excluded_unless_requested() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("root");
        fs::create_dir_all(root.join("a")).unwrap();

        assert_eq!(classify(&root).unwrap(), set(&[root.join("a")]));

        let with_root = Classifier::new().include_root(true).classify(&root).unwrap();
        assert_eq!(with_root, set(&[root.clone(), root.join("a")]));
    }

    #[test]
    fn test_missing_and_non_directory_roots() {
        let tmp = tempdir().unwrap();
        let missing = tmp.path().join("missing");
        assert!(matches!(classify(&missing), Err(Error::PathNotFound(p)) if p == missing));

        let file = tmp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(classify(&file), Err(Error::NotADirectory(p)) if p == file));
    }

    #[test]
    fn test_ignore_patterns_protect_subtree() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("project/.git/refs/tags")).unwrap();
        fs::create_dir_all(root.join("other/empty")).unwrap();

        let classifier = Classifier::new()
            .with_ignore_patterns(&["**/.git"])
            .unwrap();
        let result = classifier.classify(root).unwrap();
        assert_eq!(result, set(&[root.join("other"), root.join("other/empty")]));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(matches!(
            Classifier::new().with_ignore_patterns(&["a/***"]),
            Err(Error::Pattern(_))
        ));
    }

    #[test]
    fn test_classify_does_not_modify_tree() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("x/y")).unwrap();

        classify(root).unwrap();
        classify(root).unwrap();
        assert!(root.join("x/y").is_dir());
    }
}

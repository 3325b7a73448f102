//! Symbolic storage directories and the resolver seam.
//!
//! Script callers name storage locations by portable tags such as
//! `DOCUMENTS`. The host supplies a [`DirectoryResolver`] that maps each tag
//! to a real filesystem root; [`RootedDirectories`] is a table-driven
//! implementation used by the CLI host and by tests.

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use crate::error::BridgeError;

/// Portable directory tags accepted in `fileDirectory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directory {
    Documents,
    Data,
    Library,
    Cache,
    External,
    ExternalStorage,
}

impl Directory {
    /// All known tags.
    pub const ALL: [Self; 6] = [
        Self::Documents,
        Self::Data,
        Self::Library,
        Self::Cache,
        Self::External,
        Self::ExternalStorage,
    ];

    /// Returns the tag as written by script callers.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Documents => "DOCUMENTS",
            Self::Data => "DATA",
            Self::Library => "LIBRARY",
            Self::Cache => "CACHE",
            Self::External => "EXTERNAL",
            Self::ExternalStorage => "EXTERNAL_STORAGE",
        }
    }

    /// Folder name used when all tags live under one base directory.
    fn folder_name(self) -> &'static str {
        match self {
            Self::Documents => "Documents",
            Self::Data => "Data",
            Self::Library => "Library",
            Self::Cache => "Caches",
            Self::External => "External",
            Self::ExternalStorage => "ExternalStorage",
        }
    }
}

impl fmt::Display for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized directory tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown directory '{0}'")]
pub struct UnknownDirectory(pub String);

impl FromStr for Directory {
    type Err = UnknownDirectory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|dir| dir.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownDirectory(s.to_string()))
    }
}

/// Maps a symbolic directory to a concrete filesystem root.
///
/// Implementations must not touch the filesystem: resolution happens during
/// parameter validation, before any I/O.
pub trait DirectoryResolver: Send + Sync + fmt::Debug {
    /// Returns the root for `directory`, or `None` when this platform does not
    /// provide it.
    fn resolve(&self, directory: Directory) -> Option<PathBuf>;
}

/// Table-driven resolver.
#[derive(Debug, Clone, Default)]
pub struct RootedDirectories {
    roots: HashMap<Directory, PathBuf>,
}

impl RootedDirectories {
    /// Creates a resolver with no directories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver with every tag mapped to a folder under `base`
    /// (`base/Documents`, `base/Data`, ...).
    #[must_use]
    pub fn under(base: &Path) -> Self {
        let roots = Directory::ALL
            .into_iter()
            .map(|dir| (dir, base.join(dir.folder_name())))
            .collect();
        Self { roots }
    }

    /// Maps `directory` to `root`, replacing any previous mapping.
    #[must_use]
    pub fn with(mut self, directory: Directory, root: impl Into<PathBuf>) -> Self {
        self.roots.insert(directory, root.into());
        self
    }
}

impl DirectoryResolver for RootedDirectories {
    fn resolve(&self, directory: Directory) -> Option<PathBuf> {
        self.roots.get(&directory).cloned()
    }
}

/// A file named by symbolic directory plus a path relative to its root.
///
/// The relative path is normalized on construction and can never climb out of
/// the root: `..`, absolute paths and drive prefixes are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    directory: Directory,
    relative_path: PathBuf,
}

impl FileRef {
    /// Validates `relative_path` and builds a reference into `directory`.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the path is empty, names a directory,
    /// or would escape the directory root.
    pub fn new(directory: Directory, relative_path: &str) -> Result<Self, BridgeError> {
        if relative_path.trim().is_empty() {
            return Err(BridgeError::invalid(
                "filePath",
                "Must provide a file path to download the file to",
            ));
        }
        if relative_path.contains('\0') {
            return Err(BridgeError::invalid("filePath", "filePath contains a NUL byte"));
        }
        if relative_path.ends_with('/') || relative_path.ends_with(std::path::MAIN_SEPARATOR) {
            return Err(BridgeError::invalid(
                "filePath",
                format!("filePath must name a file, not a directory: {relative_path}"),
            ));
        }

        let mut normalized = PathBuf::new();
        for component in Path::new(relative_path).components() {
            match component {
                Component::Normal(segment) => normalized.push(segment),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(BridgeError::invalid(
                        "filePath",
                        format!("filePath must stay inside {directory}: {relative_path}"),
                    ));
                }
            }
        }
        if normalized.as_os_str().is_empty() {
            return Err(BridgeError::invalid(
                "filePath",
                format!("filePath must name a file: {relative_path}"),
            ));
        }

        Ok(Self {
            directory,
            relative_path: normalized,
        })
    }

    /// Symbolic directory this file lives in.
    #[must_use]
    pub fn directory(&self) -> Directory {
        self.directory
    }

    /// Normalized path below the directory root.
    #[must_use]
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Joins the relative path onto `root`.
    #[must_use]
    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(&self.relative_path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_parses_case_insensitively() {
        assert_eq!("DOCUMENTS".parse::<Directory>().unwrap(), Directory::Documents);
        assert_eq!("cache".parse::<Directory>().unwrap(), Directory::Cache);
        assert_eq!(
            "External_Storage".parse::<Directory>().unwrap(),
            Directory::ExternalStorage
        );
    }

    #[test]
    fn test_directory_rejects_unknown_tag() {
        let err = "DOWNLOADS".parse::<Directory>().unwrap_err();
        assert_eq!(err.to_string(), "unknown directory 'DOWNLOADS'");
    }

    #[test]
    fn test_rooted_directories_under_base_maps_all_tags() {
        let resolver = RootedDirectories::under(Path::new("/srv/app"));
        assert_eq!(
            resolver.resolve(Directory::Documents),
            Some(PathBuf::from("/srv/app/Documents"))
        );
        assert_eq!(
            resolver.resolve(Directory::Cache),
            Some(PathBuf::from("/srv/app/Caches"))
        );
    }

    #[test]
    fn test_rooted_directories_missing_tag_is_none() {
        let resolver = RootedDirectories::new().with(Directory::Data, "/data");
        assert_eq!(resolver.resolve(Directory::Data), Some(PathBuf::from("/data")));
        assert_eq!(resolver.resolve(Directory::Documents), None);
    }

    #[test]
    fn test_file_ref_normalizes_current_dir_segments() {
        let file = FileRef::new(Directory::Documents, "./sub/./dir/file.bin").unwrap();
        assert_eq!(file.relative_path(), Path::new("sub/dir/file.bin"));
        assert_eq!(
            file.under(Path::new("/root")),
            PathBuf::from("/root/sub/dir/file.bin")
        );
    }

    #[test]
    fn test_file_ref_rejects_traversal() {
        for malicious in ["../etc/passwd", "sub/../../escape", "/etc/passwd"] {
            let err = FileRef::new(Directory::Documents, malicious).unwrap_err();
            assert!(
                err.to_string().contains("must stay inside DOCUMENTS"),
                "unexpected error for {malicious}: {err}"
            );
        }
    }

    #[test]
    fn test_file_ref_rejects_empty_and_directory_paths() {
        assert!(FileRef::new(Directory::Data, "").is_err());
        assert!(FileRef::new(Directory::Data, ".").is_err());
        assert!(FileRef::new(Directory::Data, "sub/dir/").is_err());
    }
}

//! Filelist parsing.
//!
//! A filelist is a plain text file naming one dataset identifier per line.
//! Each identifier later names a directory under the output root, so
//! anything that would escape that root is rejected.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading a filelist.
#[derive(Debug, Error)]
pub enum FilelistError {
    /// The file could not be read.
    #[error("failed to read filelist {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An identifier cannot be used as a directory name.
    #[error("invalid identifier on line {line}: {identifier:?}")]
    InvalidIdentifier { line: usize, identifier: String },
}

/// Ordered, immutable list of dataset identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filelist {
    identifiers: Vec<String>,
}

impl Filelist {
    /// Parses filelist contents.
    ///
    /// Lines are trimmed and blank lines dropped. Duplicates are kept in
    /// order.
    pub fn parse(contents: &str) -> Result<Self, FilelistError> {
        let mut identifiers = Vec::new();
        for (idx, raw) in contents.lines().enumerate() {
            let identifier = raw.trim();
            if identifier.is_empty() {
                continue;
            }
            if !is_valid_identifier(identifier) {
                return Err(FilelistError::InvalidIdentifier {
                    line: idx + 1,
                    identifier: identifier.to_string(),
                });
            }
            identifiers.push(identifier.to_string());
        }
        Ok(Self { identifiers })
    }

    /// Reads and parses the filelist at `path`.
    pub async fn load(path: &Path) -> Result<Self, FilelistError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| FilelistError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
        Self::parse(&contents)
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.identifiers.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

impl FromIterator<String> for Filelist {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self {
            identifiers: iter.into_iter().collect(),
        }
    }
}

fn is_valid_identifier(identifier: &str) -> bool {
    identifier != "."
        && identifier != ".."
        && !identifier.contains('/')
        && !identifier.contains('\\')
        && !identifier.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_keeps_order_and_duplicates() {
        let list = Filelist::parse("dynamic_6dof\nshapes_rotation\ndynamic_6dof\n").unwrap();
        assert_eq!(
            list.identifiers(),
            &["dynamic_6dof", "shapes_rotation", "dynamic_6dof"]
        );
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_parse_trims_and_skips_blank_lines() {
        let list = Filelist::parse("  a \r\n\n\t\nb\n").unwrap();
        assert_eq!(list.identifiers(), &["a", "b"]);
    }

    #[test]
    fn test_parse_empty() {
        let list = Filelist::parse("").unwrap();
        assert!(list.is_empty());
        assert_eq!(list.iter().count(), 0);
    }

    #[test]
    fn test_parse_rejects_path_traversal() {
        let err = Filelist::parse("ok\n../etc\n").unwrap_err();
        match err {
            FilelistError::InvalidIdentifier { line, identifier } => {
                assert_eq!(line, 2);
                assert_eq!(identifier, "../etc");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(Filelist::parse("..").is_err());
        assert!(Filelist::parse("a\\b").is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "slider_depth").unwrap();
        writeln!(file, "boxes_6dof").unwrap();

        let list = Filelist::load(file.path()).await.unwrap();
        assert_eq!(list.identifiers(), &["slider_depth", "boxes_6dof"]);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = Filelist::load(Path::new("/nonexistent/filelist.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, FilelistError::Io { .. }));
    }
}

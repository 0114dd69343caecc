//! Directory entries as the dispatcher sees them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Prefix marking a wildcard entry.
pub const WILDCARD_PREFIX: char = '%';

/// How an entry participates in matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Matched by name (e.g. `blog`, `about.html.spt`).
    Literal,
    /// Matches any segment, binding it under the declared token
    /// (e.g. `%year.int.spt` declares `year.int`).
    Wildcard(String),
}

/// One entry of a directory listing.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The on-disk name.
    pub name: String,
    /// Full path.
    pub path: PathBuf,
    /// Whether the entry is (or links to) a directory.
    pub is_dir: bool,
    /// Literal or wildcard.
    pub kind: EntryKind,
}

impl Entry {
    /// Returns `true` if `name` marks a dynamic file.
    pub fn is_dynamic_name(name: &str, dynamic_suffix: &str) -> bool {
        !dynamic_suffix.is_empty() && name.ends_with(dynamic_suffix)
    }

    fn classify(name: &str, is_dir: bool, dynamic_suffix: &str) -> EntryKind {
        let Some(rest) = name.strip_prefix(WILDCARD_PREFIX) else {
            return EntryKind::Literal;
        };
        let token = if !is_dir && Self::is_dynamic_name(rest, dynamic_suffix) {
            &rest[..rest.len() - dynamic_suffix.len()]
        } else {
            rest
        };
        if token.is_empty() {
            EntryKind::Literal
        } else {
            EntryKind::Wildcard(token.to_string())
        }
    }
}

/// Lists `dir`, sorted lexically by entry name.
///
/// Names that are not valid UTF-8 can never match a decoded segment and are
/// left out.
pub fn read_sorted(dir: &Path, dynamic_suffix: &str) -> io::Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for item in fs::read_dir(dir)? {
        let item = item?;
        let Ok(name) = item.file_name().into_string() else {
            continue;
        };
        let path = item.path();
        // Follows symlinks; a dangling link is skipped.
        let is_dir = match fs::metadata(&path) {
            Ok(meta) => meta.is_dir(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        let kind = Entry::classify(&name, is_dir, dynamic_suffix);
        entries.push(Entry {
            name,
            path,
            is_dir,
            kind,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Every wildcard under `root`, as `(token, entry path)` pairs in walk order.
///
/// Symlinked directories are reported but not descended into.
pub fn wildcard_tokens(root: &Path, dynamic_suffix: &str) -> io::Result<Vec<(String, PathBuf)>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in read_sorted(&dir, dynamic_suffix)? {
            if entry.is_dir && !fs::symlink_metadata(&entry.path)?.file_type().is_symlink() {
                pending.push(entry.path.clone());
            }
            if let EntryKind::Wildcard(token) = entry.kind {
                found.push((token, entry.path));
            }
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_classify() {
        assert_eq!(Entry::classify("blog", true, ".spt"), EntryKind::Literal);
        assert_eq!(
            Entry::classify("%name", true, ".spt"),
            EntryKind::Wildcard("name".to_string())
        );
        assert_eq!(
            Entry::classify("%year.int.spt", false, ".spt"),
            EntryKind::Wildcard("year.int".to_string())
        );
        // Directories keep the suffix as part of the token.
        assert_eq!(
            Entry::classify("%x.spt", true, ".spt"),
            EntryKind::Wildcard("x.spt".to_string())
        );
        assert_eq!(Entry::classify("%", true, ".spt"), EntryKind::Literal);
        assert_eq!(Entry::classify("%.spt", false, ".spt"), EntryKind::Literal);
    }

    #[test]
    fn test_is_dynamic_name() {
        assert!(Entry::is_dynamic_name("index.html.spt", ".spt"));
        assert!(!Entry::is_dynamic_name("index.html", ".spt"));
        assert!(!Entry::is_dynamic_name("index.html", ""));
    }

    #[test]
    fn test_read_sorted_orders_by_name() {
        let dir = TempDir::new().unwrap();
        for name in ["b.txt", "%z", "a.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("c")).unwrap();

        let entries = read_sorted(dir.path(), ".spt").unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["%z", "a.txt", "b.txt", "c"]);
        assert!(entries[3].is_dir);
        assert!(!entries[0].is_dir);
    }

    #[test]
    fn test_wildcard_tokens_walks_subdirectories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("blog/%year.int")).unwrap();
        std::fs::write(dir.path().join("blog/%year.int/%slug.html.spt"), "").unwrap();
        std::fs::write(dir.path().join("about.html"), "").unwrap();

        let mut tokens: Vec<String> = wildcard_tokens(dir.path(), ".spt")
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect();
        tokens.sort();
        assert_eq!(tokens, vec!["slug.html", "year.int"]);
    }
}

//! The dispatch algorithm.

use std::io;
use std::path::Path;

use crate::entry::{read_sorted, Entry, EntryKind};
use crate::{DispatchError, DispatchResult, Wildcards};

/// Default suffix marking dynamic files.
pub const DEFAULT_DYNAMIC_SUFFIX: &str = ".spt";

/// Default index names, tried in order.
pub const DEFAULT_INDICES: [&str; 3] = ["index.html", "index.json", "index"];

/// Dispatches paths against a filesystem root.
///
/// Holds the process-wide inputs of dispatch: index names and the dynamic
/// suffix. It is immutable and cheap to share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatcher {
    indices: Vec<String>,
    dynamic_suffix: String,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_INDICES.iter().map(ToString::to_string).collect())
    }
}

impl Dispatcher {
    /// Creates a dispatcher with the given index names and the default
    /// dynamic suffix.
    #[must_use]
    pub fn new(indices: Vec<String>) -> Self {
        Self {
            indices,
            dynamic_suffix: DEFAULT_DYNAMIC_SUFFIX.to_string(),
        }
    }

    /// Sets the dynamic suffix.
    #[must_use]
    pub fn with_dynamic_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.dynamic_suffix = suffix.into();
        self
    }

    /// Index names, in the order they are tried.
    #[must_use]
    pub fn indices(&self) -> &[String] {
        &self.indices
    }

    /// The dynamic suffix.
    #[must_use]
    pub fn dynamic_suffix(&self) -> &str {
        &self.dynamic_suffix
    }

    /// Returns `true` if `path` names a dynamic file.
    #[must_use]
    pub fn is_dynamic(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| Entry::is_dynamic_name(n, &self.dynamic_suffix))
    }

    /// Dispatches decoded `parts` under `root`.
    ///
    /// `decoded` is the full decoded path; only its trailing `/` matters.
    pub fn dispatch(
        &self,
        parts: &[String],
        decoded: &str,
        root: &Path,
    ) -> Result<DispatchResult, DispatchError> {
        dispatch(&self.indices, &self.dynamic_suffix, parts, decoded, root)
    }
}

/// Dispatches decoded path segments under `root`.
///
/// A file is dynamic iff its name ends with `dynamic_suffix`. The suffix
/// stands in for an "is dynamic" predicate because matching needs the suffix
/// itself: a final segment `about.html` also finds `about.html` +
/// `dynamic_suffix`, and wildcard files drop it from their token. `parts`
/// follow the URL: `/` is `[""]` and `/foo/` is `["foo", ""]`.
///
/// # Errors
///
/// - [`DispatchError::NotFound`] when a segment matches nothing, names `.` or
///   `..`, is empty before the end, or spells out a dynamic file's suffix; or
///   when a directory has none of the index files.
/// - [`DispatchError::Redirect`] when the match is a directory and `decoded`
///   lacks its trailing `/`.
/// - [`DispatchError::Io`] on any other filesystem failure.
pub fn dispatch(
    indices: &[String],
    dynamic_suffix: &str,
    parts: &[String],
    decoded: &str,
    root: &Path,
) -> Result<DispatchResult, DispatchError> {
    let not_found = || DispatchError::NotFound {
        path: decoded.to_string(),
    };

    let mut current = root.to_path_buf();
    let mut current_is_dir = true;
    let mut wildcards = Wildcards::new();
    let last = parts.len().saturating_sub(1);

    for (i, segment) in parts.iter().enumerate() {
        let is_last = i == last;

        if !current_is_dir {
            return Err(not_found());
        }
        if segment.is_empty() {
            if is_last {
                break;
            }
            return Err(not_found());
        }
        if segment == "." || segment == ".." {
            return Err(not_found());
        }

        let entries = list(&current, dynamic_suffix, decoded)?;

        if let Some(entry) = find_literal(&entries, segment, dynamic_suffix, is_last) {
            current.clone_from(&entry.path);
            current_is_dir = entry.is_dir;
            continue;
        }

        match find_wildcard(&entries, is_last) {
            Some((token, entry)) => {
                tracing::trace!(token, segment = %segment, "wildcard matched");
                wildcards.bind(token, segment.as_str());
                current.clone_from(&entry.path);
                current_is_dir = entry.is_dir;
            }
            None => return Err(not_found()),
        }
    }

    if current_is_dir {
        if !decoded.ends_with('/') {
            return Err(DispatchError::Redirect {
                path: decoded.to_string(),
                location: format!("{decoded}/"),
            });
        }

        let entries = list(&current, dynamic_suffix, decoded)?;
        let index = indices.iter().find_map(|name| {
            find_literal(&entries, name, dynamic_suffix, true).filter(|e| !e.is_dir)
        });
        match index {
            Some(entry) => current.clone_from(&entry.path),
            None => return Err(not_found()),
        }
    }

    let is_dynamic = current
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| Entry::is_dynamic_name(n, dynamic_suffix));

    tracing::debug!(
        path = decoded,
        matched = %current.display(),
        is_dynamic,
        wildcards = wildcards.len(),
        "dispatched"
    );

    Ok(DispatchResult {
        matched: current,
        wildcards,
        is_dynamic,
    })
}

fn list(dir: &Path, dynamic_suffix: &str, decoded: &str) -> Result<Vec<Entry>, DispatchError> {
    read_sorted(dir, dynamic_suffix).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => DispatchError::NotFound {
            path: decoded.to_string(),
        },
        _ => DispatchError::Io {
            path: dir.to_path_buf(),
            source,
        },
    })
}

/// An entry named exactly `segment`, or failing that, the dynamic file
/// `segment` + suffix. Dynamic files never match under their full name, and
/// only the final segment may land on a file.
fn find_literal<'a>(
    entries: &'a [Entry],
    segment: &str,
    dynamic_suffix: &str,
    is_last: bool,
) -> Option<&'a Entry> {
    let usable = |e: &&Entry| e.kind == EntryKind::Literal && (is_last || e.is_dir);

    let exact = entries.iter().filter(usable).find(|e| {
        e.name == segment && (e.is_dir || !Entry::is_dynamic_name(&e.name, dynamic_suffix))
    });
    if exact.is_some() || !is_last || dynamic_suffix.is_empty() {
        return exact;
    }

    let dynamic_name = format!("{segment}{dynamic_suffix}");
    entries
        .iter()
        .filter(usable)
        .find(|e| !e.is_dir && e.name == dynamic_name)
}

/// The lexically first wildcard entry usable at this level.
fn find_wildcard(entries: &[Entry], is_last: bool) -> Option<(&str, &Entry)> {
    entries.iter().find_map(|e| match &e.kind {
        EntryKind::Wildcard(token) if is_last || e.is_dir => Some((token.as_str(), e)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    /// Builds a tree from paths; a trailing `/` makes a directory.
    fn tree(paths: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for p in paths {
            let full = dir.path().join(p.trim_end_matches('/'));
            if p.ends_with('/') {
                fs::create_dir_all(&full).unwrap();
            } else {
                fs::create_dir_all(full.parent().unwrap()).unwrap();
                fs::write(&full, p.as_bytes()).unwrap();
            }
        }
        dir
    }

    fn parts(path: &str) -> Vec<String> {
        path.trim_start_matches('/').split('/').map(String::from).collect()
    }

    fn run(root: &TempDir, path: &str) -> Result<DispatchResult, DispatchError> {
        Dispatcher::new(vec!["index.html".to_string()]).dispatch(&parts(path), path, root.path())
    }

    fn matched(root: &TempDir, path: &str) -> String {
        let result = run(root, path).unwrap();
        result
            .matched
            .strip_prefix(root.path())
            .unwrap()
            .to_string_lossy()
            .replace('\\', "/")
    }

    #[test]
    fn test_dynamic_file_found_without_suffix() {
        let root = tree(&["foo/bar.html.spt"]);
        let result = run(&root, "/foo/bar.html").unwrap();
        assert!(result.is_dynamic);
        assert!(result.wildcards.is_empty());
        assert!(result.matched.ends_with("foo/bar.html.spt"));
    }

    #[test]
    fn test_dynamic_file_by_full_name_is_not_found() {
        let root = tree(&["foo/bar.html.spt"]);
        assert!(run(&root, "/foo/bar.html.spt").unwrap_err().is_not_found());
    }

    #[test]
    fn test_static_file() {
        let root = tree(&["style.css"]);
        let result = run(&root, "/style.css").unwrap();
        assert!(!result.is_dynamic);
        assert_eq!(matched(&root, "/style.css"), "style.css");
    }

    #[test]
    fn test_wildcard_directory_with_index() {
        let root = tree(&["foo/%name/index.html.spt"]);
        let result = run(&root, "/foo/alice/").unwrap();
        assert_eq!(result.wildcards.get("name"), Some("alice"));
        assert!(result.is_dynamic);
        assert_eq!(matched(&root, "/foo/alice/"), "foo/%name/index.html.spt");
    }

    #[test]
    fn test_literal_beats_wildcard() {
        let root = tree(&["%name.spt", "about.spt"]);
        let result = run(&root, "/about").unwrap();
        assert!(result.wildcards.is_empty());
        assert_eq!(matched(&root, "/about"), "about.spt");

        let result = run(&root, "/other").unwrap();
        assert_eq!(result.wildcards.get("name"), Some("other"));
    }

    #[test]
    fn test_wildcard_ties_break_lexically() {
        let root = tree(&["%b.spt", "%a.spt", "%c/"]);
        let result = run(&root, "/x").unwrap();
        assert_eq!(result.wildcards.get("a"), Some("x"));
    }

    #[test]
    fn test_non_final_segments_only_consider_directories() {
        let root = tree(&["%file.spt", "%dir/leaf.txt"]);
        let result = run(&root, "/anything/leaf.txt").unwrap();
        assert_eq!(result.wildcards.get("dir"), Some("anything"));

        // A wildcard file cannot absorb a middle segment.
        let root = tree(&["%file.spt"]);
        assert!(run(&root, "/a/b").unwrap_err().is_not_found());
    }

    #[test]
    fn test_typed_wildcard_token_keeps_suffix() {
        let root = tree(&["%year.int.spt"]);
        let result = run(&root, "/2024").unwrap();
        assert_eq!(result.wildcards.get("year.int"), Some("2024"));
    }

    #[test]
    fn test_directory_without_slash_redirects() {
        let root = tree(&["foo/index.html"]);
        let err = run(&root, "/foo").unwrap_err();
        match err {
            DispatchError::Redirect { location, .. } => assert_eq!(location, "/foo/"),
            other => panic!("expected redirect, got {other:?}"),
        }
    }

    #[test]
    fn test_redirect_precedes_index_resolution() {
        // No index at all: still a redirect, never NotFound.
        let root = tree(&["empty/"]);
        assert!(run(&root, "/empty").unwrap_err().is_redirect());
        assert!(run(&root, "/empty/").unwrap_err().is_not_found());
    }

    #[test]
    fn test_root_resolves_index() {
        let root = tree(&["index.html"]);
        assert_eq!(matched(&root, "/"), "index.html");
    }

    #[test]
    fn test_indices_tried_in_order() {
        let root = tree(&["index.json", "index.html.spt"]);
        let dispatcher = Dispatcher::new(vec!["index.json".to_string(), "index.html".to_string()]);
        let result = dispatcher.dispatch(&parts("/"), "/", root.path()).unwrap();
        assert!(result.matched.ends_with("index.json"));

        let dispatcher = Dispatcher::new(vec!["index.html".to_string(), "index.json".to_string()]);
        let result = dispatcher.dispatch(&parts("/"), "/", root.path()).unwrap();
        assert!(result.matched.ends_with("index.html.spt"));
    }

    #[test]
    fn test_index_directory_is_skipped() {
        let root = tree(&["index.html/", "index"]);
        let dispatcher = Dispatcher::new(vec!["index.html".to_string(), "index".to_string()]);
        let result = dispatcher.dispatch(&parts("/"), "/", root.path()).unwrap();
        assert!(result.matched.ends_with("index"));
    }

    #[test]
    fn test_dot_segments_are_not_found() {
        let root = tree(&["a/b.txt", "secret.txt"]);
        assert!(run(&root, "/a/../secret.txt").unwrap_err().is_not_found());
        assert!(run(&root, "/a/./b.txt").unwrap_err().is_not_found());
    }

    #[test]
    fn test_empty_middle_segment_is_not_found() {
        let root = tree(&["a/b.txt"]);
        assert!(run(&root, "/a//b.txt").unwrap_err().is_not_found());
    }

    #[test]
    fn test_segment_past_file_is_not_found() {
        let root = tree(&["a.txt"]);
        assert!(run(&root, "/a.txt/more").unwrap_err().is_not_found());
        assert!(run(&root, "/a.txt/").unwrap_err().is_not_found());
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let root = tree(&[]);
        let missing = root.path().join("nope");
        let err = Dispatcher::default()
            .dispatch(&parts("/"), "/", &missing)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_nested_wildcards_bind_in_order() {
        let root = tree(&["%year/%slug.spt"]);
        let result = run(&root, "/2024/hello").unwrap();
        let pairs: Vec<_> = result.wildcards.iter().collect();
        assert_eq!(pairs, vec![("year", "2024"), ("slug", "hello")]);
    }

    #[test]
    fn test_custom_dynamic_suffix() {
        let root = tree(&["page.tmpl"]);
        let dispatcher = Dispatcher::default().with_dynamic_suffix(".tmpl");
        let result = dispatcher.dispatch(&parts("/page"), "/page", root.path()).unwrap();
        assert!(result.is_dynamic);
        assert!(dispatcher.is_dynamic(&result.matched));
    }

    proptest! {
        #[test]
        fn dispatch_is_deterministic(segment in "[a-z]{1,8}") {
            let root = tree(&["%b/index.html", "%a/index.html", "%c.spt"]);
            let path = format!("/{segment}/");
            let first = run(&root, &path).unwrap();
            for _ in 0..3 {
                prop_assert_eq!(&run(&root, &path).unwrap(), &first);
            }
            prop_assert_eq!(first.wildcards.get("a"), Some(segment.as_str()));
        }
    }
}

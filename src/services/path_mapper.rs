//! Translation between the object-store namespace and filesystem paths.
//!
//! A bucket is a directory, an object is a regular file below it and every
//! key prefix ending in [`DELIMITER`] is a directory in between. Nothing in
//! here touches the disk.

use std::path::{Path, PathBuf};
use uuid::Uuid;

/// The only hierarchy separator the filesystem layout can represent.
pub const DELIMITER: char = '/';

const STAGING_PREFIX: &str = ".tmp-";

/// Filesystem location of `key` below `bucket_root`.
///
/// Plain concatenation: keys are not inspected here.
pub fn object_path(bucket_root: &Path, key: &str) -> PathBuf {
    bucket_root.join(key)
}

/// The virtual directory containing `path`, without its trailing delimiter.
///
/// Trailing delimiters are stripped first, so `a/b/` and `a/b` share the
/// parent `a`. Returns `None` once no delimiter remains, i.e. when the
/// parent would be the bucket root.
pub fn parent_of(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches(DELIMITER);
    trimmed
        .rfind(DELIMITER)
        .map(|idx| &trimmed[..idx])
        .filter(|parent| !parent.is_empty())
}

/// Key of a regular file named `name` found while listing `prefix`.
pub fn entry_key(prefix: &str, name: &str) -> String {
    format!("{prefix}{name}")
}

/// Common prefix of a directory named `name` found while listing `prefix`.
pub fn common_prefix(prefix: &str, name: &str) -> String {
    format!("{prefix}{name}{DELIMITER}")
}

/// Fresh name for an in-flight upload, unique within its directory.
pub fn staging_name() -> String {
    format!("{STAGING_PREFIX}{}", Uuid::new_v4())
}

/// True for names produced by [`staging_name`]; listings skip them.
pub fn is_staging_name(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_appends_key_to_bucket_root() {
        let root = Path::new("/srv/store/photos");
        assert_eq!(
            object_path(root, "2025/img.jpg"),
            PathBuf::from("/srv/store/photos/2025/img.jpg")
        );
        assert_eq!(object_path(root, "a/"), PathBuf::from("/srv/store/photos/a/"));
    }

    #[test]
    fn parent_of_walks_one_level_up() {
        assert_eq!(parent_of("a/b/c.txt"), Some("a/b"));
        assert_eq!(parent_of("a/b"), Some("a"));
        assert_eq!(parent_of("a"), None);
        assert_eq!(parent_of(""), None);
    }

    #[test]
    fn parent_of_ignores_trailing_delimiters() {
        assert_eq!(parent_of("a/b/"), Some("a"));
        assert_eq!(parent_of("a/b///"), Some("a"));
        assert_eq!(parent_of("a///"), None);
        assert_eq!(parent_of("///"), None);
    }

    #[test]
    fn parent_is_always_a_prefix_of_its_input() {
        for path in ["x/y/z", "x/y/z/", "deep/er/still/key.bin", "one/"] {
            let mut current = path;
            while let Some(parent) = parent_of(current) {
                assert!(path.starts_with(parent), "{parent} not a prefix of {path}");
                assert!(parent.len() < current.len());
                current = parent;
            }
        }
    }

    #[test]
    fn listing_names_become_keys_and_prefixes() {
        assert_eq!(entry_key("a/", "imina"), "a/imina");
        assert_eq!(entry_key("", "top.txt"), "top.txt");
        assert_eq!(common_prefix("a/", "foo"), "a/foo/");
        assert_eq!(common_prefix("", "a"), "a/");
    }

    #[test]
    fn staging_names_are_recognised() {
        let name = staging_name();
        assert!(is_staging_name(&name));
        assert_ne!(name, staging_name());
        assert!(!is_staging_name("tmp-file"));
    }
}

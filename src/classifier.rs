// src/classifier.rs
// C3: ranks languages present in a working copy by file count.

use std::collections::HashMap;
use std::path::Path;

use walkdir::WalkDir;

use crate::types::{LanguageCount, LanguageTag};

const VCS_METADATA_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// Walk `path`, counting files per `LanguageTag` by extension. Dot-files and
/// files under VCS-metadata directories are excluded. Empty input yields an
/// empty list, not an error. Sorted by `file_count` descending, ties broken
/// by tag name (spec §4.3).
pub fn classify(path: &Path) -> Vec<LanguageCount> {
    let mut counts: HashMap<LanguageTag, usize> = HashMap::new();

    let walker = WalkDir::new(path).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        if entry.depth() == 0 {
            return true;
        }
        if VCS_METADATA_DIRS.contains(&name.as_ref()) {
            return false;
        }
        true
    });

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if file_name.starts_with('.') {
            continue;
        }

        let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) else {
            continue;
        };

        let tag = LanguageTag::from_extension(ext);
        *counts.entry(tag).or_insert(0) += 1;
    }

    let total: usize = counts.values().sum();

    let mut result: Vec<LanguageCount> = counts
        .into_iter()
        .filter(|(_, count)| *count >= 1)
        .map(|(tag, file_count)| LanguageCount {
            tag,
            file_count,
            share: file_count as f64 / total as f64,
        })
        .collect();

    result.sort_by(|a, b| {
        b.file_count
            .cmp(&a.file_count)
            .then_with(|| a.tag.as_str().cmp(b.tag.as_str()))
    });

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, rel: &str) {
        let full = dir.join(rel);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, b"x").unwrap();
    }

    #[test]
    fn empty_directory_yields_empty_list() {
        let dir = tempdir().unwrap();
        assert!(classify(dir.path()).is_empty());
    }

    #[test]
    fn single_language_directory_counts_correctly() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "main.go");
        touch(dir.path(), "util.go");
        touch(dir.path(), "sub/helper.go");

        let result = classify(dir.path());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].tag, LanguageTag::Go);
        assert_eq!(result[0].file_count, 3);
    }

    #[test]
    fn ignores_dotfiles_and_vcs_metadata() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "main.go");
        touch(dir.path(), ".hidden.go");
        touch(dir.path(), ".git/config");

        let result = classify(dir.path());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].file_count, 1);
    }

    #[test]
    fn classification_is_stable_across_runs() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "main.go");
        touch(dir.path(), "app.py");
        touch(dir.path(), "app2.py");

        let first = classify(dir.path());
        let second = classify(dir.path());
        assert_eq!(first, second);
    }

    #[test]
    fn unrecognized_extensions_count_as_other() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "README.md");

        let result = classify(dir.path());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].tag, LanguageTag::Other);
    }
}

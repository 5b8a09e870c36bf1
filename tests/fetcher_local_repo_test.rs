// tests/fetcher_local_repo_test.rs
//
// Exercises the fetcher (C2) against a local git repository instead of a
// real forge, so these tests need no network access. git2 clones a plain
// filesystem path exactly as it would a remote URL.

use std::path::Path;
use std::time::Duration;

use scanhost::fetcher::{self, error::FetchError};
use scanhost::url_validator::ValidatedRepo;

fn init_local_repo(dir: &Path, file_count: usize, bytes_per_file: usize) {
    let repo = git2::Repository::init(dir).expect("failed to init fixture repo");

    for i in 0..file_count {
        let path = dir.join(format!("file_{i}.go"));
        std::fs::write(&path, vec![b'x'; bytes_per_file]).unwrap();
    }

    let mut index = repo.index().unwrap();
    index.add_all(["."], git2::IndexAddOption::DEFAULT, None).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = git2::Signature::now("fixture", "fixture@example.com").unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "initial commit", &tree, &[])
        .unwrap();
}

fn local_repo(path: &Path) -> ValidatedRepo {
    ValidatedRepo {
        canonical_url: path.display().to_string(),
        host: "local.test".to_string(),
        owner: "fixture".to_string(),
        repo: "repo".to_string(),
    }
}

/// Scenario 1 (partial): a small clean repo fetches within the size cap and
/// leaves a populated working directory behind.
#[tokio::test]
async fn fetch_clones_a_small_repo_within_the_size_cap() {
    let source = tempfile::tempdir().unwrap();
    init_local_repo(source.path(), 5, 1024);

    let work_root = tempfile::tempdir().unwrap();
    let repo = local_repo(source.path());

    let outcome = fetcher::fetch(work_root.path(), &repo, Duration::from_secs(30), 500, None, None)
        .await
        .expect("fetch should succeed for a small repo");

    assert!(outcome.workdir.path().join("file_0.go").exists());
}

/// P5: a fetch whose on-disk size crosses the configured cap ends in a
/// capacity error, and the working directory is released rather than left
/// behind for an analyzer to see.
#[tokio::test]
async fn fetch_rejects_a_repo_that_exceeds_the_size_cap() {
    let source = tempfile::tempdir().unwrap();
    // ~2MB of tracked content, comfortably over a 1MB cap.
    init_local_repo(source.path(), 4, 512 * 1024);

    let work_root = tempfile::tempdir().unwrap();
    let repo = local_repo(source.path());

    let result = fetcher::fetch(work_root.path(), &repo, Duration::from_secs(30), 1, None, None).await;

    match result {
        Err(FetchError::TooLarge(_)) => {}
        other => panic!("expected TooLarge, got {other:?}"),
    }

    // work_root itself may still exist, but nothing from this job's
    // directory should remain in it.
    let leftover = std::fs::read_dir(work_root.path())
        .unwrap()
        .filter_map(Result::ok)
        .count();
    assert_eq!(leftover, 0);
}

/// A repository that doesn't exist at the given location fails the fetch
/// and still releases the (empty) working directory it had staged.
#[tokio::test]
async fn fetch_fails_for_a_nonexistent_repo_and_releases_its_workdir() {
    let missing = tempfile::tempdir().unwrap().path().join("does-not-exist");
    let work_root = tempfile::tempdir().unwrap();
    let repo = local_repo(&missing);

    let result = fetcher::fetch(work_root.path(), &repo, Duration::from_secs(30), 500, None, None).await;
    assert!(result.is_err());

    // Surfaces through the same conversion the orchestrator relies on.
    let scan_err: scanhost::error::ScanError = result.unwrap_err().into();
    assert!(!scan_err.user_message().is_empty());

    let leftover = std::fs::read_dir(work_root.path())
        .unwrap()
        .filter_map(Result::ok)
        .count();
    assert_eq!(leftover, 0);
}

/// The classifier, run against a freshly fetched working copy, sees the
/// files git2 actually checked out.
#[tokio::test]
async fn fetched_repo_classifies_by_extension() {
    let source = tempfile::tempdir().unwrap();
    init_local_repo(source.path(), 3, 100);

    let work_root = tempfile::tempdir().unwrap();
    let repo = local_repo(source.path());

    let outcome = fetcher::fetch(work_root.path(), &repo, Duration::from_secs(30), 500, None, None)
        .await
        .unwrap();

    let languages = scanhost::classifier::classify(outcome.workdir.path());
    assert_eq!(languages.len(), 1);
    assert_eq!(languages[0].tag, scanhost::types::LanguageTag::Go);
    assert_eq!(languages[0].file_count, 3);
}

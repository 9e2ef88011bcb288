//! Git tasks against real repositories in temporary directories.

mod common;

use bbtask::application::use_cases::git_tasks::{
    CommitRequest, GitCommitConfig, GitCommitUseCase, GitInitConfig, GitInitUseCase, PushConfig,
    PushUseCase,
};
use bbtask::infrastructure::git::{Git2VersionControl, GitRepository, TagSpec};
use bbtask::infrastructure::http::request::Method;
use bbtask::TaskError;
use common::test_fixtures::{GitFixture, RecordFixture, ServiceFixture};
use pretty_assertions::assert_eq;

fn scripted_repository() -> ServiceFixture {
    let fixture = ServiceFixture::new();
    fixture
        .transport
        .respond(
            Method::Get,
            "/rest/api/1.0/projects/FOO",
            200,
            RecordFixture::project("FOO"),
        )
        .respond(
            Method::Get,
            "/rest/api/1.0/projects/FOO/repos/bar",
            200,
            RecordFixture::repository("FOO", "bar"),
        );
    fixture
}

#[test]
fn test_git_init_creates_repository() {
    let git = GitFixture::new();
    let repodir = git.path("fresh");

    let outcome = GitInitUseCase::new(GitInitConfig {
        repodir: repodir.clone(),
        force: false,
    })
    .execute(&Git2VersionControl::new(), false)
    .unwrap();

    assert!(outcome.changed);
    assert!(repodir.join(".git").is_dir());
}

#[test]
fn test_git_init_in_check_mode_touches_nothing() {
    let git = GitFixture::new();
    let repodir = git.path("fresh");

    let outcome = GitInitUseCase::new(GitInitConfig {
        repodir: repodir.clone(),
        force: false,
    })
    .execute(&Git2VersionControl::new(), true)
    .unwrap();

    assert!(outcome.changed);
    assert!(!repodir.exists());
}

#[test]
fn test_commit_is_idempotent() {
    let git = GitFixture::new();
    let repodir = git.working_copy(None);
    let vcs = Git2VersionControl::new();
    let config = GitCommitConfig {
        repodir: repodir.clone(),
        commit: CommitRequest::new("Initial import", GitFixture::committer()),
    };

    let first = GitCommitUseCase::new(config.clone())
        .execute(&vcs, false)
        .unwrap();
    let second = GitCommitUseCase::new(config).execute(&vcs, false).unwrap();

    assert!(first.changed);
    assert!(first.field("json").unwrap()["after_commit_hexsha"].is_string());
    assert!(!second.changed);
}

#[test]
fn test_commit_outside_a_directory_fails() {
    let git = GitFixture::new();
    let error = GitCommitUseCase::new(GitCommitConfig {
        repodir: git.path("missing"),
        commit: CommitRequest::new("msg", GitFixture::committer()),
    })
    .execute(&Git2VersionControl::new(), false)
    .unwrap_err();

    assert!(matches!(error, TaskError::FileSystem { .. }));
}

#[test]
fn test_push_commits_tags_and_updates_remote() {
    let git = GitFixture::new();
    let remote = git.bare_remote();
    let repodir = git.working_copy(Some(&remote));
    let fixture = scripted_repository();

    let outcome = PushUseCase::new(
        PushConfig::new("FOO", "bar", &repodir).with_commit(Some(
            CommitRequest::new("Release 1.0", GitFixture::committer())
                .with_tag(Some(TagSpec::annotated("v1.0", "First release"))),
        )),
    )
    .execute(&fixture.service(false), &Git2VersionControl::new())
    .unwrap();

    assert!(outcome.changed);
    let local = GitRepository::open(&repodir).unwrap();
    let branch = local.current_branch().unwrap();
    let head = local.head_id().unwrap().unwrap();

    let bare = git2::Repository::open_bare(&remote).unwrap();
    let pushed = bare.refname_to_id(&branch.to_ref()).unwrap();
    assert_eq!(pushed.to_string(), head);
    assert!(bare.refname_to_id("refs/tags/v1.0").is_ok());

    let refspecs = outcome.field("json").unwrap()["refspecs"]
        .as_array()
        .unwrap()
        .len();
    assert_eq!(refspecs, 2);
}

#[test]
fn test_push_in_check_mode_leaves_remote_untouched() {
    let git = GitFixture::new();
    let remote = git.bare_remote();
    let repodir = git.working_copy(Some(&remote));
    let fixture = scripted_repository();

    let outcome = PushUseCase::new(
        PushConfig::new("FOO", "bar", &repodir)
            .with_commit(Some(CommitRequest::new("Would commit", GitFixture::committer()))),
    )
    .execute(&fixture.service(true), &Git2VersionControl::new())
    .unwrap();

    assert!(outcome.changed);
    assert_eq!(GitRepository::open(&repodir).unwrap().head_id().unwrap(), None);
    let bare = git2::Repository::open_bare(&remote).unwrap();
    assert!(bare.references().unwrap().next().is_none());
}

#[test]
fn test_push_and_delete_repodir() {
    let git = GitFixture::new();
    let remote = git.bare_remote();
    let repodir = git.working_copy(Some(&remote));
    let fixture = scripted_repository();

    PushUseCase::new(
        PushConfig::new("FOO", "bar", &repodir)
            .with_commit(Some(CommitRequest::new("Import", GitFixture::committer())))
            .with_delete_repodir(true),
    )
    .execute(&fixture.service(false), &Git2VersionControl::new())
    .unwrap();

    assert!(!repodir.exists());
    let bare = git2::Repository::open_bare(&remote).unwrap();
    assert_eq!(bare.references().unwrap().count(), 1);
}

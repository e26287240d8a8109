//! Artifact sync: plan walking and partial-failure reporting.

use std::path::PathBuf;

use canary_cli::application::ports::RemoteTransport;
use canary_cli::application::services::transfer::{plan_tree, upload_tree};
use canary_cli::domain::DeployError;

use crate::helpers::sample_tree;
use crate::mocks::MockTransport;

fn paths(items: &[&str]) -> Vec<PathBuf> {
    items.iter().map(PathBuf::from).collect()
}

#[test]
fn plan_lists_directories_and_files_in_walk_order() {
    let tree = sample_tree();
    let plan = plan_tree(tree.path()).expect("plan");
    assert_eq!(plan.directories, paths(&["a", "b"]));
    assert_eq!(
        plan.files,
        vec![
            PathBuf::from("a").join("one.txt"),
            PathBuf::from("b").join("two.txt"),
            PathBuf::from("top.txt"),
        ]
    );
}

#[test]
fn plan_skips_git_but_keeps_hidden_and_ignored_files() {
    let tree = sample_tree();
    std::fs::create_dir(tree.path().join(".git")).expect("mkdir .git");
    std::fs::write(tree.path().join(".git").join("HEAD"), "ref").expect("write");
    std::fs::write(tree.path().join(".env"), "X=1").expect("write");
    std::fs::write(tree.path().join(".gitignore"), "top.txt\n").expect("write");

    let plan = plan_tree(tree.path()).expect("plan");

    assert!(plan.files.iter().all(|f| !f.starts_with(".git")), "{plan:?}");
    assert!(plan.files.contains(&PathBuf::from(".env")));
    assert!(plan.files.contains(&PathBuf::from(".gitignore")));
    assert!(plan.files.contains(&PathBuf::from("top.txt")));
}

#[test]
fn plan_rejects_missing_source() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(plan_tree(&dir.path().join("nope")).is_err());
}

#[tokio::test]
async fn upload_creates_root_then_directories_then_files() {
    let tree = sample_tree();
    let key = tempfile::NamedTempFile::new().expect("tempfile");
    let transport = MockTransport::default();
    let conn = transport
        .connect(&crate::readiness::target(key.path()))
        .await
        .expect("connect");

    let report = upload_tree(&transport, &conn, tree.path(), "deployment")
        .await
        .expect("upload");

    assert_eq!(
        *transport.dirs.lock().expect("lock"),
        vec!["deployment", "deployment/a", "deployment/b"]
    );
    assert_eq!(
        *transport.puts.lock().expect("lock"),
        vec![
            "deployment/a/one.txt",
            "deployment/b/two.txt",
            "deployment/top.txt"
        ]
    );
    assert_eq!(report.files_copied.len(), 3);
    assert_eq!(report.directories_created, paths(&["a", "b"]));
}

#[tokio::test]
async fn failure_on_second_file_reports_exactly_the_first() {
    let tree = sample_tree();
    let key = tempfile::NamedTempFile::new().expect("tempfile");
    let transport = MockTransport::default().failing_put(2);
    let conn = transport
        .connect(&crate::readiness::target(key.path()))
        .await
        .expect("connect");

    let err = upload_tree(&transport, &conn, tree.path(), "deployment")
        .await
        .expect_err("should fail");

    match err.downcast_ref::<DeployError>() {
        Some(DeployError::Transfer {
            failed,
            reason,
            copied,
            directories_created,
        }) => {
            assert_eq!(failed, &PathBuf::from("b").join("two.txt"));
            assert_eq!(copied, &vec![PathBuf::from("a").join("one.txt")]);
            assert_eq!(directories_created, &paths(&["a", "b"]));
            assert!(reason.contains("No space left"), "{reason}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(transport.puts.lock().expect("lock").len(), 1);
}

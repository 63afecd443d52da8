//! End-to-end tests for the `sf` binary.
//!
//! Each test runs `sf` as a subprocess in an isolated temp directory with its
//! own user-config home.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

fn sf_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sf"));
    cmd.current_dir(dir);
    cmd.env("XDG_CONFIG_HOME", dir.join("xdg"));
    cmd.env("STORYFORK_LOG", "error");
    cmd.env_remove("FORMAT");
    cmd.env_remove("STORYFORK_AUTHOR");
    cmd
}

fn sf_json(dir: &Path, args: &[&str]) -> Value {
    let output = sf_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("sf should not crash");
    assert!(
        output.status.success(),
        "sf {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON on stdout")
}

fn init_project() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    sf_cmd(dir.path()).arg("init").assert().success();
    dir
}

/// Returns (story id, opening contribution id).
fn create_story(dir: &Path) -> (String, String) {
    let story = sf_json(
        dir,
        &[
            "story",
            "create",
            "--title",
            "Harbor",
            "--content",
            "Fog rolled in.",
        ],
    );
    (
        story["id"].as_str().expect("story id").to_string(),
        story["first_contribution_id"]
            .as_str()
            .expect("opening id")
            .to_string(),
    )
}

fn contribute(dir: &Path, story: &str, parent: &str, text: &str) -> String {
    let c = sf_json(
        dir,
        &["contribute", story, "--parent", parent, "--content", text],
    );
    assert_eq!(c["is_canonical"], false);
    assert_eq!(c["likes_count"], 0);
    c["id"].as_str().expect("contribution id").to_string()
}

fn like(dir: &Path, story: &str, id: &str) -> Value {
    sf_json(dir, &["like", story, id])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn init_creates_project_and_refuses_rerun() {
    let dir = init_project();
    assert!(dir.path().join(".storyfork/config.toml").is_file());
    assert!(dir.path().join(".storyfork/storyfork.db").is_file());

    sf_cmd(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    sf_cmd(dir.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn commands_before_init_report_not_initialized() {
    let dir = TempDir::new().expect("temp dir");
    let output = sf_cmd(dir.path())
        .args(["story", "list", "--json"])
        .output()
        .expect("run");
    assert!(!output.status.success());
    let err: Value = serde_json::from_slice(&output.stderr).expect("JSON error on stderr");
    assert_eq!(err["error"]["error_code"], "E1001");
}

#[test]
fn five_likes_promote_and_overtake_demotes() {
    let dir = init_project();
    let (story, root) = create_story(dir.path());
    let shown = sf_json(dir.path(), &["story", "show", &story]);
    assert!(
        shown["cover_image_url"]
            .as_str()
            .is_some_and(|url| url.starts_with("https://placehold.co/") && url.ends_with("text=Fog%20rolled%20in."))
    );
    let a = contribute(dir.path(), &story, &root, "A ship appeared.");
    let b = contribute(dir.path(), &story, &root, "The lighthouse went dark.");

    for n in 1..=4 {
        let out = like(dir.path(), &story, &a);
        assert_eq!(out["likes"], n);
        assert_eq!(out["promoted"], false);
    }
    let fifth = like(dir.path(), &story, &a);
    assert_eq!(fifth["promoted"], true);
    assert!(fifth.get("demoted").is_none());

    for _ in 0..5 {
        like(dir.path(), &story, &b);
    }
    let sixth = like(dir.path(), &story, &b);
    assert_eq!(sixth["likes"], 6);
    assert_eq!(sixth["promoted"], true);
    assert_eq!(sixth["demoted"], Value::String(a.clone()));

    let shown = sf_json(dir.path(), &["story", "show", &story]);
    let line: Vec<&str> = shown["contributions"]
        .as_array()
        .expect("contributions")
        .iter()
        .map(|c| c["id"].as_str().expect("id"))
        .collect();
    assert_eq!(line, [root.as_str(), b.as_str()]);

    let report = sf_json(dir.path(), &["verify"]);
    assert_eq!(report["ok"], true);
}

#[test]
fn branches_lists_and_ranks_children() {
    let dir = init_project();
    let (story, root) = create_story(dir.path());
    contribute(dir.path(), &story, &root, "one");
    contribute(dir.path(), &story, &root, "two");

    let plain = sf_json(dir.path(), &["branches", &story]);
    assert_eq!(plain.as_array().expect("array").len(), 2);

    let ranked = sf_json(dir.path(), &["branches", &story, "--rank"]);
    let ranks: Vec<u64> = ranked
        .as_array()
        .expect("array")
        .iter()
        .map(|r| r["rank"].as_u64().expect("rank"))
        .collect();
    assert_eq!(ranks, [1, 2]);
    assert!(ranked[0]["justification"].is_string());
}

#[test]
fn unknown_contribution_is_not_found() {
    let dir = init_project();
    let (story, _root) = create_story(dir.path());
    let output = sf_cmd(dir.path())
        .args(["like", &story, "nope", "--json"])
        .output()
        .expect("run");
    assert!(!output.status.success());
    let err: Value = serde_json::from_slice(&output.stderr).expect("JSON error");
    assert_eq!(err["error"]["error_code"], "E2002");
}

#[test]
fn invalid_status_and_blank_content_are_rejected() {
    let dir = init_project();
    let (story, root) = create_story(dir.path());

    sf_cmd(dir.path())
        .args(["story", "status", &story, "paused"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2004"));

    sf_cmd(dir.path())
        .args(["contribute", &story, "--parent", &root, "--content", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2003"));

    let done = sf_json(dir.path(), &["story", "status", &story, "completed"]);
    assert_eq!(done["status"], "completed");
}

#[test]
fn author_flag_and_config_threshold_apply() {
    let dir = init_project();
    std::fs::write(
        dir.path().join(".storyfork/config.toml"),
        "[canon]\npromotion_threshold = 2\n",
    )
    .expect("write config");

    let story = sf_json(
        dir.path(),
        &[
            "story", "create", "--title", "Orchard", "--content", "Bare trees.", "--author",
            "Ada",
        ],
    );
    assert_eq!(story["author"]["display_name"], "Ada");
    let story_id = story["id"].as_str().expect("id");
    let root = story["first_contribution_id"].as_str().expect("root");

    let c = contribute(dir.path(), story_id, root, "Blossoms.");
    assert_eq!(like(dir.path(), story_id, &c)["promoted"], false);
    assert_eq!(like(dir.path(), story_id, &c)["promoted"], true);
}

#[test]
fn text_output_is_tab_separated() {
    let dir = init_project();
    let (story, _root) = create_story(dir.path());
    sf_cmd(dir.path())
        .args(["story", "list", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{story}\tongoing\t")));
}

//! Integration tests for the `kb` CLI.
//!
//! Each test creates a temp board folder, runs `kb` as a subprocess, and
//! verifies stdout and/or the files left on disk. The user config directory
//! is redirected into the temp dir so the recent-boards registry is isolated.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;

struct Fixture {
    _tmp: TempDir,
    board: PathBuf,
    config: PathBuf,
}

/// A board with "To Do" (two cards) and "Done" (empty).
fn create_test_board() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let board = tmp.path().join("board");
    let config = tmp.path().join("config");
    fs::create_dir_all(board.join("To Do")).unwrap();
    fs::create_dir_all(board.join("Done")).unwrap();
    fs::write(board.join("To Do/alpha.md"), "# alpha\n\nfirst card\n").unwrap();
    fs::write(board.join("To Do/beta.md"), "# beta\n\nsecond card\n").unwrap();
    Fixture {
        _tmp: tmp,
        board,
        config,
    }
}

fn kb_command(fx: &Fixture, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_kb"));
    cmd.args(args)
        .current_dir(&fx.board)
        .env("XDG_CONFIG_HOME", &fx.config)
        .env_remove("KB_LOG");
    cmd
}

/// Run `kb`, returning (stdout, stderr, success).
fn run_kb(fx: &Fixture, args: &[&str]) -> (String, String, bool) {
    let output = kb_command(fx, args).output().expect("failed to run kb");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run `kb` expecting success, return stdout.
fn run_kb_ok(fx: &Fixture, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_kb(fx, args);
    if !success {
        panic!("kb {:?} failed:\nstdout: {}\nstderr: {}", args, stdout, stderr);
    }
    stdout
}

fn item_order(board: &Path, column: &str) -> Vec<String> {
    let text = fs::read_to_string(board.join(".kanban.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    parsed["columns"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["folderName"] == column)
        .unwrap()["itemOrder"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

#[test]
fn test_show_default() {
    let fx = create_test_board();
    let out = run_kb_ok(&fx, &[]);
    assert!(out.starts_with("board\n"));
    assert!(out.contains("To Do (2)"));
    assert!(out.contains("  alpha.md  first card"));
    assert!(out.contains("Done (0)"));
    assert!(fx.board.join(".kanban.json").is_file());
}

#[test]
fn test_show_json() {
    let fx = create_test_board();
    let out = run_kb_ok(&fx, &["show", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["name"], "board");
    let columns = parsed["columns"].as_array().unwrap();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0]["folder"], "Done");
    assert_eq!(columns[1]["ungrouped"][1]["file"], "beta.md");
}

#[test]
fn test_show_unknown_column_fails() {
    let fx = create_test_board();
    let (_, stderr, success) = run_kb(&fx, &["show", "Backlog"]);
    assert!(!success);
    assert!(stderr.contains("error: column not found: Backlog"));
}

#[test]
fn test_board_dir_flag() {
    let fx = create_test_board();
    let out = Command::new(env!("CARGO_BIN_EXE_kb"))
        .args(["-C", fx.board.to_str().unwrap(), "show", "To Do"])
        .env("XDG_CONFIG_HOME", &fx.config)
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("beta.md"));
}

// ---------------------------------------------------------------------------
// Card commands
// ---------------------------------------------------------------------------

#[test]
fn test_add_rename_rm() {
    let fx = create_test_board();
    let out = run_kb_ok(&fx, &["add", "Done", "Ship it"]);
    assert_eq!(out.trim(), "Done/Ship it.md");
    assert_eq!(
        fs::read_to_string(fx.board.join("Done/Ship it.md")).unwrap(),
        "# Ship it\n\n"
    );

    let out = run_kb_ok(&fx, &["rename", "Done", "Ship it.md", "Shipped"]);
    assert!(out.contains("-> Shipped.md"));
    assert!(fx.board.join("Done/Shipped.md").is_file());
    assert_eq!(item_order(&fx.board, "Done"), vec!["Shipped.md"]);

    run_kb_ok(&fx, &["rm", "Done", "Shipped.md"]);
    assert!(!fx.board.join("Done/Shipped.md").exists());
    assert!(item_order(&fx.board, "Done").is_empty());
}

#[test]
fn test_write_reads_stdin() {
    let fx = create_test_board();
    let mut child = kb_command(&fx, &["write", "To Do", "beta.md"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"# beta\n\nrewritten\n")
        .unwrap();
    assert!(child.wait().unwrap().success());
    assert_eq!(
        fs::read_to_string(fx.board.join("To Do/beta.md")).unwrap(),
        "# beta\n\nrewritten\n"
    );
}

#[test]
fn test_mv_across_columns() {
    let fx = create_test_board();
    let out = run_kb_ok(&fx, &["mv", "To Do", "alpha.md", "--to", "Done"]);
    assert!(out.contains("Moved: To Do/alpha.md -> Done/alpha.md"));
    assert!(!fx.board.join("To Do/alpha.md").exists());
    assert!(fx.board.join("Done/alpha.md").exists());
    assert_eq!(item_order(&fx.board, "To Do"), vec!["beta.md"]);
    assert_eq!(item_order(&fx.board, "Done"), vec!["alpha.md"]);
}

#[test]
fn test_mv_reorder_and_group() {
    let fx = create_test_board();
    run_kb_ok(&fx, &["group", "add", "To Do", "Urgent"]);
    run_kb_ok(&fx, &["mv", "To Do", "beta.md", "--group", "Urgent"]);
    run_kb_ok(&fx, &["mv", "To Do", "beta.md", "--index", "0"]);
    assert_eq!(item_order(&fx.board, "To Do"), vec!["beta.md", "alpha.md"]);

    let sidecar = fs::read_to_string(fx.board.join("To Do/Urgent.json")).unwrap();
    let group: serde_json::Value = serde_json::from_str(&sidecar).unwrap();
    assert_eq!(group["itemFileNames"], serde_json::json!(["beta.md"]));

    run_kb_ok(&fx, &["mv", "To Do", "beta.md", "--ungroup"]);
    let sidecar = fs::read_to_string(fx.board.join("To Do/Urgent.json")).unwrap();
    assert!(sidecar.contains("\"itemFileNames\": []"));
}

#[test]
fn test_mv_unknown_item_fails() {
    let fx = create_test_board();
    let (_, stderr, success) = run_kb(&fx, &["mv", "To Do", "nope.md", "--to", "Done"]);
    assert!(!success);
    assert!(stderr.contains("item not found: To Do/nope.md"));
}

// ---------------------------------------------------------------------------
// Board structure
// ---------------------------------------------------------------------------

#[test]
fn test_column_lifecycle() {
    let fx = create_test_board();
    run_kb_ok(&fx, &["column", "add", "Review"]);
    assert!(fx.board.join("Review").is_dir());
    run_kb_ok(&fx, &["column", "mv", "Review", "0"]);
    run_kb_ok(&fx, &["column", "rename", "Review", "QA"]);
    assert!(fx.board.join("QA").is_dir());

    let out = run_kb_ok(&fx, &["show", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["columns"][0]["folder"], "QA");

    let (_, stderr, success) = run_kb(&fx, &["column", "add", "qa"]);
    assert!(!success);
    assert!(stderr.contains("already exists"));

    run_kb_ok(&fx, &["column", "rm", "QA"]);
    assert!(!fx.board.join("QA").exists());
}

#[test]
fn test_group_commands() {
    let fx = create_test_board();
    assert!(run_kb_ok(&fx, &["group", "add", "To Do", "Todo"]).contains("Todo"));
    assert!(run_kb_ok(&fx, &["group", "add", "To Do", "Todo"]).contains("Todo (1)"));
    run_kb_ok(&fx, &["group", "mv", "To Do", "Todo (1)", "0"]);
    run_kb_ok(&fx, &["group", "collapse", "To Do", "Todo (1)"]);

    let out = run_kb_ok(&fx, &["show", "To Do", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    let groups = parsed["columns"][0]["groups"].as_array().unwrap();
    assert_eq!(groups[0]["name"], "Todo (1)");
    assert_eq!(groups[0]["collapsed"], true);

    run_kb_ok(&fx, &["mv", "To Do", "alpha.md", "--group", "Todo"]);
    run_kb_ok(&fx, &["group", "move", "To Do", "Todo", "Done"]);
    assert!(fx.board.join("Done/alpha.md").exists());
    assert!(fx.board.join("Done/Todo.json").exists());
    assert!(!fx.board.join("To Do/Todo.json").exists());

    run_kb_ok(&fx, &["group", "rm", "Done", "Todo"]);
    assert!(!fx.board.join("Done/Todo.json").exists());
    assert!(fx.board.join("Done/alpha.md").exists());
}

#[test]
fn test_tag_commands() {
    let fx = create_test_board();
    run_kb_ok(&fx, &["tag", "create", "bug", "--color", "#E74C3C"]);
    let out = run_kb_ok(&fx, &["tag", "toggle", "bug", "To Do", "alpha.md"]);
    assert!(out.starts_with("Tagged"));
    run_kb_ok(&fx, &["tag", "rename", "bug", "defect"]);

    let out = run_kb_ok(&fx, &["tag", "list", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed[0]["name"], "defect");
    assert_eq!(parsed[0]["uses"], 1);

    let out = run_kb_ok(&fx, &["show", "To Do"]);
    assert!(out.contains("alpha.md  first card  [defect]"));

    let out = run_kb_ok(&fx, &["tag", "toggle", "defect", "To Do", "alpha.md"]);
    assert!(out.starts_with("Untagged"));
    run_kb_ok(&fx, &["tag", "rm", "defect"]);
    assert!(run_kb_ok(&fx, &["tag", "list"]).contains("No tags defined."));
}

#[test]
fn test_filter_hides_files() {
    let fx = create_test_board();
    fs::write(fx.board.join("To Do/notes.txt"), "plain").unwrap();
    assert!(run_kb_ok(&fx, &["show"]).contains("notes.txt"));

    let out = run_kb_ok(&fx, &["filter", "--include", "md"]);
    assert_eq!(out.trim(), "include: md");
    assert!(!run_kb_ok(&fx, &["show"]).contains("notes.txt"));

    run_kb_ok(&fx, &["filter", "--clear"]);
    assert!(run_kb_ok(&fx, &["show"]).contains("notes.txt"));
}

// ---------------------------------------------------------------------------
// Session commands
// ---------------------------------------------------------------------------

#[test]
fn test_recent_records_opened_boards() {
    let fx = create_test_board();
    run_kb_ok(&fx, &["show"]);
    let out = run_kb_ok(&fx, &["recent", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed[0]["name"], "board");

    let path = fx.board.canonicalize().unwrap();
    run_kb_ok(&fx, &["recent", "--remove", path.to_str().unwrap()]);
    assert!(run_kb_ok(&fx, &["recent"]).contains("No recent boards."));
}

#[test]
fn test_corrupt_config_is_reported_once() {
    let fx = create_test_board();
    fs::write(fx.board.join(".kanban.json"), "{ not json").unwrap();
    let (_, stderr, success) = run_kb(&fx, &["show"]);
    assert!(success);
    assert!(stderr.contains("was corrupt"));

    let (_, stderr, _) = run_kb(&fx, &["show"]);
    assert!(!stderr.contains("was corrupt"));
}

#[test]
fn test_watch_stops_after_duration() {
    let fx = create_test_board();
    let (_, _, success) = run_kb(&fx, &["watch", "--duration", "1", "--json"]);
    assert!(success);
}

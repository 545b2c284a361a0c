#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn flowguard(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("flowguard").unwrap();
    cmd.current_dir(dir.path())
        .env("FLOWGUARD_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn init_project(dir: &TempDir) {
    flowguard(dir).arg("init").assert().success();
}

fn json_output(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.arg("--json").output().unwrap();
    assert!(
        out.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).unwrap()
}

const SPEC_BODY: &str = "# Checkout\n\n\
## Functional Requirements\n\
- FR1: Cart total includes tax\n\
- FR2: Empty carts cannot be submitted\n\n\
## Technical Plan\n\
1. Add a tax calculator\n";

const CLEAN_DIFF: &str = "diff --git a/src/cart.rs b/src/cart.rs\n\
index 1111111..2222222 100644\n\
--- a/src/cart.rs\n\
+++ b/src/cart.rs\n\
@@ -1,2 +1,3 @@\n \
pub fn total(items: &[Item]) -> u64 {\n\
+    let tax = tax_for(items);\n \
}\n";

const SECRET_DIFF: &str = "diff --git a/src/client.rs b/src/client.rs\n\
--- a/src/client.rs\n\
+++ b/src/client.rs\n\
@@ -1,1 +1,2 @@\n \
fn connect() {}\n\
+    let api_key = \"sk-live-abcdef\";\n";

fn setup_epic_with_spec(dir: &TempDir) {
    init_project(dir);
    flowguard(dir)
        .args(["epic", "create", "checkout", "--title", "Checkout flow"])
        .assert()
        .success();
    let spec_file = dir.path().join("body.md");
    std::fs::write(&spec_file, SPEC_BODY).unwrap();
    flowguard(dir)
        .args(["spec", "create", "cart-total", "--epic", "checkout", "--file"])
        .arg(&spec_file)
        .assert()
        .success();
}

/// Point the project at a local Anthropic-compatible server.
fn use_mock_backend(dir: &TempDir, url: &str) {
    let path = dir.path().join(".flowguard/config.yaml");
    let config = std::fs::read_to_string(&path).unwrap();
    let mut value: serde_yaml::Value = serde_yaml::from_str(&config).unwrap();
    value["llm"] = serde_yaml::from_str(&format!(
        "backend:\n  type: anthropic\n  base_url: {url}\n  api_key_env: FLOWGUARD_TEST_KEY\n\
         retry:\n  max_attempts: 1\n"
    ))
    .unwrap();
    std::fs::write(&path, serde_yaml::to_string(&value).unwrap()).unwrap();
}

fn mock_match_without_deviations(server: &mut mockito::Server) -> mockito::Mock {
    server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"content":[{"type":"tool_use","id":"tu_1","name":"structured_output",
                "input":{"matchedRequirements":["FR1: Cart total includes tax"],
                         "deviations":[],"confidence":0.9}}]}"#,
        )
        .expect_at_least(1)
        .create()
}

// ---------------------------------------------------------------------------
// flowguard init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_directory_tree() {
    let dir = TempDir::new().unwrap();
    flowguard(&dir).arg("init").assert().success();

    assert!(dir.path().join(".flowguard").is_dir());
    assert!(dir.path().join(".flowguard/epics").is_dir());
    assert!(dir.path().join(".flowguard/specs").is_dir());
    assert!(dir.path().join(".flowguard/verifications").is_dir());
    assert!(dir.path().join(".flowguard/config.yaml").exists());
}

#[test]
fn init_is_idempotent_and_keeps_config() {
    let dir = TempDir::new().unwrap();
    flowguard(&dir)
        .args(["init", "--name", "shop"])
        .assert()
        .success();
    flowguard(&dir)
        .args(["init", "--name", "other"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exists"));

    let config = std::fs::read_to_string(dir.path().join(".flowguard/config.yaml")).unwrap();
    assert!(config.contains("shop"));
    assert!(!config.contains("other"));
}

#[test]
fn commands_before_init_fail() {
    let dir = TempDir::new().unwrap();
    flowguard(&dir)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

// ---------------------------------------------------------------------------
// flowguard epic / spec
// ---------------------------------------------------------------------------

#[test]
fn epic_create_and_list() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    flowguard(&dir)
        .args(["epic", "create", "checkout", "--title", "Checkout flow"])
        .assert()
        .success();

    let list = json_output(flowguard(&dir).args(["epic", "list"]));
    let epics = list.as_array().unwrap();
    assert_eq!(epics.len(), 1);
    assert_eq!(epics[0]["slug"], "checkout");
    assert_eq!(epics[0]["title"], "Checkout flow");
    assert_eq!(epics[0]["specs"], 0);
}

#[test]
fn epic_create_rejects_invalid_slug() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    flowguard(&dir)
        .args(["epic", "create", "Bad Slug"])
        .assert()
        .failure();
}

#[test]
fn epic_create_rejects_duplicate() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    flowguard(&dir)
        .args(["epic", "create", "checkout"])
        .assert()
        .success();
    flowguard(&dir)
        .args(["epic", "create", "checkout"])
        .assert()
        .failure();
}

#[test]
fn spec_create_requires_existing_epic() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    flowguard(&dir)
        .args(["spec", "create", "cart-total", "--epic", "missing"])
        .assert()
        .failure();
}

#[test]
fn spec_requirements_are_extracted() {
    let dir = TempDir::new().unwrap();
    setup_epic_with_spec(&dir);

    let reqs = json_output(flowguard(&dir).args(["spec", "requirements", "cart-total"]));
    let reqs: Vec<&str> = reqs
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r.as_str().unwrap())
        .collect();
    assert!(reqs.contains(&"FR1: Cart total includes tax"));
    assert!(reqs.contains(&"FR2: Empty carts cannot be submitted"));
}

#[test]
fn spec_list_filters_by_epic() {
    let dir = TempDir::new().unwrap();
    setup_epic_with_spec(&dir);
    flowguard(&dir)
        .args(["epic", "create", "search"])
        .assert()
        .success();
    flowguard(&dir)
        .args(["spec", "create", "ranking", "--epic", "search"])
        .assert()
        .success();

    let all = json_output(flowguard(&dir).args(["spec", "list"]));
    assert_eq!(all.as_array().unwrap().len(), 2);

    let checkout = json_output(flowguard(&dir).args(["spec", "list", "--epic", "checkout"]));
    let checkout = checkout.as_array().unwrap();
    assert_eq!(checkout.len(), 1);
    assert_eq!(checkout[0]["id"], "cart-total");

    flowguard(&dir)
        .args(["spec", "show", "cart-total"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cart total includes tax"));
}

// ---------------------------------------------------------------------------
// flowguard diff
// ---------------------------------------------------------------------------

#[test]
fn diff_parse_reports_stats() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("change.diff");
    std::fs::write(&path, CLEAN_DIFF).unwrap();

    let out = json_output(flowguard(&dir).args(["diff", "parse"]).arg(&path));
    assert_eq!(out["diff"]["stats"]["total_files"], 1);
    assert_eq!(out["diff"]["stats"]["additions"], 1);
    assert_eq!(out["diff"]["files"][0]["path"], "src/cart.rs");
}

#[test]
fn diff_detect_reads_stdin() {
    let dir = TempDir::new().unwrap();
    flowguard(&dir)
        .args(["diff", "detect"])
        .write_stdin(CLEAN_DIFF)
        .assert()
        .success()
        .stdout(predicate::str::diff("git\n"));
}

#[test]
fn diff_parse_rejects_unknown_format() {
    let dir = TempDir::new().unwrap();
    flowguard(&dir)
        .args(["diff", "parse", "--format", "svn"])
        .write_stdin(CLEAN_DIFF)
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// flowguard config / rules
// ---------------------------------------------------------------------------

#[test]
fn default_config_validates() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    flowguard(&dir).args(["config", "validate"]).assert().success();
}

#[test]
fn config_validate_flags_zero_concurrency() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let path = dir.path().join(".flowguard/config.yaml");
    let config = std::fs::read_to_string(&path).unwrap();
    let config = config.replace("rating_concurrency: 1", "rating_concurrency: 0");
    std::fs::write(&path, config).unwrap();

    flowguard(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"));
}

#[test]
fn rules_list_reflects_config_flags() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let path = dir.path().join(".flowguard/config.yaml");
    let mut config = std::fs::read_to_string(&path).unwrap();
    config.push_str("rules:\n  no-unresolved-markers: true\n");
    std::fs::write(&path, config).unwrap();

    let rules = json_output(flowguard(&dir).args(["rules", "list"]));
    let rules = rules.as_array().unwrap();
    let markers = rules
        .iter()
        .find(|r| r["id"] == "no-unresolved-markers")
        .unwrap();
    assert_eq!(markers["enabled"], true);
    assert_eq!(markers["enabled_by_default"], false);
    assert!(rules.iter().any(|r| r["id"] == "no-hardcoded-secrets"));
}

// ---------------------------------------------------------------------------
// flowguard verify / verification
// ---------------------------------------------------------------------------

#[test]
fn verify_requires_known_epic() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    flowguard(&dir)
        .args(["verify", "--epic", "missing"])
        .write_stdin(CLEAN_DIFF)
        .assert()
        .failure()
        .stderr(predicate::str::contains("epic 'missing' not found"));
}

#[test]
fn verification_list_starts_empty() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    flowguard(&dir)
        .args(["verification", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No verifications yet."));
}

#[test]
fn verify_clean_diff_is_approved_and_stored() {
    let dir = TempDir::new().unwrap();
    setup_epic_with_spec(&dir);
    let mut server = mockito::Server::new();
    let mock = mock_match_without_deviations(&mut server);
    use_mock_backend(&dir, &server.url());

    let out = json_output(
        flowguard(&dir)
            .env("FLOWGUARD_TEST_KEY", "test-key")
            .args(["verify", "--epic", "checkout", "--commit", "abc123"])
            .write_stdin(CLEAN_DIFF),
    );
    mock.assert();

    assert_eq!(out["summary"]["approval_status"], "approved");
    assert_eq!(out["summary"]["passed"], true);
    assert_eq!(out["spec_ids"][0], "cart-total");
    assert_eq!(out["source"]["commit_hash"], "abc123");

    let id = out["id"].as_str().unwrap();
    assert!(dir
        .path()
        .join(format!(".flowguard/verifications/{id}.yaml"))
        .exists());

    let listed = json_output(flowguard(&dir).args(["verification", "list"]));
    assert_eq!(listed[0]["id"], id);
}

#[test]
fn verify_strict_fails_on_hardcoded_secret() {
    let dir = TempDir::new().unwrap();
    setup_epic_with_spec(&dir);
    let mut server = mockito::Server::new();
    let _mock = mock_match_without_deviations(&mut server);
    use_mock_backend(&dir, &server.url());

    flowguard(&dir)
        .env("FLOWGUARD_TEST_KEY", "test-key")
        .args(["verify", "--epic", "checkout", "--strict"])
        .write_stdin(SECRET_DIFF)
        .assert()
        .failure()
        .stdout(predicate::str::contains("changes_requested"))
        .stdout(predicate::str::contains("Possible hardcoded secret"))
        .stdout(predicate::str::contains("Issues: 1 (Critical 1, High 0, Medium 0, Low 0)"));
}

#[test]
fn resolve_and_approve_update_stored_record() {
    let dir = TempDir::new().unwrap();
    setup_epic_with_spec(&dir);
    let mut server = mockito::Server::new();
    let _mock = mock_match_without_deviations(&mut server);
    use_mock_backend(&dir, &server.url());

    let out = json_output(
        flowguard(&dir)
            .env("FLOWGUARD_TEST_KEY", "test-key")
            .args(["verify", "--epic", "checkout"])
            .write_stdin(SECRET_DIFF),
    );
    let id = out["id"].as_str().unwrap().to_string();
    let issue = out["issues"][0]["id"].as_str().unwrap().to_string();

    flowguard(&dir)
        .args(["verification", "resolve", &id[..8], &issue[..8], "fixed"])
        .assert()
        .success();

    let shown = json_output(flowguard(&dir).args(["verification", "show", &id]));
    assert_eq!(shown["verification"]["issues"][0]["resolution"], "fixed");
    assert_eq!(shown["open_summary"]["total_issues"], 0);
    assert_eq!(
        shown["verification"]["summary"]["approval_status"],
        "changes_requested"
    );

    flowguard(&dir)
        .args(["verification", "approve", &id])
        .assert()
        .success();
    let shown = json_output(flowguard(&dir).args(["verification", "show", &id]));
    assert_eq!(shown["verification"]["summary"]["approval_status"], "approved");
    assert_eq!(shown["verification"]["summary"]["passed"], true);
}

#[test]
fn resolve_rejects_unknown_resolution() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    flowguard(&dir)
        .args(["verification", "resolve", "abc", "def", "maybe"])
        .assert()
        .failure();
}

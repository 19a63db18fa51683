use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn pfg_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("pfg");
    path
}

const MARKUP: &str = r#"{
  "grids": [
    {
      "id": "news-grid",
      "search": true,
      "sort": true,
      "clear": true,
      "facets": [
        {"param": "topic", "label": "Topic", "taxonomy": "category", "options": [
          {"label": "News", "token": "category:news", "slug": "news"},
          {"label": "Blog", "token": "category:blog", "slug": "blog"}
        ]}
      ],
      "cards": [
        {"id": 5, "terms": "category:news", "date": 100, "title": "metal prices", "search_text": "metal prices rise"},
        {"id": 7, "terms": "category:news", "date": 300, "title": "jazz", "search_text": "jazz night"},
        {"id": 9, "terms": "category:blog", "date": 200, "title": "heavy metal", "search_text": "heavy metal show"}
      ]
    }
  ]
}"#;

fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("pfg.toml");
    fs::write(
        &config_path,
        r#"[search]
debounce_ms = 10

[log]
level = "warn"
"#,
    )
    .unwrap();

    let markup_path = root.join("grid.json");
    fs::write(&markup_path, MARKUP).unwrap();

    (tmp, config_path, markup_path)
}

fn run_pfg(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = pfg_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pfg binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_query_json_restores_from_url() {
    let (_tmp, config, markup) = setup_test_env();
    let (stdout, stderr, success) = run_pfg(
        &config,
        &[
            "query",
            "--grid",
            markup.to_str().unwrap(),
            "--url",
            "http://localhost/?topic=news&sort=newest&utm=x",
            "--json",
        ],
    );
    assert!(success, "query failed: {}", stderr);

    let doc: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(doc["url"], "http://localhost/?utm=x&topic=news&sort=newest");
    let grid = &doc["grids"][0];
    assert_eq!(grid["id"], "news-grid");
    assert_eq!(grid["total"], 3);
    assert_eq!(grid["panel_open"], true);
    assert_eq!(grid["sort"], "newest");
    let ids: Vec<&str> = grid["visible"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["7", "5"]);
}

#[test]
fn test_query_local_search_and_no_results() {
    let (_tmp, config, markup) = setup_test_env();
    let (stdout, _, success) = run_pfg(
        &config,
        &[
            "query",
            "--grid",
            markup.to_str().unwrap(),
            "--url",
            "http://localhost/?q=metal",
        ],
    );
    assert!(success);
    assert!(stdout.contains("2 of 3 visible"));
    assert!(stdout.contains("[5] metal prices"));
    assert!(stdout.contains("[9] heavy metal"));

    let (stdout, _, success) = run_pfg(
        &config,
        &[
            "query",
            "--grid",
            markup.to_str().unwrap(),
            "--url",
            "http://localhost/?q=metal&topic=nope&topic2=blog",
        ],
    );
    assert!(success);
    assert!(stdout.contains("url: http://localhost/?topic2=blog&q=metal"));

    let (stdout, _, success) = run_pfg(
        &config,
        &[
            "query",
            "--grid",
            markup.to_str().unwrap(),
            "--url",
            "http://localhost/?q=zzz",
        ],
    );
    assert!(success);
    assert!(stdout.contains("0 of 3 visible"));
    assert!(stdout.contains("No results."));
}

#[test]
fn test_missing_config_uses_defaults() {
    let (tmp, _, markup) = setup_test_env();
    let missing = tmp.path().join("nope.toml");
    let (stdout, stderr, success) = run_pfg(
        &missing,
        &["query", "--grid", markup.to_str().unwrap()],
    );
    assert!(success, "query failed: {}", stderr);
    assert!(stdout.contains("3 of 3 visible"));
}

#[test]
fn test_invalid_config_fails() {
    let (tmp, _, markup) = setup_test_env();
    let bad = tmp.path().join("bad.toml");
    fs::write(&bad, "[search]\ndebounce_ms = 0\n").unwrap();
    let (_, stderr, success) = run_pfg(&bad, &["query", "--grid", markup.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("debounce_ms"));
}

#[test]
fn test_check_clean_and_broken_markup() {
    let (tmp, config, markup) = setup_test_env();
    let (stdout, _, success) = run_pfg(&config, &["check", "--grid", markup.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("OK: 1 grid(s)"));

    let broken = tmp.path().join("broken.json");
    fs::write(
        &broken,
        r#"{"id": "g", "facets": [{"param": "sort", "options": []}], "cards": [{"id": 1}, {"id": 1}]}"#,
    )
    .unwrap();
    let (stdout, _, success) = run_pfg(&config, &["check", "--grid", broken.to_str().unwrap()]);
    assert!(!success);
    assert!(stdout.contains("[g] facet uses reserved parameter 'sort'"));
    assert!(stdout.contains("duplicate card id '1'"));
}

#[test]
fn test_missing_markup_file_fails() {
    let (tmp, config, _) = setup_test_env();
    let missing = tmp.path().join("missing.json");
    let (_, _, success) = run_pfg(&config, &["query", "--grid", missing.to_str().unwrap()]);
    assert!(!success);
}

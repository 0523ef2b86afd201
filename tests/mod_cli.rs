use bson::doc;
use campusdb::cli::{Command, OutputMode, run_with_output};
use campusdb::config::AppConfig;
use campusdb::document::Document;
use campusdb::engine::Engine;
use tempfile::tempdir;

fn output(cfg: &AppConfig, cmd: Command, mode: OutputMode) -> String {
    let mut out = Vec::new();
    run_with_output(cfg, cmd, mode, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_tables_lists_default_set() {
    let text = output(&AppConfig::default(), Command::Tables, OutputMode::Human);
    let names: Vec<&str> = text.lines().collect();
    assert_eq!(names.len(), campusdb::registry::DEFAULT_TABLES.len());
    assert!(names.contains(&"students"));
}

#[test]
fn test_tables_json_includes_defaults() {
    let cfg: AppConfig = toml::from_str("[tables.news.defaults]\npublished = false\n").unwrap();
    let text = output(&cfg, Command::Tables, OutputMode::Json);
    let v: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
    assert_eq!(v["tables"]["news"]["published"], false);
    assert_eq!(v["allow_any_table"], false);
}

#[test]
fn test_collections_reports_counts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("campus.db");
    {
        let engine = Engine::open(&path).unwrap();
        let alumni = engine.create_collection("alumni");
        alumni.insert_document(Document::new(doc! {"name": "x"})).unwrap();
        alumni.insert_document(Document::new(doc! {"name": "y"})).unwrap();
    }
    let mut cfg = AppConfig::default();
    cfg.storage.path = path;
    assert_eq!(output(&cfg, Command::Collections, OutputMode::Human), "alumni records=2\n");
}

#[test]
fn test_check_config_rejects_bad_table_names() {
    let cfg: AppConfig = toml::from_str("[tables.\"Bad Name\"]\n").unwrap();
    let mut out = Vec::new();
    assert!(run_with_output(&cfg, Command::CheckConfig, OutputMode::Human, &mut out).is_err());

    let text = output(&AppConfig::default(), Command::CheckConfig, OutputMode::Human);
    let parsed: AppConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, AppConfig::default());
}

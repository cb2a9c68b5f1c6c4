use std::fs;
use std::process::Command;

use tempfile::TempDir;

#[test]
fn init_writes_a_parseable_default_project() {
    let root = TempDir::new().unwrap();
    let project_path = root.path().join("project.toml");

    let status = Command::new(env!("CARGO_BIN_EXE_shaderpad"))
        .args(["init", project_path.to_str().unwrap()])
        .status()
        .expect("failed to run shaderpad init");
    assert!(status.success());

    let contents = fs::read_to_string(&project_path).unwrap();
    let parsed: toml::Value = toml::from_str(&contents).expect("default project must be TOML");

    let main = parsed
        .get("main")
        .and_then(toml::Value::as_str)
        .expect("default project has an inline main");
    assert!(main.contains("fragColor"));

    let uniforms = parsed
        .get("uniforms")
        .and_then(toml::Value::as_array)
        .expect("default project has uniforms");
    assert!(!uniforms.is_empty());
    for uniform in uniforms {
        assert!(uniform.get("name").is_some());
        assert!(uniform.get("type").is_some());
    }
}

#[test]
fn init_creates_missing_directories() {
    let root = TempDir::new().unwrap();
    let nested = root.path().join("deeply/nested/project.toml");

    let status = Command::new(env!("CARGO_BIN_EXE_shaderpad"))
        .args(["init", nested.to_str().unwrap()])
        .status()
        .expect("failed to run shaderpad init");
    assert!(status.success());
    assert!(nested.exists());
}

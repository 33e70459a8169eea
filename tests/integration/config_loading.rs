//! Integration tests for configuration loading and precedence

use scribe::config::{ConfigLoader, ValidationError};
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

/// Serializes HOME and SCRIBE__* environment access across tests in this binary.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn with_env<F, R>(home: &Path, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let original_home = std::env::var("HOME").ok();
    std::env::set_var("HOME", home);
    for (key, value) in vars {
        std::env::set_var(key, value);
    }
    let result = f();
    for (key, _) in vars {
        std::env::remove_var(key);
    }
    match original_home {
        Some(h) => std::env::set_var("HOME", h),
        None => std::env::remove_var("HOME"),
    }
    result
}

fn write(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

#[test]
fn test_workspace_file_overrides_global_file() {
    let home = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write(
        &home.path().join(".config/scribe/config.toml"),
        r#"
[pipeline]
max_retries_per_step = 4
step_timeout_secs = 30

[provider]
model = "global-model"
"#,
    );
    write(
        &workspace.path().join("config/config.toml"),
        r#"
[pipeline]
max_retries_per_step = 1
"#,
    );

    let config = with_env(home.path(), &[], || ConfigLoader::load(workspace.path())).unwrap();

    assert_eq!(config.pipeline.max_retries_per_step, 1);
    assert_eq!(config.pipeline.step_timeout_secs, 30);
    assert_eq!(config.provider.model, "global-model");
    assert_eq!(config.output.directory, Path::new("output"));
}

#[test]
fn test_environment_overrides_files() {
    let home = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write(
        &workspace.path().join("config/config.toml"),
        "[pipeline]\nfailure_threshold = 5\n",
    );

    let config = with_env(
        home.path(),
        &[("SCRIBE__PIPELINE__FAILURE_THRESHOLD", "2")],
        || ConfigLoader::load(workspace.path()),
    )
    .unwrap();

    assert_eq!(config.pipeline.failure_threshold, Some(2));
}

#[test]
fn test_explicit_file_wins_and_must_exist() {
    let home = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let explicit = workspace.path().join("run.toml");
    write(
        &explicit,
        r#"
[pipeline]
sub_artifacts = false

[logging]
level = "warn"
"#,
    );

    let config = with_env(home.path(), &[], || {
        ConfigLoader::load_with_override(workspace.path(), Some(&explicit))
    })
    .unwrap();
    assert!(!config.pipeline.sub_artifacts);
    assert_eq!(config.logging.level, "warn");

    let missing = workspace.path().join("missing.toml");
    let err = with_env(home.path(), &[], || {
        ConfigLoader::load_with_override(workspace.path(), Some(&missing))
    })
    .unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_invalid_values_are_reported_per_section() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("bad.toml");
    write(
        &file,
        r#"
[pipeline]
stall_repeat_threshold = 1

[provider]
endpoint = ""
"#,
    );

    let config = ConfigLoader::load_from_file(&file).unwrap();
    let errors = config.validate().unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::Pipeline(msg) if msg.contains("stall_repeat_threshold"))));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::Provider(_))));
}

use kbase_server::config::{get_config, substitute_env, ConfigError};
use serial_test::serial;
use std::{env, io::Write};
use tempfile::NamedTempFile;

const VARS: &[&str] = &[
    "PORT",
    "DB_URL",
    "JWT_SECRET",
    "JWT_EXPIRY_HOURS",
    "UPLOAD_DIR",
    "FRONTEND_URL",
    "BCRYPT_COST",
    "MAX_UPLOAD_BYTES",
    "ACTIVITY",
    "KBASE_JWT_SECRET",
    "KBASE_PORT",
    "KBASE_ACTIVITY__CHANNEL_CAPACITY",
    "TEST_KBASE_SECRET",
    "TEST_KBASE_UPLOADS",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

fn yaml_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
#[serial]
fn defaults_apply_when_only_the_secret_is_set() {
    clear_env();
    env::set_var("JWT_SECRET", "s3cret");

    let config = get_config(None).expect("config loads");
    assert_eq!(config.port, 4000);
    assert_eq!(config.db_url, "db/kbase.db");
    assert_eq!(config.jwt_secret, "s3cret");
    assert_eq!(config.jwt_expiry_hours, 8);
    assert_eq!(config.upload_dir, "uploads");
    assert_eq!(config.bcrypt_cost, 12);
    assert_eq!(config.frontend_url, None);
    assert_eq!(config.activity.channel_capacity, 1024);
    assert_eq!(config.activity.cleanup_interval_hours, 24);
    clear_env();
}

#[test]
#[serial]
fn yaml_placeholders_are_substituted_and_env_wins() {
    clear_env();
    env::set_var("TEST_KBASE_SECRET", "from-env");
    env::set_var("TEST_KBASE_UPLOADS", "/srv/kb/uploads");
    let file = yaml_file(
        "port: 5000\n\
         jwt_secret: \"${TEST_KBASE_SECRET}\"\n\
         upload_dir: \"${TEST_KBASE_UPLOADS}\"\n\
         frontend_url: \"https://kb.example.com\"\n\
         activity:\n  channel_capacity: 64\n  cleanup_interval_hours: 0\n",
    );
    let path = file.path().to_string_lossy().into_owned();

    let config = get_config(Some(&path)).expect("config loads");
    assert_eq!(config.port, 5000);
    assert_eq!(config.jwt_secret, "from-env");
    assert_eq!(config.upload_dir, "/srv/kb/uploads");
    assert_eq!(config.frontend_url.as_deref(), Some("https://kb.example.com"));
    assert_eq!(config.activity.channel_capacity, 64);
    assert_eq!(config.activity.cleanup_interval_hours, 0);

    env::set_var("PORT", "6001");
    let config = get_config(Some(&path)).expect("config loads");
    assert_eq!(config.port, 6001);

    env::set_var("KBASE_PORT", "7001");
    let config = get_config(Some(&path)).expect("config loads");
    assert_eq!(config.port, 7001);
    clear_env();
}

#[test]
#[serial]
fn prefixed_variables_reach_nested_settings() {
    clear_env();
    env::set_var("KBASE_JWT_SECRET", "prefixed");
    env::set_var("KBASE_ACTIVITY__CHANNEL_CAPACITY", "4096");

    let config = get_config(None).expect("config loads");
    assert_eq!(config.jwt_secret, "prefixed");
    assert_eq!(config.activity.channel_capacity, 4096);
    clear_env();
}

#[test]
#[serial]
fn a_missing_secret_is_rejected() {
    clear_env();
    let err = get_config(None).expect_err("no secret");
    assert!(matches!(err, ConfigError::Invalid(_)), "got {err:?}");

    env::set_var("JWT_SECRET", "s3cret");
    env::set_var("BCRYPT_COST", "2");
    let err = get_config(None).expect_err("cost too low");
    assert!(matches!(err, ConfigError::Invalid(_)), "got {err:?}");
    clear_env();
}

#[test]
#[serial]
fn an_explicit_path_must_exist() {
    clear_env();
    let err = get_config(Some("/definitely/not/here/config.yml")).expect_err("missing file");
    assert!(matches!(err, ConfigError::NotFound(_)), "got {err:?}");
}

#[test]
#[serial]
fn unset_placeholders_become_empty() {
    clear_env();
    env::set_var("TEST_KBASE_SECRET", "abc");
    let out = substitute_env("a: ${TEST_KBASE_SECRET}\nb: \"${TEST_KBASE_UPLOADS}\"\n")
        .expect("substitutes");
    assert_eq!(out, "a: abc\nb: \"\"\n");
    clear_env();
}

use super::*;

#[test]
fn empty_document_uses_defaults() {
    let config = Config::from_toml_str("").expect("empty");
    assert_eq!(config, Config::default());
    assert_eq!(config.write.batch_size, DEFAULT_BATCH_SIZE);
    assert_eq!(config.read.batch_size, DEFAULT_BATCH_SIZE);
    assert_eq!(config.engine.or_pushdown, OrPushdownLevel::Full);
    assert_eq!(config.write.not_null_policy, NotNullPolicy::WarnDefault);
}

#[test]
fn full_document_parses() {
    let config = Config::from_toml_str(
        r#"
        [engine]
        or_pushdown = "same-field"

        [write]
        batch_size = 2
        not_null_policy = "reject"

        [read]
        batch_size = 16
        "#,
    )
    .expect("config");

    assert_eq!(config.engine.or_pushdown, OrPushdownLevel::SameField);
    assert_eq!(config.write.batch_size, 2);
    assert_eq!(config.write.not_null_policy, NotNullPolicy::Reject);
    assert_eq!(config.read.batch_size, 16);
}

#[test]
fn unknown_keys_are_rejected() {
    for text in [
        "[write]\nbatchsize = 3",
        "[cache]\nsize = 1",
        "[engine]\nor_pushdown = \"sometimes\"",
    ] {
        assert!(
            matches!(Config::from_toml_str(text), Err(ConfigError::Parse(_))),
            "{text}"
        );
    }
}

#[test]
fn zero_batch_sizes_are_invalid() {
    for text in ["[write]\nbatch_size = 0", "[read]\nbatch_size = 0"] {
        let err = Config::from_toml_str(text).expect_err(text);
        assert!(matches!(err, ConfigError::Invalid(_)), "{text}");
    }
}

#[test]
fn missing_files_report_the_path() {
    let err = Config::load("/nonexistent/geoarray.toml").expect_err("missing");
    assert!(matches!(err, ConfigError::Io { ref path, .. } if path.ends_with("geoarray.toml")));
}

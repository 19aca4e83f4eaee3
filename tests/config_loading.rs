// tests/config_loading.rs

use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;
use globmirror::config::load_and_validate;
use globmirror::errors::MirrorError;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn loads_mirrors_with_defaults_applied() {
    let file = config_file(
        r#"
[default]
clean = true
ignore = ["**/*.tmp"]

[mirror.docs]
source = "docs/**/*.md"
dest = "dist/docs"
update = true

[[mirror.docs.transform]]
kind = "replace"
pattern = "__VERSION__"
replacement = "1.0.0"

[mirror.assets]
source = "assets/*.svg"
dest = "dist/assets"
clean = false
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    let jobs = cfg.jobs();
    let root = file.path().parent().unwrap().to_path_buf();

    assert_eq!(jobs.len(), 2);
    // BTreeMap order.
    assert_eq!(jobs[0].name, "assets");
    assert!(!jobs[0].options.clean);
    assert_eq!(jobs[0].dest, root.join("dist/assets"));

    assert_eq!(jobs[1].name, "docs");
    assert!(jobs[1].options.clean);
    assert!(jobs[1].options.update);
    assert_eq!(jobs[1].options.ignore, vec!["**/*.tmp".to_string()]);
    assert_eq!(jobs[1].options.transform.len(), 1);
    assert_eq!(
        PathBuf::from(&jobs[1].source),
        root.join("docs/**/*.md")
    );
}

#[test]
fn config_without_mirrors_is_rejected() {
    let file = config_file("[default]\nclean = true\n");

    match load_and_validate(file.path()) {
        Err(MirrorError::ConfigError(msg)) => assert!(msg.contains("at least one")),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn invalid_glob_is_a_match_error() {
    let file = config_file(
        r#"
[mirror.broken]
source = "src/[a-"
dest = "out"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(MirrorError::Match { .. })
    ));
}

#[test]
fn invalid_replace_regex_names_the_mirror() {
    let file = config_file(
        r#"
[mirror.bad_regex]
source = "src/*.txt"
dest = "out"

[[mirror.bad_regex.transform]]
kind = "replace"
pattern = "("
replacement = ""
"#,
    );

    match load_and_validate(file.path()) {
        Err(MirrorError::ConfigError(msg)) => assert!(msg.contains("bad_regex")),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn zero_concurrency_is_rejected() {
    let file = config_file(
        r#"
[mirror.m]
source = "src/*.txt"
dest = "out"
max_concurrent_copies = 0
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(MirrorError::ConfigError(_))
    ));
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let file = config_file("[mirror.m\nsource = ");

    assert!(matches!(
        load_and_validate(file.path()),
        Err(MirrorError::TomlError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        load_and_validate("/definitely/not/here/Globmirror.toml"),
        Err(MirrorError::IoError(_))
    ));
}

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::NamedTempFile;

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("lawbot").expect("Binary exists");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync").and(predicate::str::contains("render")));
}

#[test]
fn missing_config_fails() {
    let mut cmd = Command::cargo_bin("lawbot").expect("Binary exists");
    cmd.args(["--config", "/nonexistent/lawbot.yaml", "sync", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn silent_and_verbose_conflict() {
    let mut cmd = Command::cargo_bin("lawbot").expect("Binary exists");
    cmd.args(["--silent", "--verbose", "sync"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn empty_pipeline_config_fails_before_network() {
    let config = NamedTempFile::new().expect("temp config");
    write(
        config.path(),
        concat!(
            "wiki:\n",
            "  host: http://127.0.0.1:9\n",
            "  category: laws\n",
            "  source_suffix: /source\n",
            "  category_marker: \"[[Category:laws]]\"\n",
            "pipeline:\n",
            "  stages: []\n",
        ),
    )
    .expect("write config");

    let mut cmd = Command::cargo_bin("lawbot").expect("Binary exists");
    cmd.arg("--config")
        .arg(config.path())
        .args(["render", "Law"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pipeline.stages"));
}

mod common;

use common::Subjects;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

#[test]
fn verbose_prints_progress_messages() {
    let subjects = Subjects::three_layer();
    subjects
        .cmd()
        .args(["-s", "sample", "--homog", "0.3", "-v", "-d"])
        .arg(subjects.dir())
        .assert()
        .success()
        .stderr(contains("Creating the BEM geometry"))
        .stderr(contains("Surfaces passed the basic topology checks"));
}

#[test]
fn default_run_is_quiet() {
    let subjects = Subjects::three_layer();
    subjects
        .cmd()
        .args(["-s", "sample", "--homog", "0.3", "-d"])
        .arg(subjects.dir())
        .assert()
        .success()
        .stderr(contains("Creating the BEM geometry").not())
        .stderr(contains("INFO").not());
}

#[test]
fn rust_log_raises_the_default_level() {
    let subjects = Subjects::three_layer();
    subjects
        .cmd()
        .env("RUST_LOG", "info")
        .args(["-s", "sample", "--homog", "0.3", "-d"])
        .arg(subjects.dir())
        .assert()
        .success()
        .stderr(contains("Creating the BEM geometry"))
        .stderr(contains("DEBUG").not());
}

#[test]
fn rust_log_overrides_verbose() {
    let subjects = Subjects::three_layer();
    subjects
        .cmd()
        .env("RUST_LOG", "error")
        .args(["-s", "sample", "--homog", "0.3", "-v", "-d"])
        .arg(subjects.dir())
        .assert()
        .success()
        .stderr(contains("Creating the BEM geometry").not());
}

#[test]
fn errors_are_reported_regardless_of_level() {
    let subjects = Subjects::new(&[("inner_skull.surf", 80.0)]);
    subjects
        .cmd()
        .env("RUST_LOG", "off")
        .args(["-s", "sample", "-d"])
        .arg(subjects.dir())
        .assert()
        .code(1)
        .stderr(contains("error: "));
}

#![cfg(unix)]

use regex::Regex;

use crate::common::TestContext;

const PASSING: &str = "\
Feature: Search

  Scenario: By name
    Given a product
    When they search for it
    Then it is listed
";

const FAILING: &str = "\
@cart
Feature: Cart

  Scenario: Add
    Given a product
    When they add it
    Then the cart has one item
";

fn project() -> TestContext {
    let context = TestContext::with_files([
        ("features/failing.feature", FAILING),
        ("features/passing.feature", PASSING),
    ]);
    let runtime = context.write_fake_runtime();
    context.write_file(
        "shardci.toml",
        &format!(
            r#"
[runtime]
program = "{}"

[database]
warmup-secs = 0

[[services]]
name = "redis"
image = "redis"
warmup-secs = 0
"#,
            runtime.display()
        ),
    );
    context
}

fn run_shardci(context: &TestContext, extra: &[&str]) -> (Option<i32>, String) {
    let output = context
        .command()
        .args(["--name", "App", "--id", "abc123", "--strategy", "positional"])
        .args(extra)
        .output()
        .expect("Failed to run shardci");

    (
        output.status.code(),
        String::from_utf8_lossy(&output.stdout).into_owned(),
    )
}

fn assert_row(stdout: &str, pattern: &str) {
    let regex = Regex::new(&format!("(?m)^{pattern}$")).expect("valid regex");
    assert!(regex.is_match(stdout), "no row matching `{pattern}` in:\n{stdout}");
}

#[test]
fn failing_shard_fails_the_build() {
    let context = project();

    let (code, stdout) = run_shardci(&context, &["--max-runs", "2"]);

    assert_eq!(code, Some(1), "{stdout}");
    assert!(stdout.contains("===> Running build in 2 runs + rspec run"), "{stdout}");
    assert!(stdout.contains("===> Results"), "{stdout}");
    assert_row(&stdout, "RUN +SUCCESS +DURATION");
    assert_row(&stdout, r"1 +false +\d+s +Run failed");
    assert_row(&stdout, r"2 +true +\d+s");
    assert_row(&stdout, r"rspec +true +\d+s");
    assert!(
        stdout.contains("     Run 1 stdout:\n1 scenario (1 failed)\n     Run 1 stderr:\nboom\n"),
        "{stdout}"
    );

    let log = context.read_file("runtime.log");
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.first(), Some(&format!("build -t app {}", context.root().display()).as_str()));
    assert!(log.contains("run -d --name app-abc123-db -e MYSQL_ROOT_PASSWORD=jenkins mariadb:latest"));
    assert!(log.contains("rm -f -v app-abc123-1 app-abc123-1-redis"));
    assert!(log.contains("rm -f -v app-abc123-rspec app-abc123-rspec-redis"));
    assert_eq!(lines.last(), Some(&"rm -f -v app-abc123-db"));
}

#[test]
fn passing_build_with_tag_filter() {
    let context = project();

    let (code, stdout) = run_shardci(&context, &["--max-runs", "4", "--tags", "~cart"]);

    assert_eq!(code, Some(0), "{stdout}");
    assert!(stdout.contains("===> Running build in 1 runs + rspec run"), "{stdout}");
    assert_row(&stdout, r"1 +true +\d+s");

    let log = context.read_file("runtime.log");
    assert!(
        log.contains("--tags ~cart features/passing.feature"),
        "{log}"
    );
    assert!(!log.contains("failing.feature"), "{log}");
    assert!(context.root().join("features/reports/1").is_dir());
}

#[test]
fn commit_on_failure() {
    let context = project();

    let (code, stdout) = run_shardci(&context, &["--max-runs", "2", "--commit"]);

    assert_eq!(code, Some(1), "{stdout}");
    assert!(stdout.contains("Run 1 failed, committing as app-abc123-1"), "{stdout}");
    assert!(context.read_file("runtime.log").contains("commit app-abc123-1 app-abc123-1"));
}

#[test]
fn verbose_lists_selected_features() {
    let context = project();

    let (_, stdout) = run_shardci(&context, &["--max-runs", "2", "-v"]);

    assert_row(&stdout, "features/failing.feature +3");
    assert_row(&stdout, "features/passing.feature +3");
}

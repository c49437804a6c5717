use insta_cmd::assert_cmd_snapshot;

use crate::common::TestContext;

#[test]
fn missing_build_name() {
    let context = TestContext::new();

    assert_cmd_snapshot!(context.command(), @r"
    success: false
    exit_code: 2
    ----- stdout -----

    ----- stderr -----
    shardci failed
      Cause: Must specify a build name (`--name` or `JOB_NAME`)
    ");
}

#[test]
fn blank_build_name_from_environment() {
    let context = TestContext::new();

    let output = context
        .command()
        .env("JOB_NAME", "  ")
        .output()
        .expect("Failed to run shardci");

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Must specify a build name"));
}

#[cfg(unix)]
#[test]
fn missing_build_directory() {
    let context = TestContext::new();

    assert_cmd_snapshot!(context.command().args(["--name", "Shop", "--id", "abc123", "--path", "missing"]), @r"
    success: false
    exit_code: 2
    ----- stdout -----
    ===> Starting build abc123 of shop
         Changing working directory to [TEMP_DIR]/missing

    ----- stderr -----
    shardci failed
      Cause: Failed to change working directory to `[TEMP_DIR]/missing`
      Cause: No such file or directory (os error 2)
    ");
}

#[test]
fn invalid_config_file() {
    let context = TestContext::with_files([("shardci.toml", "[runtime]\nprogramme = \"docker\"\n")]);

    let output = context
        .command()
        .args(["--name", "shop", "--id", "abc123"])
        .output()
        .expect("Failed to run shardci");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr.contains("Failed to parse"), "{stderr}");
    assert!(stderr.contains("shardci.toml"), "{stderr}");
}

#[test]
fn runtime_not_found() {
    let context = TestContext::with_files([(
        "shardci.toml",
        "[runtime]\nprogram = \"shardci-missing-runtime\"\n",
    )]);

    let output = context
        .command()
        .args(["--name", "shop", "--id", "abc123"])
        .output()
        .expect("Failed to run shardci");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(2));
    assert!(
        stderr.contains("Container runtime `shardci-missing-runtime` was not found"),
        "{stderr}"
    );
}

#[cfg(unix)]
#[test]
fn image_build_failure() {
    let context = TestContext::with_files([
        ("shardci.toml", "[runtime]\nprogram = \"false\"\n"),
        ("config/database.ci.yml", "test: {}\n"),
        ("spec/reports/old.xml", "<old/>"),
    ]);

    assert_cmd_snapshot!(context.command().args(["--name", "shop", "--id", "abc123"]), @r"
    success: false
    exit_code: 2
    ----- stdout -----
    ===> Starting build abc123 of shop
         Changing working directory to [TEMP_DIR]
    ===> Preparing config files and cleaning old reports
    ===> Building base image

    ----- stderr -----
    shardci failed
      Cause: Building image `shop` failed
      Cause: `false build` exited with exit status: 1
    ");

    assert_eq!(context.read_file("config/database.yml"), "test: {}\n");
    assert!(!context.root().join("config/database.ci.yml").exists());
    assert!(!context.root().join("spec/reports").exists());
}

use std::path::{Path, PathBuf};
use std::process::Command;

use insta::internals::SettingsBindDropGuard;
use insta_cmd::get_cargo_bin;
use tempfile::TempDir;

pub(crate) struct TestContext {
    _temp_dir: TempDir,
    project_dir: PathBuf,
    _settings_scope: SettingsBindDropGuard,
}

impl TestContext {
    pub(crate) fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        let project_dir = dunce::canonicalize(temp_dir.path())
            .expect("Failed to canonicalize project path");

        let mut settings = insta::Settings::clone_current();
        settings.add_filter(&regex::escape(&project_dir.display().to_string()), "[TEMP_DIR]");
        let settings_scope = settings.bind_to_scope();

        Self {
            _temp_dir: temp_dir,
            project_dir,
            _settings_scope: settings_scope,
        }
    }

    pub(crate) fn with_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let context = Self::new();
        for (path, content) in files {
            context.write_file(path, content);
        }
        context
    }

    pub(crate) fn root(&self) -> &Path {
        &self.project_dir
    }

    pub(crate) fn write_file(&self, path: impl AsRef<Path>, content: &str) {
        let path = self.project_dir.join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
    }

    /// A fake container runtime that logs every invocation to `runtime.log`.
    ///
    /// Invocations mentioning `failing` exit with status 1.
    #[cfg(unix)]
    pub(crate) fn write_fake_runtime(&self) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = self.project_dir.join("fake-runtime");
        std::fs::write(
            &script,
            r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/runtime.log"
case "$*" in
  *failing*)
    echo "1 scenario (1 failed)"
    echo "boom" >&2
    exit 1
    ;;
esac
"#,
        )
        .expect("Failed to write fake runtime");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make fake runtime executable");
        script
    }

    pub(crate) fn read_file(&self, path: impl AsRef<Path>) -> String {
        std::fs::read_to_string(self.project_dir.join(path)).expect("Failed to read file")
    }

    pub(crate) fn command(&self) -> Command {
        let mut command = Command::new(get_cargo_bin("shardci"));
        command
            .current_dir(&self.project_dir)
            .arg("--color")
            .arg("never")
            .env_remove("JOB_NAME")
            .env_remove("BUILD_ID")
            .env_remove("CUCUMBER_TAGS")
            .env_remove("CUCUMBER_SLOW_TAGS")
            .env_remove("SHARDCI_CONFIG_FILE")
            .env_remove("SHARDCI_LOG")
            .env_remove("SHARDCI_MAX_PARALLELISM");
        command
    }
}

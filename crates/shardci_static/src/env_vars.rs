/// Declares all environment variables read by shardci.
pub struct EnvVars;

impl EnvVars {
    /// Default build name when `--name` is not given.
    pub const JOB_NAME: &'static str = "JOB_NAME";

    /// Default build identifier when `--id` is not given.
    pub const BUILD_ID: &'static str = "BUILD_ID";

    /// Comma separated tag selectors, `~tag` rejects.
    pub const CUCUMBER_TAGS: &'static str = "CUCUMBER_TAGS";

    /// Comma separated tags that double a feature file's weight.
    pub const CUCUMBER_SLOW_TAGS: &'static str = "CUCUMBER_SLOW_TAGS";

    /// Path to a `shardci.toml` to use instead of the one in the execution path.
    pub const SHARDCI_CONFIG_FILE: &'static str = "SHARDCI_CONFIG_FILE";

    /// Overrides the detected number of logical CPUs.
    pub const SHARDCI_MAX_PARALLELISM: &'static str = "SHARDCI_MAX_PARALLELISM";

    /// `tracing` filter directives, e.g. `shardci_runner=debug`.
    pub const SHARDCI_LOG: &'static str = "SHARDCI_LOG";
}

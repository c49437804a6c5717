mod command;
mod executor;
mod identity;
mod lifecycle;
mod orchestration;
mod partition;
mod results;
mod runtime;
mod shutdown;

#[cfg(test)]
mod testing;

pub use command::{CommandError, CommandOutput};
pub use executor::{OutcomeKind, RunOutcome, ShardExecutor, ShardJob};
pub use identity::{BuildIdentity, ShardId, ShardResources};
pub use lifecycle::{LifecycleState, ServiceLifecycle, ShardInfraError, Verdict};
pub use orchestration::{RunConfig, RunCoordinator, SetupError, prepare_workspace};
pub use partition::{Shard, Weighted, partition_files, partition_positional, partition_weighted};
pub use results::{ResultAggregator, RunSummary};
pub use runtime::{CliRuntime, ContainerRuntime, ContainerSpec};
pub use shutdown::{InterruptWatcher, emergency_teardown, shutdown_receiver};

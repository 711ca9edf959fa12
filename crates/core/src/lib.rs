pub mod commands;
pub mod config;
pub mod filelist;
pub mod invoker;
pub mod metrics;
pub mod orchestrator;
pub mod run_state;
pub mod testing;

pub use commands::CommandPlanner;
pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError, FailurePolicy, RunPaths,
};
pub use filelist::{Filelist, FilelistError};
pub use invoker::{
    Invocation, InvocationOutcome, InvokerError, ProcessInvoker, Step, TokioProcessInvoker,
};
pub use orchestrator::{BenchOrchestrator, ItemOutcome, ItemResult, OrchestratorError, RunSummary};
pub use run_state::{DirectoryRunStore, ItemStatus, RunRecord, RunStore, RunStoreError};

//! Launches a job of simulated processes on threads and bootstraps each one
//! against the in-process registry.

use std::ffi::OsString;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use cohort_runtime::sim::SimCluster;
use cohort_runtime::{ArgsConfigLoader, ConfigLoader, InitStatus, Runtime};
use cohort_types::{JobId, ThreadLevel};

#[derive(Debug, Parser)]
#[command(name = "cohort-launch", about = "Bootstrap a simulated Cohort job")]
struct LaunchArgs {
    /// Number of processes in the job.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    procs: u32,
    /// Thread level each process requests.
    #[arg(long, default_value_t = ThreadLevel::Single)]
    thread_level: ThreadLevel,
    /// Arguments handed to every process's configuration loader.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    runtime_args: Vec<OsString>,
}

fn main() -> ExitCode {
    let args = LaunchArgs::parse();
    let cluster = SimCluster::new(JobId::new(1), args.procs);
    let loader: Arc<dyn ConfigLoader> = Arc::new(ArgsConfigLoader);

    let mut handles = Vec::new();
    for rank in 0..args.procs {
        let collaborators = match cluster.collaborators(rank, Arc::clone(&loader)) {
            Ok(collaborators) => collaborators,
            Err(error) => {
                tracing::error!(target: "cohort_launch", rank, %error, "failed to build catalog");
                return ExitCode::FAILURE;
            }
        };
        let runtime_args = args.runtime_args.clone();
        let requested = args.thread_level;
        let spawned = thread::Builder::new()
            .name(format!("rank-{rank}"))
            .spawn(move || {
                let runtime = Runtime::new(collaborators);
                runtime
                    .initialize(&runtime_args, requested)
                    .map_err(|error| error.status())
            });
        match spawned {
            Ok(handle) => handles.push((rank, handle)),
            Err(error) => {
                tracing::error!(target: "cohort_launch", rank, %error, "failed to spawn process thread");
                return ExitCode::FAILURE;
            }
        }
    }

    let mut worst = InitStatus::Success;
    for (rank, handle) in handles {
        match handle.join() {
            Ok(Ok(provided)) => {
                tracing::info!(target: "cohort_launch", rank, %provided, "process running");
            }
            Ok(Err(status)) => {
                tracing::error!(target: "cohort_launch", rank, %status, "process failed to start");
                if worst == InitStatus::Success {
                    worst = status;
                }
            }
            Err(_) => {
                tracing::error!(target: "cohort_launch", rank, "process thread panicked");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::from(u8::try_from(worst.code()).unwrap_or(1))
}

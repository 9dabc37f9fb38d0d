pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod sources;
pub mod staging;
pub mod types;
pub mod upload_client;
pub mod workflow;

#[cfg(test)]
mod test_harness;

use clap::Parser;

pub use errors::UploadError;
pub use sources::{CategorySource, FileImageSource, ImageSource, MemoryImageSource};
pub use types::{CropType, SelectionState, UploadResult};
pub use workflow::{AttemptPhase, UploadWorkflow};

/// Parse arguments, run the requested command and return the exit code
pub fn run() -> i32 {
    let cli = cli::Cli::parse();
    let _log_guard = logging::init(cli.verbose);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Starting crop-diagnosis-uploader");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start async runtime");
            return cli::EXIT_UPLOAD_FAILED;
        }
    };

    runtime.block_on(cli::execute(cli))
}

//! Command-line host for the upload workflow.
//!
//! Plays the part of the upload screen: the `--image` flag is the picker,
//! `--crop` is the dropdown and stdout is the result text view.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::{parse_timeout_secs, UploaderConfig, ENDPOINT_ENV_VAR, TIMEOUT_ENV_VAR};
use crate::sources::{CategorySource, FileImageSource, ImageSource};
use crate::staging::StagingArea;
use crate::types::{CropType, SelectionState, UploadResult, MISSING_IMAGE_PROMPT};
use crate::upload_client::CropUploadClient;
use crate::workflow::UploadWorkflow;

pub const EXIT_OK: i32 = 0;
pub const EXIT_UPLOAD_FAILED: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Crop Diagnosis Uploader - send a leaf photo to the disease classifier
#[derive(Parser, Debug)]
#[command(name = "crop-diagnosis-uploader", version)]
#[command(about = "Upload a leaf photo and crop type for disease classification")]
pub struct Cli {
    /// Log at debug level (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload one image and print the classifier's answer
    Upload {
        /// Image to classify
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Crop shown in the photo
        #[arg(short, long, default_value_t = CropType::Apple, value_parser = parse_crop)]
        crop: CropType,

        /// Endpoint URL, overriding config and environment
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Request timeout in seconds
        #[arg(short, long, value_parser = parse_timeout_secs)]
        timeout: Option<u64>,

        /// Print the result as JSON instead of display text
        #[arg(long)]
        json: bool,
    },
    /// List the crop types the classifier accepts
    Crops,
    /// Inspect or change the saved configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Save a new endpoint URL
    SetEndpoint { url: String },
    /// Save a new request timeout in seconds
    SetTimeout {
        #[arg(value_parser = parse_timeout_secs)]
        secs: u64,
    },
}

fn parse_crop(raw: &str) -> Result<CropType, String> {
    raw.parse()
}

/// Execute a parsed command and return the process exit code
pub async fn execute(cli: Cli) -> i32 {
    match cli.command {
        Command::Upload {
            image,
            crop,
            endpoint,
            timeout,
            json,
        } => {
            let config = match load_effective_config(endpoint, timeout) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("{}", e);
                    return EXIT_USAGE;
                }
            };
            let image = image
                .map(|path| Arc::new(FileImageSource::new(path)) as Arc<dyn ImageSource>);
            run_upload(&config, image, &crop, json).await
        }
        Command::Crops => {
            for crop in CropType::ALL {
                println!("{}", crop);
            }
            EXIT_OK
        }
        Command::Config { action } => run_config(action),
    }
}

/// Saved config, then environment, then flags
fn load_effective_config(
    endpoint: Option<String>,
    timeout: Option<u64>,
) -> Result<UploaderConfig, String> {
    let saved = UploaderConfig::load()?;
    Ok(resolve_config(
        saved,
        std::env::var(ENDPOINT_ENV_VAR).ok().as_deref(),
        std::env::var(TIMEOUT_ENV_VAR).ok().as_deref(),
        endpoint,
        timeout,
    ))
}

/// Layer environment values and flags over an already loaded config
pub fn resolve_config(
    saved: UploaderConfig,
    env_endpoint: Option<&str>,
    env_timeout: Option<&str>,
    flag_endpoint: Option<String>,
    flag_timeout: Option<u64>,
) -> UploaderConfig {
    saved
        .apply_overrides(env_endpoint, env_timeout)
        .apply_flags(flag_endpoint, flag_timeout)
}

pub fn build_workflow(config: &UploaderConfig) -> UploadWorkflow {
    let staging = config
        .staging_dir
        .clone()
        .map(StagingArea::new)
        .unwrap_or_default();
    UploadWorkflow::new(
        CropUploadClient::with_timeout(config.endpoint_url.clone(), config.timeout()),
        staging,
    )
}

/// Submit one selection and print the result; returns the exit code
pub async fn run_upload(
    config: &UploaderConfig,
    image: Option<Arc<dyn ImageSource>>,
    category: &dyn CategorySource,
    json: bool,
) -> i32 {
    let selection = SelectionState {
        image,
        crop: category.selected(),
    };

    if !selection.is_ready() {
        eprintln!("{}", MISSING_IMAGE_PROMPT);
        return EXIT_USAGE;
    }

    let workflow = build_workflow(config);
    tracing::info!(endpoint = %workflow.endpoint_url(), "Submitting upload");
    let result = workflow.submit(&selection).await;

    print_result(&result, json);
    exit_code_for(&result)
}

fn print_result(result: &UploadResult, json: bool) {
    if json {
        match serde_json::to_string_pretty(result) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to serialize result: {}", e),
        }
    } else {
        println!("{}", result.display_text());
    }
}

pub fn exit_code_for(result: &UploadResult) -> i32 {
    if result.is_success() {
        EXIT_OK
    } else {
        EXIT_UPLOAD_FAILED
    }
}

fn run_config(action: ConfigAction) -> i32 {
    let outcome = match action {
        ConfigAction::Show => UploaderConfig::load().and_then(|config| {
            let config = config.apply_env();
            serde_json::to_string_pretty(&config)
                .map(|text| println!("{}", text))
                .map_err(|e| format!("Failed to serialize config: {}", e))
        }),
        ConfigAction::SetEndpoint { url } => reqwest::Url::parse(&url)
            .map_err(|e| format!("Invalid endpoint URL: {}", e))
            .and_then(|_| update_config(|config| config.endpoint_url = url)),
        ConfigAction::SetTimeout { secs } => update_config(|config| config.timeout_secs = secs),
    };

    match outcome {
        Ok(()) => EXIT_OK,
        Err(e) => {
            eprintln!("{}", e);
            EXIT_USAGE
        }
    }
}

fn update_config(change: impl FnOnce(&mut UploaderConfig)) -> Result<(), String> {
    let mut config = UploaderConfig::load()?;
    change(&mut config);
    let path = config.save()?;
    println!("Saved {}", path.display());
    Ok(())
}

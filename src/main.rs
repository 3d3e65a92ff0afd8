//! Stagehand - interactive model staging
//!
//! Opens a window around the editing core: click to select imported models,
//! drag the gizmo to move/rotate/scale them, drop or open glTF packages.
//!
//! Usage: `stagehand [--config <file.json>] [model files...]`

mod app;

use clap::Parser;
use stagehand::config::EditorConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(about = "Stage glTF models: pick, move, rotate and scale them")]
struct Cli {
    /// Editor settings (JSON). Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// .gltf/.glb files and their companions, imported as one set at startup
    models: Vec<PathBuf>,
}

impl Cli {
    fn into_options(self) -> Result<app::AppOptions, String> {
        let config = match &self.config {
            Some(path) => EditorConfig::load(path)
                .map_err(|err| format!("failed to load {}: {err}", path.display()))?,
            None => EditorConfig::default(),
        };
        Ok(app::AppOptions {
            config,
            models: self.models,
        })
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let options = match Cli::parse().into_options() {
        Ok(options) => options,
        Err(message) => {
            log::error!("{message}");
            return ExitCode::FAILURE;
        }
    };

    match app::run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("Event loop error: {err}");
            ExitCode::FAILURE
        }
    }
}

// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extracts the step payload from a captured device log and prints the decoded steps.

use camino::Utf8PathBuf;
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, bail};
use std::io::{BufRead, BufReader};
use stepwise_runner::{
    config::StepsCaptureConfig,
    logcat::StepPayloadParser,
    output::{Color, OutputContext},
    steps::try_decode_steps,
};
use tracing::info;

/// Extract steps from a captured device log.
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    /// Path to the captured device log.
    log_file: Utf8PathBuf,

    /// Path to a TOML file overriding the capture settings.
    #[arg(long, value_name = "PATH")]
    config: Option<Utf8PathBuf>,

    /// Show debug output.
    #[arg(long, short)]
    verbose: bool,

    /// Produce color output.
    #[arg(long, value_enum, default_value_t)]
    color: Color,
}

impl App {
    fn exec(self) -> Result<()> {
        OutputContext {
            verbose: self.verbose,
            color: self.color,
        }
        .init();

        let config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .wrap_err_with(|| format!("failed to read config `{path}`"))?;
                StepsCaptureConfig::from_toml_str(path.as_str(), &text)?
            }
            None => StepsCaptureConfig::default(),
        };

        let file = std::fs::File::open(&self.log_file)
            .wrap_err_with(|| format!("failed to open `{}`", self.log_file))?;
        let mut parser = StepPayloadParser::from_config(&config);
        for line in BufReader::new(file).lines() {
            let line = line.wrap_err_with(|| format!("failed to read `{}`", self.log_file))?;
            parser.feed(&line);
        }

        let dropped = parser.dropped_lines();
        let Some(payload) = parser.finish() else {
            bail!("no step payload found in `{}`", self.log_file);
        };
        info!("found step payload ({dropped} interleaved lines dropped)");

        let steps = try_decode_steps(&payload)
            .wrap_err_with(|| format!("step payload in `{}` is malformed", self.log_file))?;
        println!("{}", serde_json::to_string_pretty(&steps)?);
        Ok(())
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    App::parse().exec()
}

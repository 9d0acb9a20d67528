// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration of diagnostic output: colorization and log levels.
//!
//! Diagnostics are emitted through `tracing`. Libraries embedding stepwise can install their own
//! subscriber instead of calling [`OutputContext::init`].

use clap::ValueEnum;
use owo_colors::{OwoColorize, Style, style};
use std::fmt;
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// The environment variable used to override log filtering, in `tracing` targets syntax.
pub const LOG_ENV: &str = "STEPWISE_LOG";

/// Diagnostic output options, typically taken from the command line.
#[derive(Copy, Clone, Debug, Default)]
#[must_use]
pub struct OutputContext {
    /// Whether debug-level diagnostics are shown.
    pub verbose: bool,

    /// How colorization is determined.
    pub color: Color,
}

impl OutputContext {
    /// Installs a global subscriber writing diagnostics to standard error.
    ///
    /// Only the first call has any effect.
    pub fn init(self) {
        let mut log_styles = LogStyles::default();
        if self.color.should_colorize(supports_color::Stream::Stderr) {
            log_styles.colorize();
        }

        INIT_LOGGER.call_once(|| {
            let default_level = if self.verbose {
                LevelFilter::DEBUG
            } else {
                LevelFilter::INFO
            };
            let targets = std::env::var(LOG_ENV)
                .ok()
                .filter(|level_str| !level_str.is_empty())
                .and_then(|level_str| level_str.parse::<Targets>().ok())
                .unwrap_or_else(|| Targets::new().with_default(default_level));

            let layer = tracing_subscriber::fmt::layer()
                .event_format(SimpleFormatter {
                    styles: log_styles,
                    show_targets: self.verbose,
                })
                .with_writer(std::io::stderr)
                .with_filter(targets);

            // Another subscriber may already be installed, e.g. by an embedding application.
            let _ = tracing_subscriber::registry().with(layer).try_init();
        });
    }
}

/// Specifies whether to colorize output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
#[must_use]
pub enum Color {
    /// Colorize if standard error is a terminal that supports it.
    #[default]
    Auto,

    /// Always colorize.
    Always,

    /// Never colorize.
    Never,
}

impl Color {
    /// Determines whether output should be colorized for the given stream.
    pub fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(stream).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

/// Formats events as `level: message`, or `level [module]: message` when showing targets.
struct SimpleFormatter {
    styles: LogStyles,
    show_targets: bool,
}

impl<S, N> FormatEvent<S, N> for SimpleFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        let (name, style) = match *metadata.level() {
            Level::ERROR => ("error", self.styles.error),
            Level::WARN => ("warning", self.styles.warning),
            Level::INFO => ("info", self.styles.info),
            Level::DEBUG => ("debug", self.styles.debug),
            Level::TRACE => ("trace", self.styles.trace),
        };
        write!(writer, "{}", name.style(style))?;
        if self.show_targets {
            write!(
                writer,
                " [{}]",
                short_target(metadata.target()).style(self.styles.target)
            )?;
        }
        write!(writer, ": ")?;

        let mut visitor = MessageVisitor {
            writer: &mut writer,
            // Show structured fields for debug or trace output.
            show_other: *metadata.level() >= Level::DEBUG,
            error: None,
        };

        event.record(&mut visitor);

        if let Some(error) = visitor.error {
            return Err(error);
        }

        writeln!(writer)
    }
}

/// Strips the crate name from a target, e.g. `stepwise_runner::logcat::parser` becomes
/// `logcat::parser`.
fn short_target(target: &str) -> &str {
    match target.split_once("::") {
        Some((_, rest)) => rest,
        None => target,
    }
}

static MESSAGE_FIELD: &str = "message";

struct MessageVisitor<'writer, 'a> {
    writer: &'a mut format::Writer<'writer>,
    show_other: bool,
    error: Option<fmt::Error>,
}

impl Visit for MessageVisitor<'_, '_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == MESSAGE_FIELD {
            if let Err(error) = write!(self.writer, "{value:?}") {
                self.error = Some(error);
            }
        } else if self.show_other {
            if let Err(error) = write!(self.writer, "; {} = {:?}", field.name(), value) {
                self.error = Some(error);
            }
        }
    }
}

static INIT_LOGGER: std::sync::Once = std::sync::Once::new();

#[derive(Debug, Default)]
struct LogStyles {
    error: Style,
    warning: Style,
    info: Style,
    debug: Style,
    trace: Style,
    target: Style,
}

impl LogStyles {
    fn colorize(&mut self) {
        self.error = style().red().bold();
        self.warning = style().yellow().bold();
        self.info = style().bold();
        self.debug = style().bold();
        self.trace = style().dimmed();
        self.target = style().dimmed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("stepwise_runner::logcat::parser", "logcat::parser"; "nested")]
    #[test_case("stepwise_runner::config", "config"; "module")]
    #[test_case("extract_steps", "extract_steps"; "crate root")]
    fn short_targets(target: &str, expected: &str) {
        assert_eq!(short_target(target), expected);
    }

    #[test]
    fn explicit_colors() {
        assert!(Color::Always.should_colorize(supports_color::Stream::Stderr));
        assert!(!Color::Never.should_colorize(supports_color::Stream::Stderr));
    }
}

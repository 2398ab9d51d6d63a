use eyre::Result;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::routines::output::OutputFile;
use crate::routines::settings::Settings;

/// Setup logging for the library
///
/// Uses the `tracing` crate, with `tracing-subscriber` for formatting. The log level is
/// defined in the settings and defaults to `info`.
///
/// Messages go to stdout, and to the log file in the output folder when output is enabled.
/// Nothing is installed if `log.write` is `false`. If another global subscriber is
/// already set, that one is kept and the call still succeeds.
pub fn setup_log(settings: &Settings) -> Result<()> {
    if !settings.log.write {
        return Ok(());
    }

    let log_level = settings.log.level.to_lowercase();
    let env_filter = EnvFilter::new(&log_level);

    // Define a registry with that level as an environment filter
    let subscriber = Registry::default().with(env_filter);

    let file_layer = if settings.output.write {
        let outputfile = OutputFile::new(&settings.output.path, &settings.log.file)?;
        let layer = fmt::layer()
            .with_writer(outputfile.file_owned())
            .with_ansi(false)
            .with_timer(CompactTimestamp);
        Some(layer)
    } else {
        None
    };

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(false)
        .with_timer(CompactTimestamp);

    if subscriber
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("A global subscriber is already set, keeping it");
        return Ok(());
    }
    tracing::debug!("Logging is configured with level: {}", log_level);
    Ok(())
}

#[derive(Clone)]
struct CompactTimestamp;

impl FormatTime for CompactTimestamp {
    fn format_time(
        &self,
        w: &mut tracing_subscriber::fmt::format::Writer<'_>,
    ) -> Result<(), std::fmt::Error> {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S"))
    }
}

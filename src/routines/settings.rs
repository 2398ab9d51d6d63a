use config::Config as eConfig;
use eyre::{bail, Result, WrapErr};
use serde_derive::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

use super::output::OutputFile;
use crate::structs::meta::{MetaParameters, ALPHA, BETA, GAMMA, TAU};

/// Contains all settings of a run
#[derive(Debug, Deserialize, Clone, Serialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct Settings {
    /// General configuration of the engine
    pub config: Config,
    /// Coefficients of the geometric transformations
    pub meta: Meta,
    /// Configuration for logging
    pub log: Log,
    /// Configuration for the output files
    pub output: Output,
    /// Configuration for checkpointing
    pub checkpoint: Checkpointing,
}

impl Settings {
    pub fn new() -> Self {
        Settings::default()
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        Ok(())
    }

    pub fn meta_parameters(&self) -> MetaParameters {
        let mut meta = MetaParameters::default();
        meta.set(ALPHA, self.meta.alpha);
        meta.set(BETA, self.meta.beta);
        meta.set(GAMMA, self.meta.gamma);
        meta.set(TAU, self.meta.tau);
        meta
    }

    pub fn set_stopping_iteration(&mut self, stopping_iteration: usize) {
        self.config.stopping_iteration = stopping_iteration;
    }

    pub fn set_function_name(&mut self, name: impl Into<String>) {
        self.config.function_name = name.into();
    }

    pub fn set_step_size(&mut self, step_size: Vec<f64>) {
        self.config.step_size = Some(step_size);
    }

    pub fn set_evaluation(&mut self, evaluation: Evaluation) {
        self.config.evaluation = evaluation;
    }

    pub fn set_workers(&mut self, workers: usize) {
        self.config.workers = workers;
    }

    pub fn set_speculative(&mut self, speculative: bool) {
        self.config.speculative = speculative;
    }

    pub fn set_cache(&mut self, cache: bool) {
        self.config.cache = cache;
    }

    pub fn set_stop_file(&mut self, path: Option<String>) {
        self.config.stop_file = path;
    }

    pub fn set_log_level(&mut self, level: impl Into<String>) {
        self.log.level = level.into();
    }

    pub fn set_write_logs(&mut self, write: bool) {
        self.log.write = write;
    }

    pub fn set_output_path(&mut self, path: impl Into<String>) {
        self.output.path = path.into();
    }

    pub fn set_output_write(&mut self, write: bool) {
        self.output.write = write;
    }

    /// Enable checkpointing to `file`, or disable it with `None`
    pub fn set_checkpoint(&mut self, file: Option<String>) {
        match file {
            Some(file) => {
                self.checkpoint.enabled = true;
                self.checkpoint.file = file;
            }
            None => self.checkpoint.enabled = false,
        }
    }

    /// Writes a copy of the settings to `settings.json` in the output folder
    pub fn write(&self) -> Result<()> {
        let serialized =
            serde_json::to_string_pretty(self).wrap_err("Unable to serialize settings")?;
        let outputfile = OutputFile::new(self.output.path.as_str(), "settings.json")?;
        let mut file = outputfile.file_owned();
        file.write_all(serialized.as_bytes())?;
        Ok(())
    }
}

/// How cost evaluations are carried out
#[derive(Debug, Deserialize, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Evaluation {
    /// One after the other on the calling thread
    #[default]
    Serial,
    /// On a rayon thread pool
    Rayon,
    /// Dispatched to worker threads through message passing
    Workers,
}

/// General configuration of the engine
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// Iteration budget of the run
    pub stopping_iteration: usize,
    /// Step sizes of the starting simplex, computed from the bounds when absent
    pub step_size: Option<Vec<f64>>,
    /// Name used in the progress file names
    pub function_name: String,
    pub evaluation: Evaluation,
    /// Number of workers, or of rayon threads (0 uses the global pool)
    pub workers: usize,
    /// How long the coordinator waits for a single worker response
    pub timeout_ms: u64,
    /// Evaluate the expansion point in the same batch as the reflection
    pub speculative: bool,
    /// Memoize evaluations of identical points
    pub cache: bool,
    /// The run stops before the next iteration once this file exists
    pub stop_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            stopping_iteration: 100,
            step_size: None,
            function_name: String::from("function"),
            evaluation: Evaluation::Serial,
            workers: 4,
            timeout_ms: 60_000,
            speculative: false,
            cache: false,
            stop_file: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.evaluation == Evaluation::Workers && self.workers == 0 {
            bail!("At least one worker is required for the workers evaluation mode");
        }
        if self.timeout_ms == 0 {
            bail!("The worker timeout must be positive");
        }
        if self.function_name.is_empty() {
            bail!("The function name must not be empty");
        }
        Ok(())
    }
}

/// Coefficients of the geometric transformations
#[derive(Debug, Deserialize, Clone, Copy, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Meta {
    /// Reflection
    pub alpha: f64,
    /// Contraction
    pub beta: f64,
    /// Expansion
    pub gamma: f64,
    /// Shrink
    pub tau: f64,
}

impl Default for Meta {
    fn default() -> Self {
        Meta {
            alpha: 1.0,
            beta: 0.5,
            gamma: 1.0,
            tau: 0.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Log {
    /// The maximum log level to display
    ///
    /// Any directive understood by `EnvFilter`, usually one of `trace`, `debug`, `info`,
    /// `warn` or `error`.
    pub level: String,
    /// The file to write the log to, within the output folder
    pub file: String,
    /// Whether to install a global subscriber
    ///
    /// Disable it when the caller sets up its own subscriber.
    pub write: bool,
}

impl Default for Log {
    fn default() -> Self {
        Log {
            level: String::from("info"),
            file: String::from("log.txt"),
            write: true,
        }
    }
}

/// Configuration for the output files
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Output {
    /// Whether to write the output files
    pub write: bool,
    /// The (relative) path to write the output files to
    pub path: String,
}

impl Default for Output {
    fn default() -> Self {
        Output {
            write: true,
            path: String::from("outputs/"),
        }
    }
}

impl Output {
    /// Parses the output folder location
    ///
    /// A single `#` in the path is replaced by the first number that gives a folder that
    /// does not exist yet.
    pub fn parse_output_folder(&mut self) -> Result<()> {
        if self.path.is_empty() {
            self.path = Output::default().path;
        }

        match self.path.matches('#').count() {
            0 => Ok(()),
            1 => {
                let mut num = 1;
                while std::path::Path::new(&self.path.replace('#', &num.to_string())).exists() {
                    num += 1;
                }
                self.path = self.path.replace('#', &num.to_string());
                Ok(())
            }
            _ => bail!("Only one `#` symbol is allowed in the output path"),
        }
    }
}

/// Configuration for checkpointing
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Checkpointing {
    /// Whether state is saved after every iteration and restored at start
    pub enabled: bool,
    /// File holding the saved state
    pub file: String,
}

impl Default for Checkpointing {
    fn default() -> Self {
        Checkpointing {
            enabled: false,
            file: String::from(".Simplex.save"),
        }
    }
}

impl Checkpointing {
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.file)
    }
}

/// Parses the settings from a TOML configuration file
///
/// Entries may be overridden by environment variables prefixed with `SIMPLEX_`, using
/// `__` between nested keys. For example, `SIMPLEX_CONFIG__STOPPING_ITERATION=20` sets
/// the iteration budget. The settings are validated, and a copy is written to the output
/// folder when output is enabled.
pub fn read(path: impl Into<String>) -> Result<Settings> {
    let settings_path = path.into();

    let parsed = eConfig::builder()
        .add_source(config::File::with_name(&settings_path).format(config::FileFormat::Toml))
        .add_source(
            config::Environment::with_prefix("SIMPLEX")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .wrap_err_with(|| format!("Unable to read settings from {}", settings_path))?;

    let mut settings: Settings = parsed
        .try_deserialize()
        .wrap_err("Unable to parse settings")?;

    settings.validate()?;
    settings.output.parse_output_folder()?;

    if settings.output.write {
        settings
            .write()
            .wrap_err("Could not write settings to file")?;
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::new();
        assert_eq!(settings.config.stopping_iteration, 100);
        assert_eq!(settings.config.evaluation, Evaluation::Serial);
        assert_eq!(settings.checkpoint.file, ".Simplex.save");
        assert!(!settings.checkpoint.enabled);
        let meta = settings.meta_parameters().coefficients().unwrap();
        assert_eq!((meta.alpha, meta.beta, meta.gamma, meta.tau), (1.0, 0.5, 1.0, 0.5));
    }

    #[test]
    fn test_workers_mode_needs_workers() {
        let mut settings = Settings::new();
        settings.set_evaluation(Evaluation::Workers);
        settings.set_workers(0);
        assert!(settings.validate().is_err());
        settings.set_workers(2);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_checkpoint_setter() {
        let mut settings = Settings::new();
        settings.set_checkpoint(Some("state.json".to_string()));
        assert!(settings.checkpoint.enabled);
        assert_eq!(settings.checkpoint.path(), PathBuf::from("state.json"));
        settings.set_checkpoint(None);
        assert!(!settings.checkpoint.enabled);
    }

    #[test]
    fn test_output_folder_numbering() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("run1")).unwrap();
        let mut output = Output {
            write: true,
            path: dir.path().join("run#").to_string_lossy().into_owned(),
        };
        output.parse_output_folder().unwrap();
        assert!(output.path.ends_with("run2"));

        output.path = "a#b#".to_string();
        assert!(output.parse_output_folder().is_err());
    }
}

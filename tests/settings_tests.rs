use eyre::Result;
use ndarray::Array1;
use simplexcore::prelude::*;

fn write_toml(dir: &std::path::Path, content: &str) -> Result<String> {
    let path = dir.join("settings.toml");
    std::fs::write(&path, content)?;
    Ok(path.to_string_lossy().into_owned())
}

/// Test reading a complete configuration file
#[test]
fn test_read_settings() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("out");
    let path = write_toml(
        dir.path(),
        &format!(
            r#"
[config]
step_size = [0.5, 0.25]
function_name = "bowl"
evaluation = "rayon"
workers = 2
speculative = true

[meta]
alpha = 1.5
tau = 0.25

[log]
level = "debug"

[output]
path = "{}"
write = true

[checkpoint]
enabled = true
file = "bowl.save"
"#,
            output.to_string_lossy()
        ),
    )?;

    let settings = settings::read(path)?;
    assert_eq!(settings.config.step_size, Some(vec![0.5, 0.25]));
    assert_eq!(settings.config.function_name, "bowl");
    assert_eq!(settings.config.evaluation, Evaluation::Rayon);
    assert!(settings.config.speculative);
    assert_eq!(settings.meta.alpha, 1.5);
    assert_eq!(settings.meta.beta, 0.5);
    assert_eq!(settings.meta.tau, 0.25);
    assert_eq!(settings.log.level, "debug");
    assert!(settings.checkpoint.enabled);

    // A copy of the settings is written to the output folder
    let copy = std::fs::read_to_string(output.join("settings.json"))?;
    assert!(copy.contains("\"function_name\": \"bowl\""));
    Ok(())
}

/// Test that a minimal file falls back on the defaults
#[test]
fn test_minimal_settings() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_toml(dir.path(), "[output]\nwrite = false\n")?;
    let settings = settings::read(path)?;
    assert_eq!(settings.config.evaluation, Evaluation::Serial);
    assert_eq!(settings.config.step_size, None);
    assert_eq!(settings.checkpoint.file, ".Simplex.save");
    Ok(())
}

#[test]
fn test_unknown_fields_are_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_toml(dir.path(), "[config]\ncycles = 10\n")?;
    assert!(settings::read(path).is_err());
    Ok(())
}

#[test]
fn test_environment_overrides_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_toml(
        dir.path(),
        "[config]\nstopping_iteration = 10\n\n[output]\nwrite = false\n",
    )?;
    std::env::set_var("SIMPLEX_CONFIG__STOPPING_ITERATION", "7");
    let settings = settings::read(path);
    std::env::remove_var("SIMPLEX_CONFIG__STOPPING_ITERATION");
    assert_eq!(settings?.config.stopping_iteration, 7);
    Ok(())
}

/// Test that the engine picks up the configured meta-parameters
#[test]
fn test_settings_drive_the_engine() -> Result<()> {
    let cost = FnCost::new(
        Parameters::new().add("x", 2.0, -4.0, 4.0),
        |p: &Array1<f64>| (p[0] + 1.0).powi(2),
    );
    let mut settings = Settings::new();
    settings.set_output_write(false);
    settings.set_stopping_iteration(3);
    settings.set_step_size(vec![1.0]);
    settings.meta.gamma = 2.0;

    let engine = engine(&settings, cost.parameters())?;
    assert_eq!(engine.meta_parameter("gamma")?, 2.0);
    assert_eq!(engine.meta_parameter("alpha")?, 1.0);

    let mut engine = engine;
    let result = fit_with(cost, &settings, &mut engine)?;
    assert_eq!(result.iterations(), 3);
    assert_eq!(engine.state().step_size, vec![1.0]);
    Ok(())
}

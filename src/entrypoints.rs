use eyre::{Result, WrapErr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::algorithms::evaluator::RayonEvaluator;
use crate::algorithms::parallel::Coordinator;
use crate::algorithms::simplex::Simplex;
use crate::cost::{CachedCost, CostFunction};
use crate::routines::checkpoint::FileCheckpoint;
use crate::routines::logger;
use crate::routines::output::{ProgressWriter, SimplexResult};
use crate::routines::settings::{Evaluation, Settings};
use crate::structs::parameters::Parameters;

/// Build an engine configured from `settings`
///
/// Useful to grab an [InformationHandle](crate::algorithms::simplex::InformationHandle)
/// before calling [fit_with].
pub fn engine(settings: &Settings, parameters: &Parameters) -> Result<Simplex> {
    settings.validate()?;
    let config = &settings.config;

    let mut engine = Simplex::new(config.stopping_iteration);
    engine.set_function_name(config.function_name.clone());
    if let Some(step_size) = &config.step_size {
        engine.set_step_size(step_size.clone());
    }
    engine.set_meta_parameters(settings.meta_parameters());
    engine.set_speculative(config.speculative);
    if let Some(stop_file) = &config.stop_file {
        engine.set_stop_file(stop_file);
    }

    let mut resuming = false;
    if settings.checkpoint.enabled {
        let checkpoint = FileCheckpoint::new(settings.checkpoint.path());
        resuming = checkpoint.path().exists();
        tracing::info!("Checkpointing to {:?}", checkpoint.path());
        engine.set_checkpoint(checkpoint);
    }

    if settings.output.write {
        let progress = ProgressWriter::new(
            &settings.output.path,
            &config.function_name,
            parameters.names(),
            resuming,
        )
        .wrap_err("Unable to open the progress files")?;
        engine.set_progress(progress);
    }

    Ok(engine)
}

/// Primary entrypoint
///
/// Sets up logging, runs the engine configured by `settings` on `cost`, and writes the
/// outputs when enabled.
pub fn fit<C>(cost: C, settings: Settings) -> Result<SimplexResult>
where
    C: CostFunction + Send + 'static,
{
    logger::setup_log(&settings)?;
    tracing::info!("Starting simplexcore");
    let mut engine = engine(&settings, cost.parameters())?;
    fit_with(cost, &settings, &mut engine)
}

/// Run an already configured engine with the evaluation mode of `settings`
pub fn fit_with<C>(cost: C, settings: &Settings, engine: &mut Simplex) -> Result<SimplexResult>
where
    C: CostFunction + Send + 'static,
{
    let now = Instant::now();
    match settings.output.write {
        true => tracing::info!("Output files will be written to {}", settings.output.path),
        false => tracing::info!("Output files will not be written"),
    }

    let result = if settings.config.cache {
        let cached = Arc::new(CachedCost::new(cost));
        let result = optimize(Arc::clone(&cached), settings, engine)?;
        tracing::debug!(
            "Evaluation cache holds {} points, {} hits",
            cached.len(),
            cached.hits()
        );
        result
    } else {
        optimize(Arc::new(cost), settings, engine)?
    };
    tracing::info!("Total time: {:.2?}", now.elapsed());

    if settings.output.write {
        result.write(&settings.output.path)?;
        settings.write()?;
    }
    Ok(result)
}

fn optimize<C>(cost: Arc<C>, settings: &Settings, engine: &mut Simplex) -> Result<SimplexResult>
where
    C: CostFunction + Send + 'static,
{
    let config = &settings.config;
    let parameters = cost.parameters().clone();
    let result = match config.evaluation {
        Evaluation::Serial => engine.run(cost.as_ref()),
        Evaluation::Rayon => {
            let mut evaluator = match config.workers {
                0 => RayonEvaluator::new(cost.as_ref()),
                threads => RayonEvaluator::with_threads(cost.as_ref(), threads)?,
            };
            engine.run_with(&parameters, &mut evaluator)
        }
        Evaluation::Workers => {
            let mut coordinator = Coordinator::threaded(
                cost,
                config.workers,
                Duration::from_millis(config.timeout_ms),
            )?;
            engine.run_with(&parameters, &mut coordinator)
        }
    };
    result.wrap_err_with(|| format!("Optimization of {} failed", config.function_name))
}

//! Application orchestrator.
//! Loads and merges config, initializes logging, installs the interrupt handler, validates the
//! roots and runs the pipeline.

use anyhow::Result;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

use audio_dedupe::cli::Args;
use audio_dedupe::config::{load_or_init, LoadResult};
use audio_dedupe::output as out;
use audio_dedupe::{
    default_config_path, pipeline, validate_and_normalize, Config, DedupeError, ProgressBars,
    TracingSink, CONFIG_ENV_VAR,
};

use crate::logging::init_tracing;

/// Exit status when the run finished but some duplicates could not be moved.
const EXIT_MOVE_FAILURES: u8 = 2;
/// Conventional status for SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

fn print_config_location() {
    if let Some(cfg_env) = std::env::var_os(CONFIG_ENV_VAR) {
        out::print_info(&format!(
            "Using {CONFIG_ENV_VAR} (explicit):\n  {}\n",
            cfg_env.to_string_lossy()
        ));
        out::print_info(&format!("To override, unset {CONFIG_ENV_VAR} or set it to another file."));
        return;
    }
    match default_config_path() {
        Ok(p) => {
            out::print_info(&format!("Default audio_dedupe config path:\n  {}\n", p.display()));
            if p.exists() {
                out::print_info("A config file already exists at that location.");
            } else {
                out::print_info("No config file exists there yet. Run without --print-config to create a template.");
            }
        }
        Err(e) => out::print_error(&format!("Could not determine a default config path: {e}")),
    }
}

/// Run the CLI application.
pub fn run(args: Args) -> Result<ExitCode> {
    if args.print_config {
        print_config_location();
        return Ok(ExitCode::SUCCESS);
    }

    // A template is only useful when the command line does not already name every directory.
    let mut cfg = match load_or_init(!args.names_all_directories())? {
        LoadResult::Loaded { config, path } => {
            debug!(path = %path.display(), "loaded config file");
            config
        }
        LoadResult::NotFound(_) => Config::default(),
        LoadResult::CreatedTemplate(path) => {
            out::print_success(&format!(
                "A template audio_dedupe config was written to: {}",
                path.display()
            ));
            out::print_info("Set `reference_dir`, `source_dir` and `output_dir` in it (or pass --reference, --source and --output), then re-run.");
            out::print_info(&format!("To use a different location set {CONFIG_ENV_VAR}."));
            return Ok(ExitCode::SUCCESS);
        }
    };
    args.apply_overrides(&mut cfg);

    let guard_opt = init_tracing(cfg.log_level, cfg.log_file.as_deref(), args.json).map_err(|e| {
        out::print_error(&format!("Failed to initialize logging: {e}"));
        e
    })?;

    // Dropping the guard flushes the file appender; the handler does that before exiting.
    let guard_slot = Arc::new(Mutex::new(guard_opt));
    {
        let guard_slot = Arc::clone(&guard_slot);
        if let Err(e) = ctrlc::set_handler(move || {
            out::print_warn("Received interrupt; stopping.");
            let removed = audio_dedupe::relocate::abandon_pending_claims();
            if removed > 0 {
                out::print_info(&format!("Removed {removed} unused destination placeholder(s)."));
            }
            if let Ok(mut g) = guard_slot.lock() {
                let _ = g.take();
            }
            std::process::exit(EXIT_INTERRUPTED);
        }) {
            error!(error = %e, "failed to install interrupt handler");
        }
    }

    debug!(?args, "starting audio_dedupe");

    let result = (|| -> Result<ExitCode> {
        validate_and_normalize(&mut cfg)?;
        let progress = ProgressBars::for_terminal(args.json);
        let summary = pipeline::run_with_progress(&cfg, &TracingSink, progress.as_ref())?.summary;
        out::print_summary(&summary, cfg.dry_run);
        if summary.is_clean() {
            info!("run finished");
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(ExitCode::from(EXIT_MOVE_FAILURES))
        }
    })();

    if let Err(e) = &result {
        match e.downcast_ref::<DedupeError>() {
            Some(de) => error!(code = de.code(), fatal = de.is_fatal(), error = %de, "run aborted"),
            None => error!(error = format!("{e:#}"), "run aborted"),
        }
    }

    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }

    result
}

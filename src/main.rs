use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bemsetup::{
    bem::{bem_filename, bem_output_path, make_bem_model, BemModelParams},
    cli::Cli,
    config,
    error::BemError,
    fiff,
};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Builds the BEM model for `subject` and writes it to the subject's bem directory
///
/// # Returns
/// The path of the written file
fn run(cli: &Cli, subject: &str) -> Result<PathBuf, BemError> {
    let params = BemModelParams {
        subject: subject.to_owned(),
        ico: cli.ico,
        conductivity: cli.conductivity(),
        subjects_dir: cli.subjects_dir.clone(),
        verbose: cli.verbose,
    };

    let surfaces = make_bem_model(&params)?;

    let filename = bem_filename(subject, cli.model.as_deref(), &surfaces);
    let subjects_dir = config::get_subjects_dir(cli.subjects_dir.as_deref())?;
    let output = bem_output_path(&subjects_dir, subject, &filename);

    fiff::write_bem_surfaces(&output, &surfaces)?;

    Ok(output)
}

fn main() {
    let cli = Cli::parse();

    let subject = match cli.subject.as_deref() {
        Some(s) => s,
        None => {
            if let Err(err) = Cli::command().print_help() {
                eprintln!("error: {err}");
            }
            std::process::exit(1)
        }
    };

    init_logging(cli.verbose);

    match run(&cli, subject) {
        Ok(output) => info!("wrote BEM model to {}", output.display()),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1)
        }
    }
}

use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_BRAIN_CONDUCTIVITY: f64 = 0.3;
pub const DEFAULT_SKULL_CONDUCTIVITY: f64 = 0.006;
pub const DEFAULT_SCALP_CONDUCTIVITY: f64 = 0.3;

/// Create a BEM model for a subject
///
/// Reads the watershed surfaces in <subjects_dir>/<subject>/bem and writes the
/// model to <subjects_dir>/<subject>/bem/<name>-bem.fif
#[derive(Parser, Debug)]
#[command(name = "bemsetup", version, about, long_about = None)]
pub struct Cli {
    /// Subject name (required)
    #[arg(short, long)]
    pub subject: Option<String>,

    /// Output file name. Use a name <dir>/<name>-bem.fif
    #[arg(long)]
    pub model: Option<String>,

    /// The surface ico downsampling to use, e.g. 5=20480, 4=5120, 3=1280.
    /// If omitted, no subsampling is applied
    #[arg(long)]
    pub ico: Option<u32>,

    /// Brain compartment conductivity in S/m
    #[arg(long, default_value_t = DEFAULT_BRAIN_CONDUCTIVITY, allow_negative_numbers = true)]
    pub brainc: f64,

    /// Skull compartment conductivity in S/m
    #[arg(long, default_value_t = DEFAULT_SKULL_CONDUCTIVITY, allow_negative_numbers = true)]
    pub skullc: f64,

    /// Scalp compartment conductivity in S/m
    #[arg(long, default_value_t = DEFAULT_SCALP_CONDUCTIVITY, allow_negative_numbers = true)]
    pub scalpc: f64,

    /// Use a single compartment model (brain only) with this conductivity
    /// instead of a three layer one. --brainc, --skullc and --scalpc are then ignored
    #[arg(long, allow_negative_numbers = true)]
    pub homog: Option<f64>,

    /// Subjects directory
    #[arg(short = 'd', long)]
    pub subjects_dir: Option<PathBuf>,

    /// Print progress and diagnostic messages
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// The conductivity list handed to the model builder
    pub fn conductivity(&self) -> Vec<f64> {
        resolve_conductivity(self.homog, self.brainc, self.skullc, self.scalpc)
    }
}

/// Builds the conductivity list: `[homog]` for a single compartment model,
/// `[brain, skull, scalp]` otherwise. Values are passed through unchecked
pub fn resolve_conductivity(homog: Option<f64>, brain: f64, skull: f64, scalp: f64) -> Vec<f64> {
    match homog {
        Some(sigma) => vec![sigma],
        None => vec![brain, skull, scalp],
    }
}

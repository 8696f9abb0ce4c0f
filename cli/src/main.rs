//! Command line interface over this workspace's DICOM slice reader, series
//! assembler, volume builder, mesh extractor and annotation codec: `convert`
//! turns a directory of DICOM files into a smoothed surface mesh, `annotate`
//! exports/imports annotations against that same volume geometry.

mod annotate;
mod convert;
mod error;
mod loader;
mod stl;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use crate::annotate::{run_export, run_import, ExportArgs, ImportArgs};
use crate::convert::{run as run_convert, ConvertArgs};

/// Converts a DICOM series into a surface mesh, or exports/imports
/// annotations against a volume's geometry.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable logging at INFO level.
    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,
    /// Enable logging at DEBUG level.
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,
    /// Enable logging at TRACE level.
    #[arg(long, global = true, default_value_t = false)]
    trace: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Reads a directory of DICOM files, builds a volume, extracts an
    /// iso-surface and writes it out as binary STL.
    Convert {
        /// Directory containing the DICOM series.
        #[arg(value_name = "DIR")]
        input: PathBuf,
        /// Path of the STL mesh to write.
        #[arg(value_name = "FILE")]
        output: PathBuf,
        /// Iso-value to extract at. Defaults to the volume's auto-computed
        /// Otsu threshold.
        #[arg(long)]
        iso: Option<f32>,
        /// Marching-cubes chunk edge length, in voxels.
        #[arg(long, default_value_t = 64)]
        chunk: usize,
        /// Number of Taubin smoothing lambda/mu cycles to apply.
        #[arg(long, default_value_t = medvol_mesh::DEFAULT_TAUBIN_ITERATIONS)]
        smooth_iter: usize,
    },
    /// Exports or imports annotations against a DICOM series' volume
    /// geometry.
    Annotate {
        #[command(subcommand)]
        action: AnnotateCommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
enum AnnotateCommand {
    /// Reads annotations from a JSON export and, optionally, re-exports
    /// them as a Comprehensive 3D SR document.
    Export {
        /// Directory containing the DICOM series the annotations belong to.
        #[arg(value_name = "DIR")]
        input: PathBuf,
        /// JSON file holding the annotations to export.
        #[arg(value_name = "FILE")]
        annotations: PathBuf,
        /// Path of the Comprehensive 3D SR DICOM file to also write.
        #[arg(long, value_name = "FILE")]
        sr: Option<PathBuf>,
    },
    /// Imports annotations from a Comprehensive 3D SR document or a JSON
    /// export and prints them as JSON.
    Import {
        /// Directory containing the DICOM series the annotations belong to.
        #[arg(value_name = "DIR")]
        input: PathBuf,
        /// Comprehensive 3D SR DICOM file to import from.
        #[arg(long, value_name = "FILE", conflicts_with = "json")]
        sr: Option<PathBuf>,
        /// JSON export to import from.
        #[arg(long, value_name = "FILE", conflicts_with = "sr")]
        json: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = medvol_common::get_log_level!(cli);
    tracing_subscriber::fmt()
        .with_thread_ids(true)
        .with_target(true)
        .with_max_level(level)
        .init();

    let result = match &cli.command {
        Commands::Convert {
            input,
            output,
            iso,
            chunk,
            smooth_iter,
        } => run_convert(&ConvertArgs {
            input_dir: input.clone(),
            output_mesh: output.clone(),
            iso: *iso,
            chunk: *chunk,
            smooth_iter: *smooth_iter,
        }),
        Commands::Annotate { action } => match action {
            AnnotateCommand::Export {
                input,
                annotations,
                sr,
            } => run_export(&ExportArgs {
                input_dir: input.clone(),
                annotations_json: annotations.clone(),
                sr_out: sr.clone(),
            }),
            AnnotateCommand::Import { input, sr, json } => run_import(&ImportArgs {
                input_dir: input.clone(),
                sr_in: sr.clone(),
                json_in: json.clone(),
            }),
        },
    };

    match result {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(error::exit_code(&err) as u8)
        }
    }
}

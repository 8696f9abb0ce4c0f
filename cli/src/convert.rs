//! Wires SliceReader through MeshPostProcess for the `convert` subcommand:
//! reads a directory of DICOM files, assembles a series, builds a volume,
//! extracts an iso-surface, smooths it, and writes it out as binary STL.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use medvol_mesh::{extract, smooth_with_iterations, ExtractionOutcome};

use crate::loader::load_series_and_volume;
use crate::stl::write_stl;

pub struct ConvertArgs {
    pub input_dir: PathBuf,
    pub output_mesh: PathBuf,
    pub iso: Option<f32>,
    pub chunk: usize,
    pub smooth_iter: usize,
}

pub fn run(args: &ConvertArgs) -> anyhow::Result<()> {
    let (_series, volume) = load_series_and_volume(&args.input_dir)?;
    info!(
        dims = ?volume.dims,
        auto_iso = volume.auto_iso,
        "volume built"
    );

    let iso = args.iso.unwrap_or(volume.auto_iso);

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = Arc::clone(&cancelled);
        ctrlc::set_handler(move || {
            cancelled.store(true, Ordering::SeqCst);
        })
        .context("failed to install Ctrl-C handler")?;
    }

    let outcome = extract(
        &volume.scalars,
        volume.dims,
        iso,
        volume.spacing,
        volume.origin,
        volume.orientation,
        args.chunk,
        volume.min,
        volume.max,
        |progress| info!(progress, "extraction progress"),
        || cancelled.load(Ordering::SeqCst),
    )?;

    let mut mesh = match outcome {
        ExtractionOutcome::Mesh(mesh) => mesh,
        ExtractionOutcome::Empty => {
            warn!(iso, "extraction produced an empty surface");
            anyhow::bail!("no surface was found at iso-value {iso}");
        }
    };
    info!(
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "surface extracted"
    );

    smooth_with_iterations(&mut mesh, args.smooth_iter);

    write_stl(&mesh, &args.output_mesh)?;
    info!(path = ?args.output_mesh, "mesh written");
    Ok(())
}

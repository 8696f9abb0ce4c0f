//! Shared directory-to-`Series`/`Volume` loading for both subcommands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use rayon::prelude::*;
use tracing::{debug, info};
use walkdir::WalkDir;

use medvol_series::{assemble, Series};
use medvol_slice::{read_slice, RawSlice};
use medvol_volume::{build, Volume};

pub fn load_slices(input_dir: &Path) -> anyhow::Result<Vec<RawSlice>> {
    let paths: Vec<PathBuf> = WalkDir::new(input_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();

    if paths.is_empty() {
        anyhow::bail!("no files found under {input_dir:?}");
    }

    let results: Vec<anyhow::Result<RawSlice>> = paths
        .par_iter()
        .map(|path| {
            let bytes = std::fs::read(path).with_context(|| format!("failed to read {path:?}"))?;
            read_slice(&bytes).with_context(|| format!("failed to parse {path:?}"))
        })
        .collect();

    let mut slices = Vec::with_capacity(results.len());
    for r in results {
        slices.push(r?);
    }
    info!(count = slices.len(), "loaded raw slices");
    Ok(slices)
}

/// Loads a directory into both a `Series` (needed by `AnnotationCodec` for
/// referenced-SOP lookups) and the `Volume` built from it. Assembly runs
/// twice over the same slice set rather than threading a borrowed `Series`
/// through `VolumeBuilder`, which consumes its input by value.
pub fn load_series_and_volume(input_dir: &Path) -> anyhow::Result<(Series, Volume)> {
    let slices = load_slices(input_dir)?;
    let series_for_volume = assemble(slices.clone())?;
    let volume = build(series_for_volume)?;
    let series = assemble(slices)?;
    debug!(
        depth = series.depth,
        approximate = series.orientation_approximate,
        "series assembled"
    );
    Ok((series, volume))
}

//! Wires `AnnotationCodec` for the `annotate export`/`annotate import`
//! subcommands: both rebuild the `Series`/`Volume` pair from a DICOM
//! directory so coordinates resolve against the same geometry regardless of
//! which process originally captured the annotations.

use std::path::{Path, PathBuf};

use anyhow::Context;
use dicom_object::FileMetaTableBuilder;
use tracing::info;

use medvol_annotation::{export_json, export_sr, import_json, import_sr, Annotation};

use crate::loader::load_series_and_volume;

pub struct ExportArgs {
    pub input_dir: PathBuf,
    pub annotations_json: PathBuf,
    pub sr_out: Option<PathBuf>,
}

pub struct ImportArgs {
    pub input_dir: PathBuf,
    pub sr_in: Option<PathBuf>,
    pub json_in: Option<PathBuf>,
}

/// Reads annotations already captured in the JSON schema and, when `--sr` is
/// given, re-exports them as a Comprehensive 3D SR document against the
/// volume built from `input_dir`.
pub fn run_export(args: &ExportArgs) -> anyhow::Result<()> {
    let (series, volume) = load_series_and_volume(&args.input_dir)?;

    let text = std::fs::read_to_string(&args.annotations_json)
        .with_context(|| format!("failed to read {:?}", args.annotations_json))?;
    let annotations = import_json(&text)?;
    info!(count = annotations.len(), "annotations loaded");

    if let Some(sr_path) = &args.sr_out {
        let report = export_sr(&annotations, &volume, &series)?;
        write_sr_file(&report, sr_path)?;
        info!(path = ?sr_path, "structured report written");
    }

    Ok(())
}

/// Rebuilds the volume from `input_dir`, imports annotations from either a
/// Comprehensive 3D SR file or a JSON export, and prints the result as the
/// normalized JSON schema so it can feed another tool or a re-export.
pub fn run_import(args: &ImportArgs) -> anyhow::Result<()> {
    let (_series, volume) = load_series_and_volume(&args.input_dir)?;

    let annotations: Vec<Annotation> = match (&args.sr_in, &args.json_in) {
        (Some(sr_path), _) => {
            let report = medvol_common::dicom::open_file(sr_path)
                .with_context(|| format!("failed to open {sr_path:?}"))?
                .into_inner();
            import_sr(&report, &volume)?
        }
        (None, Some(json_path)) => {
            let text = std::fs::read_to_string(json_path)
                .with_context(|| format!("failed to read {json_path:?}"))?;
            import_json(&text)?
        }
        (None, None) => anyhow::bail!("either --sr or --json must be given"),
    };
    info!(count = annotations.len(), "annotations imported");

    let json = export_json(&annotations, &volume)?;
    println!("{json}");
    Ok(())
}

fn write_sr_file(report: &dicom_object::InMemDicomObject, path: &Path) -> anyhow::Result<()> {
    let file_obj = report
        .clone()
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(dicom_transfer_syntax_registry::default().erased().uid())
                .media_storage_sop_class_uid(medvol_annotation::COMPREHENSIVE_3D_SR_SOP_CLASS),
        )
        .with_context(|| format!("failed to build file meta for {path:?}"))?;
    file_obj
        .write_to_file(path)
        .with_context(|| format!("failed to write {path:?}"))?;
    Ok(())
}

//! Import orchestration: read, normalize, validate, project, fuse, simplify.
//!
//! Every file is fully prepared before any actor is touched, so a fatal error
//! leaves the fused state exactly as it was.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use trailfuse_core::config::PipelineConfig;
use trailfuse_core::formats::FormatRegistry;
use trailfuse_core::fusion::FusionContext;
use trailfuse_core::models::{GpsRecord, MovementRecord, Position};
use trailfuse_core::ports::LoggingListener;
use trailfuse_core::schema::{FileType, SchemaValidator, ValidatedRecords, ValidatedTable};
use trailfuse_core::simplify::{interpolate_position_at_time, SimplificationStats};
use trailfuse_core::time::{NormalizationReport, TimeFormat, TimeNormalizer};
use trailfuse_geo::{
    calculate_bounds, project_with_bounds, validate_track, GeoBounds, GpsValidationReport,
};

/// A file that has been read, normalized and validated
#[derive(Debug)]
pub struct PreparedTable {
    pub path: PathBuf,
    pub name: String,
    pub format: String,
    pub rows: usize,
    pub source_warnings: Vec<String>,
    pub time: NormalizationReport,
    pub validated: ValidatedTable,
}

/// What one file contributed
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub file: String,
    pub name: String,
    pub file_type: FileType,
    pub time_format: TimeFormat,
    pub rows: usize,
    pub valid_rows: usize,
    pub rejected_rows: usize,
    pub warnings: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsValidationReport>,
}

impl ImportSummary {
    fn from_prepared(prepared: &PreparedTable) -> Self {
        let report = &prepared.validated.report;
        let mut warnings = prepared.source_warnings.clone();
        warnings.extend(prepared.time.warnings.iter().cloned());
        warnings.extend(report.errors.iter().map(|i| i.to_string()));
        warnings.extend(report.warnings.iter().map(|i| i.to_string()));
        Self {
            file: prepared.path.display().to_string(),
            name: prepared.name.clone(),
            file_type: report.file_type,
            time_format: prepared.time.format,
            rows: prepared.rows,
            valid_rows: report.stats.valid_rows,
            rejected_rows: report.stats.rejected_rows,
            warnings,
            gps: None,
        }
    }
}

/// Per-actor position at a playback time
#[derive(Debug, Clone, Serialize)]
pub struct ActorPosition {
    pub actor: String,
    pub position: Option<Position>,
}

/// Cleaned GPS records of one actor, kept so the actor can be re-projected
#[derive(Debug, Clone)]
struct GpsTrack {
    records: Vec<GpsRecord>,
    rows: usize,
}

pub struct ImportPipeline {
    registry: FormatRegistry,
    validator: SchemaValidator,
    config: PipelineConfig,
    context: FusionContext,
    gps_tracks: BTreeMap<String, GpsTrack>,
    gps_bounds: Option<GeoBounds>,
}

impl ImportPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let mut context = FusionContext::new(config.fusion);
        context.subscribe(Box::new(LoggingListener));
        Self {
            registry: FormatRegistry::with_defaults(),
            validator: SchemaValidator::default(),
            config,
            context,
            gps_tracks: BTreeMap::new(),
            gps_bounds: None,
        }
    }

    pub fn context(&self) -> &FusionContext {
        &self.context
    }

    /// Bounds shared by every GPS-sourced actor
    pub fn gps_bounds(&self) -> Option<GeoBounds> {
        self.gps_bounds
    }

    /// Read, normalize and validate a file without touching fused state
    pub async fn prepare(&self, path: &Path) -> Result<PreparedTable> {
        let source = self
            .registry
            .read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut table = source.table;

        let normalizer = TimeNormalizer::for_table(&table);
        if normalizer.columns().is_empty() {
            bail!(
                "{} has no time, start or end column (columns: {})",
                path.display(),
                table.columns.join(", ")
            );
        }
        let time = normalizer
            .normalize(&mut table)
            .with_context(|| format!("Failed to normalize times in {}", path.display()))?;
        let validated = self
            .validator
            .validate(&table)
            .require_valid()
            .with_context(|| format!("Failed to validate {}", path.display()))?;

        tracing::info!(
            file = %path.display(),
            format = %source.format,
            file_type = %validated.report.file_type,
            time_format = %time.format,
            "Prepared table"
        );
        Ok(PreparedTable {
            path: path.to_path_buf(),
            name: table.name.clone(),
            format: source.format,
            rows: table.len(),
            source_warnings: source.warnings,
            time,
            validated,
        })
    }

    /// Import movement files.
    ///
    /// Every GPS actor shares one projection frame. When a GPS import widens
    /// the frame, GPS actors from earlier imports are re-projected into it.
    pub async fn import_movement(&mut self, paths: &[PathBuf]) -> Result<Vec<ImportSummary>> {
        let mut prepared = Vec::with_capacity(paths.len());
        for path in paths {
            prepared.push(self.prepare(path).await?);
        }

        let mut gps_tracks = self.gps_tracks.clone();
        let mut summaries = Vec::with_capacity(prepared.len());
        for table in &prepared {
            gps_tracks.remove(&table.name);
            let mut summary = ImportSummary::from_prepared(table);
            match &table.validated.records {
                ValidatedRecords::Movement(records) if !records.is_empty() => {}
                ValidatedRecords::Gps(records) => {
                    let (kept, report) = validate_track(records, &self.config.gps);
                    if kept.is_empty() {
                        bail!("{} has no usable GPS points", table.path.display());
                    }
                    summary.warnings.extend(report.warnings.iter().cloned());
                    summary.gps = Some(report);
                    let track = GpsTrack { records: kept, rows: table.rows };
                    gps_tracks.insert(table.name.clone(), track);
                }
                ValidatedRecords::Movement(_) => {
                    bail!("{} has no usable movement points", table.path.display())
                }
                _ => bail!(
                    "{} is {} data, expected movement",
                    table.path.display(),
                    table.validated.report.file_type
                ),
            }
            summaries.push(summary);
        }

        // Nothing below can fail
        let all: Vec<GpsRecord> =
            gps_tracks.values().flat_map(|t| t.records.iter().copied()).collect();
        let bounds = calculate_bounds(&all, self.config.gps.padding_percent);
        let frame_changed = bounds != self.gps_bounds;
        self.gps_bounds = bounds;

        let batch: HashSet<&str> = prepared.iter().map(|t| t.name.as_str()).collect();
        for table in &prepared {
            let records = match (&table.validated.records, gps_tracks.get(&table.name)) {
                (ValidatedRecords::Movement(records), _) => records.clone(),
                (_, Some(track)) => self.project(&track.records),
                (_, None) => continue,
            };
            self.context.import_movement(&table.name, &records, table.rows);
        }

        if frame_changed {
            let earlier = gps_tracks.iter().filter(|(name, _)| !batch.contains(name.as_str()));
            for (name, track) in earlier {
                tracing::debug!(actor = %name, "Re-projecting GPS actor into widened frame");
                let records = self.project(&track.records);
                self.context.import_movement(name, &records, track.rows);
            }
        }
        self.gps_tracks = gps_tracks;

        Ok(summaries)
    }

    /// Import a conversation file, replacing all speech
    pub async fn import_conversation(&mut self, path: &Path) -> Result<ImportSummary> {
        let prepared = self.prepare(path).await?;
        let ValidatedRecords::Conversation(records) = &prepared.validated.records else {
            bail!(
                "{} is {} data, expected conversation",
                path.display(),
                prepared.validated.report.file_type
            );
        };
        self.context.import_conversation(records);
        Ok(ImportSummary::from_prepared(&prepared))
    }

    /// Import code files; each replaces the intervals of the labels it names
    pub async fn import_codes(&mut self, paths: &[PathBuf]) -> Result<Vec<ImportSummary>> {
        let mut prepared = Vec::with_capacity(paths.len());
        for path in paths {
            let table = self.prepare(path).await?;
            if !matches!(table.validated.records, ValidatedRecords::Codes(_)) {
                bail!(
                    "{} is {} data, expected codes",
                    path.display(),
                    table.validated.report.file_type
                );
            }
            prepared.push(table);
        }

        let mut summaries = Vec::with_capacity(prepared.len());
        for table in &prepared {
            if let ValidatedRecords::Codes(records) = &table.validated.records {
                self.context.import_codes(records);
            }
            summaries.push(ImportSummary::from_prepared(table));
        }
        Ok(summaries)
    }

    /// Build simplified trails for every actor with a trail
    pub fn simplify_all(&mut self) -> Vec<(String, SimplificationStats)> {
        let config = self.config.simplify;
        self.context
            .actors_mut()
            .iter_mut()
            .filter(|a| !a.trail().is_empty())
            .map(|actor| {
                let stats = actor.simplify(&config).stats;
                (actor.name.clone(), stats)
            })
            .collect()
    }

    /// Positions at `time`, from simplified trails when available
    pub fn positions_at(&self, time: f64) -> Vec<ActorPosition> {
        self.context
            .actors()
            .iter()
            .map(|actor| {
                let position = match actor.simplified() {
                    Some(simplified) => simplified.position_at(time),
                    None => interpolate_position_at_time(actor.trail(), time),
                };
                ActorPosition { actor: actor.name.clone(), position }
            })
            .collect()
    }

    fn project(&self, records: &[GpsRecord]) -> Vec<MovementRecord> {
        match &self.gps_bounds {
            Some(bounds) => project_with_bounds(records, bounds, self.config.gps.normalized_size),
            None => Vec::new(),
        }
    }
}

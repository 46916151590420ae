//! Fuse command: import files, fuse per-actor trails, optionally simplify and render inputs

use crate::cli::FuseArgs;
use crate::config_loader::load_config_with_overrides;
use crate::output::OutputWriter;
use crate::pipeline::{ActorPosition, ImportPipeline, ImportSummary};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tabled::Tabled;
use trailfuse_core::config::CliConfigOverrides;
use trailfuse_core::models::Actor;
use trailfuse_core::ports::MapImageProvider;
use trailfuse_core::simplify::SimplificationStats;
use trailfuse_geo::StaticMapClient;

#[derive(Debug, Serialize, Tabled)]
struct ActorRow {
    #[tabled(rename = "Actor")]
    actor: String,
    #[tabled(rename = "Data")]
    state: String,
    #[tabled(rename = "Points")]
    points: String,
    #[tabled(rename = "Speech")]
    speech: String,
    #[tabled(rename = "Longest stop")]
    max_stop: String,
    #[tabled(rename = "Simplified")]
    simplified: String,
}

impl ActorRow {
    fn from_actor(actor: &Actor) -> Self {
        let trail = actor.trail();
        let longest = trail.iter().map(|p| p.stop_length).fold(0.0, f64::max);
        Self {
            actor: actor.name.clone(),
            state: format!("{:?}", actor.state()),
            points: trail.len().to_string(),
            speech: trail.iter().filter(|p| p.has_speech()).count().to_string(),
            max_stop: format!("{:.1} s", longest),
            simplified: actor
                .simplified()
                .map(|s| s.points.len().to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct PositionRow {
    #[tabled(rename = "Actor")]
    actor: String,
    #[tabled(rename = "Position")]
    position: String,
}

impl From<&ActorPosition> for PositionRow {
    fn from(p: &ActorPosition) -> Self {
        Self {
            actor: p.actor.clone(),
            position: p
                .position
                .map(|pos| format!("({:.2}, {:.2})", pos.x, pos.y))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct FuseOutput {
    imports: Vec<ImportSummary>,
    timeline_end: f64,
    max_stop_length: f64,
    codes: Vec<String>,
    actors: Vec<ActorRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    simplification: Vec<SimplifiedActor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    positions: Option<Vec<ActorPosition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    map_image: Option<String>,
}

#[derive(Debug, Serialize)]
struct SimplifiedActor {
    actor: String,
    stats: SimplificationStats,
}

pub async fn execute(
    args: FuseArgs,
    config_path: Option<&Path>,
    output: &OutputWriter,
) -> Result<()> {
    let overrides = CliConfigOverrides {
        movement_sample_interval: args.movement_sample_interval,
        min_distance: args.min_distance,
        max_time_gap: args.max_time_gap,
        aggressive: args.aggressive.then_some(true),
        max_speed_kmh: args.max_speed_kmh,
        map_provider_url: args.map_provider_url.clone(),
    };
    let config = load_config_with_overrides(config_path, overrides)?.resolve()?;

    if args.movement.is_empty() && args.conversation.is_none() && args.codes.is_empty() {
        bail!("Nothing to fuse: pass --movement, --conversation or --codes");
    }

    let map_url = config.require_map_provider_url().map(str::to_string);
    let mut pipeline = ImportPipeline::new(config);
    let mut imports = Vec::new();

    if !args.movement.is_empty() {
        imports.extend(pipeline.import_movement(&args.movement).await?);
    }
    if let Some(path) = &args.conversation {
        imports.push(pipeline.import_conversation(path).await?);
    }
    if !args.codes.is_empty() {
        imports.extend(pipeline.import_codes(&args.codes).await?);
    }

    for summary in &imports {
        for warning in &summary.warnings {
            output.warning(format!("{}: {}", summary.name, warning));
        }
    }

    let simplification: Vec<SimplifiedActor> = if args.simplify {
        pipeline
            .simplify_all()
            .into_iter()
            .map(|(actor, stats)| SimplifiedActor { actor, stats })
            .collect()
    } else {
        Vec::new()
    };

    let positions = args.at.map(|t| pipeline.positions_at(t));

    let context = pipeline.context();
    let codes: Vec<String> = context.code_labels().into_iter().map(|s| s.to_string()).collect();

    let output_file = match &args.output {
        Some(path) => {
            let json = context.to_json()?;
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            Some(path.display().to_string())
        }
        None => None,
    };

    let map_image = match &args.map_image {
        Some(path) => {
            let Some(bounds) = pipeline.gps_bounds() else {
                bail!("--map-image needs at least one GPS movement file");
            };
            let url = map_url.with_context(|| {
                "--map-image needs map_provider_url in the configuration or on the command line"
            })?;
            let client = StaticMapClient::new(url)?;
            let image = client.fetch(&bounds.bbox_string(), args.map_width, args.map_height).await?;
            fs::write(path, &image.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(provider = client.name(), bytes = image.len(), "Saved map image");
            Some(path.display().to_string())
        }
        None => None,
    };

    let result = FuseOutput {
        imports,
        timeline_end: context.timeline_end(),
        max_stop_length: context.max_stop_length(),
        codes,
        actors: context.actors().iter().map(ActorRow::from_actor).collect(),
        simplification,
        positions,
        output_file,
        map_image,
    };

    if output.is_json() {
        return output.result(result);
    }

    output.section("Fused actors");
    output.kv("Timeline end", format!("{:.2} s", result.timeline_end));
    output.kv("Longest stop", format!("{:.2} s", result.max_stop_length));
    if !result.codes.is_empty() {
        output.kv("Codes", result.codes.join(", "));
    }
    output.table(result.actors);

    if !result.simplification.is_empty() {
        output.section("Simplification");
        for entry in &result.simplification {
            output.kv(
                &entry.actor,
                format!(
                    "{} -> {} points ({:.1}% reduction, {} interpolated)",
                    entry.stats.original,
                    entry.stats.optimized,
                    entry.stats.reduction_percent,
                    entry.stats.interpolated
                ),
            );
        }
    }

    if let (Some(t), Some(positions)) = (args.at, &result.positions) {
        output.section(format!("Positions at {} s", t));
        output.table(positions.iter().map(PositionRow::from).collect());
    }

    if let Some(file) = &result.output_file {
        output.success(format!("Wrote fused actors to {}", file));
    }
    if let Some(file) = &result.map_image {
        output.success(format!("Wrote map image to {}", file));
    }
    Ok(())
}

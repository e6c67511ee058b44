mod merger;
mod models;
mod reconciler;

pub use merger::{materialize_streaming_history_view, merge_record, Enricher};
pub use models::{
    EnrichmentReport, EnrichmentTarget, ReconcileStrategy, WorkItem, UPDATED_AT_COLUMN,
};
pub use reconciler::work_set;

use crate::catalog::CatalogClient;
use crate::config::EnrichmentSettings;
use crate::sqlite_persistence::ExportDatabase;
use anyhow::Result;
use tracing::info;

const ARTIST_NAME_COLUMN: &str = "artist_name";
const TRACK_NAME_COLUMN: &str = "track_name";
const AUDIO_FEATURES_SUFFIX: &str = "_audio_features";

/// Reports of a full enrichment pass over a converted export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportEnrichment {
    pub library: EnrichmentReport,
    pub streaming_history: EnrichmentReport,
    pub view_built: bool,
}

fn log_report(name: &str, report: &EnrichmentReport) {
    info!(
        "{}: {} to do, {} enriched, {} already present, {} without match, {} without features, {} failed",
        name,
        report.work_set,
        report.enriched,
        report.ignored,
        report.skipped_queries,
        report.missing_features,
        report.failed
    );
}

/// Enriches library tracks and streaming history, then rebuilds the joined view.
pub fn enrich_export<C: CatalogClient + ?Sized>(
    db: &mut ExportDatabase,
    client: &C,
    settings: &EnrichmentSettings,
    show_progress: bool,
) -> Result<ExportEnrichment> {
    let library_target = EnrichmentTarget::by_identifier(
        &settings.library_table,
        &settings.library_uri_column,
        &settings.library_dest_table,
    );
    let history_target = EnrichmentTarget::by_text_identity(
        &settings.streaming_history_table,
        ARTIST_NAME_COLUMN,
        TRACK_NAME_COLUMN,
        &settings.streaming_history_dest_table,
    );

    let mut enricher = Enricher::new(db, client, show_progress);
    let library = enricher.enrich(&library_target)?;
    log_report(&library_target.source_table, &library);
    let streaming_history = enricher.enrich(&history_target)?;
    log_report(&history_target.source_table, &streaming_history);

    let view_built = materialize_streaming_history_view(
        enricher.db(),
        &history_target.source_table,
        &history_target.dest_table,
        &settings.view_name,
    )?;
    enricher.db().vacuum()?;

    Ok(ExportEnrichment {
        library,
        streaming_history,
        view_built,
    })
}

/// Default destination of [`enrich_table`]: `<source>_audio_features`.
pub fn default_dest_table(source_table: &str) -> String {
    format!("{}{}", source_table, AUDIO_FEATURES_SUFFIX)
}

/// Enriches an arbitrary table whose `uri_column` holds track URIs.
pub fn enrich_table<C: CatalogClient + ?Sized>(
    db: &mut ExportDatabase,
    client: &C,
    source_table: &str,
    uri_column: &str,
    dest_table: Option<&str>,
    show_progress: bool,
) -> Result<EnrichmentReport> {
    let dest_table = dest_table
        .map(str::to_string)
        .unwrap_or_else(|| default_dest_table(source_table));
    let target = EnrichmentTarget::by_identifier(source_table, uri_column, &dest_table);

    let report = Enricher::new(db, client, show_progress).enrich(&target)?;
    log_report(source_table, &report);
    db.vacuum()?;
    Ok(report)
}

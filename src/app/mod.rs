//! Command runners for the `harvester` binary.

mod input;
mod progress_ui;
mod settings;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use harvester_core::usage::new_session_id;
use harvester_core::{
    BatchDownloader, BatchStats, DiagnosticsDir, DoiResolver, FileMetadata, HttpSession,
    OpenAlexClient, SearchParams, SessionOptions, Transport, UsageEvent, WorkRecord, package_pdfs,
    usage_sink_from_path,
};
use tracing::{debug, info, warn};

use crate::cli::{Args, Command, FetchArgs, SearchArgs};
use progress_ui::BatchProgress;
use settings::{RunSettings, load_config};

/// Runs the parsed command line.
pub(crate) async fn run(args: Args) -> Result<()> {
    let file_config = load_config(args.config.as_deref())?;
    let settings = RunSettings::resolve(&args, &file_config);
    debug!(?settings, "effective settings");

    let session = HttpSession::with_options(
        SessionOptions::default().with_request_timeout(settings.timeout),
    )
    .context("Failed to build HTTP client")?;

    match &args.command {
        Command::Search(search) => run_search(search, &settings, &session, args.quiet).await,
        Command::Fetch(fetch) => run_fetch(fetch, &settings, &session, args.quiet).await,
    }
}

async fn run_search(
    args: &SearchArgs,
    settings: &RunSettings,
    session: &HttpSession,
    quiet: bool,
) -> Result<()> {
    let mut params = SearchParams::new(args.query.clone());
    params.max_results = settings.max_results;
    params.search_type = args.search_type.into();
    params.access = args.access.into();
    params.year_from = args.year_from;
    params.year_to = args.year_to;
    params.sort = args.sort.into();

    let client = OpenAlexClient::new(session).with_mailto(settings.mailto.clone());
    let rows = client.search(&params).await.context("Search failed")?;
    info!(rows = rows.len(), "Search complete");

    match &args.output {
        Some(path) => write_rows_json(path, &rows)?,
        None => print_rows(&rows),
    }

    let batch = match &args.download {
        Some(dir) => {
            let (dois, metadata) = download_plan(&rows);
            if dois.is_empty() {
                info!("No DOIs in search results; nothing to download");
                None
            } else {
                let stats = run_batch(session, settings, &dois, dir, Some(&metadata), quiet).await?;
                if let Some(archive) = &args.archive {
                    write_archive(dir, archive).await?;
                }
                Some(stats)
            }
        }
        None => None,
    };

    let sink = usage_sink_from_path(settings.usage_log.as_deref());
    sink.record(&UsageEvent::for_search(
        &new_session_id(),
        &params,
        &rows,
        batch.as_ref(),
    ));
    Ok(())
}

async fn run_fetch(
    args: &FetchArgs,
    settings: &RunSettings,
    session: &HttpSession,
    quiet: bool,
) -> Result<()> {
    let dois = input::read_dois(&args.dois)?;
    if dois.is_empty() {
        info!("No DOIs provided. Pass them as arguments or pipe them via stdin.");
        info!("Example: echo '10.1234/abcd' | harvester fetch --output-dir pdfs");
        return Ok(());
    }

    let Some(output_dir) = args.output_dir.as_ref().or(settings.output_dir.as_ref()) else {
        bail!("No output directory: pass --output-dir or set output_dir in the config file");
    };

    run_batch(session, settings, &dois, output_dir, None, quiet).await?;
    if let Some(archive) = &args.archive {
        write_archive(output_dir, archive).await?;
    }
    Ok(())
}

async fn run_batch(
    session: &HttpSession,
    settings: &RunSettings,
    dois: &[String],
    output_dir: &Path,
    metadata: Option<&HashMap<String, FileMetadata>>,
    quiet: bool,
) -> Result<BatchStats> {
    let transport: Arc<dyn Transport> = Arc::new(session.clone());
    let resolver = DoiResolver::new(transport)
        .with_diagnostics(settings.diagnostics_dir.clone().map(DiagnosticsDir::new));
    let downloader = BatchDownloader::new(resolver);

    let progress = BatchProgress::new(quiet);
    let stats = downloader
        .download_all(dois, output_dir, Some(&progress), metadata)
        .await
        .with_context(|| format!("Failed to prepare output directory '{}'", output_dir.display()))?;
    progress.finish();

    for error in &stats.errors {
        warn!(error = %error, "DOI not downloaded");
    }
    info!(
        downloaded = stats.downloaded,
        failed = stats.failed,
        no_pdf = stats.no_pdf,
        total = stats.total,
        "Download complete"
    );
    Ok(stats)
}

async fn write_archive(dir: &Path, archive: &Path) -> Result<()> {
    let summary = package_pdfs(dir, archive)
        .await
        .with_context(|| format!("Failed to write archive '{}'", archive.display()))?;
    info!(
        path = %summary.path.display(),
        files = summary.files.len(),
        bytes = summary.bytes,
        "Archive written"
    );
    Ok(())
}

/// DOIs of the rows that have one, with naming metadata keyed by DOI.
fn download_plan(rows: &[WorkRecord]) -> (Vec<String>, HashMap<String, FileMetadata>) {
    let mut dois = Vec::new();
    let mut metadata = HashMap::new();
    for (index, row) in rows.iter().enumerate() {
        if row.doi.is_empty() {
            continue;
        }
        dois.push(row.doi.clone());
        metadata
            .entry(row.doi.clone())
            .or_insert_with(|| FileMetadata::from_record(index + 1, row));
    }
    (dois, metadata)
}

fn write_rows_json(path: &Path, rows: &[WorkRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(rows).context("Failed to serialize results")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write results to '{}'", path.display()))?;
    info!(path = %path.display(), rows = rows.len(), "Results written");
    Ok(())
}

fn print_rows(rows: &[WorkRecord]) {
    for (index, row) in rows.iter().enumerate() {
        let year = row.year.map_or_else(|| "n.d.".to_string(), |y| y.to_string());
        let doi = if row.doi.is_empty() { "-" } else { row.doi.as_str() };
        let author = row.first_author_surname().unwrap_or_else(|| "-".to_string());
        println!("{:>3}. {} ({year}) {author} {doi}", index + 1, row.title);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(title: &str, doi: &str, author: &str) -> WorkRecord {
        WorkRecord {
            title: title.to_string(),
            authors: vec![author.to_string()],
            venue: String::new(),
            year: Some(2020),
            citation_count: 0,
            doi: doi.to_string(),
            source_id: String::new(),
            is_open_access: true,
            abstract_text: String::new(),
            candidate_oa_pdf_url: None,
            candidate_oa_landing_url: None,
            search_query: String::new(),
        }
    }

    #[test]
    fn test_download_plan_skips_missing_dois_and_keeps_row_index() {
        let rows = vec![
            row("First", "10.1/a", "Ana Pérez"),
            row("No DOI", "", "X"),
            row("Third", "10.1/c", "Luis Gómez"),
        ];
        let (dois, metadata) = download_plan(&rows);

        assert_eq!(dois, vec!["10.1/a", "10.1/c"]);
        assert_eq!(metadata["10.1/c"].index, 3);
        assert_eq!(metadata["10.1/a"].author, "Ana Pérez");
    }

    #[test]
    fn test_download_plan_first_row_wins_for_repeated_doi() {
        let rows = vec![row("First", "10.1/a", "A"), row("Again", "10.1/a", "B")];
        let (_, metadata) = download_plan(&rows);
        assert_eq!(metadata["10.1/a"].title, "First");
    }
}

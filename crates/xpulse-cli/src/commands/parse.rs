use std::path::Path;

use serde_json::json;
use xpulse_core::AppConfig;
use xpulse_ingest::{parse_source_bytes, BatchValidation, ParsedSource};

/// Parses an upload and reports what an import would do, without fetching.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the batch is not
/// importable (empty or over `max_urls`).
pub(crate) async fn run_parse(
    config: &AppConfig,
    file: &Path,
    max_urls: Option<usize>,
    as_json: bool,
) -> anyhow::Result<()> {
    let raw = super::read_upload(file).await?;
    let parsed = parse_source_bytes(&raw);
    let validation = parsed.validate(max_urls.unwrap_or(config.max_batch_urls));

    if as_json {
        let report = json!({"parsed": parsed, "validation": validation});
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_parse_report(&parsed, &validation);
    }

    ensure_importable(&validation)
}

pub(super) fn ensure_importable(validation: &BatchValidation) -> anyhow::Result<()> {
    if validation.is_valid {
        return Ok(());
    }
    anyhow::bail!(
        "{}",
        validation
            .error
            .as_deref()
            .unwrap_or("batch is not importable")
    )
}

pub(super) fn print_parse_report(parsed: &ParsedSource, validation: &BatchValidation) {
    let stats = &validation.stats;
    println!(
        "{} profiles, {} posts, {} invalid, {} blank rows skipped",
        stats.profile_count, stats.post_count, stats.invalid_count, parsed.skipped_rows
    );
    for reference in &parsed.invalid {
        println!("  unsupported URL: {}", reference.original);
    }
    for error in &parsed.errors {
        println!("  {error}");
    }
    if let Some(error) = &validation.error {
        println!("not importable: {error}");
    }
}

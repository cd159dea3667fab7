//! CLI command implementations

use crate::output::{format_bytes, format_size, print_json};
use crate::OutputFormat;
use anyhow::{Context, Result};
use console::style;
use parfetch_core::Downloader;
use parfetch_types::{CoreEvent, DownloadRequest, DownloadStrategy, ProbeResult, Settings};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Download Command
// ============================================================================

pub async fn get(
    settings: Settings,
    url: &str,
    output: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let downloader = Downloader::new(settings)?;

    let mut request = DownloadRequest::new(url);
    if let Some(output) = output {
        request = request.with_destination(output);
    }

    // Ctrl-C cancels the download; the engine cleans up before returning
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let mut events = downloader.subscribe();
    let show_events = matches!(format, OutputFormat::Human);
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if show_events {
                print_event(&event);
            }
        }
    });

    let result = downloader.download_with_cancel(request, cancel).await;

    // Closing the channel ends the printer
    drop(downloader);
    let _ = printer.await;
    ctrl_c.abort();

    let report = result.with_context(|| format!("Failed to download {}", url))?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Human | OutputFormat::Table => {
            let how = match report.strategy {
                DownloadStrategy::SingleShot => "single request".to_string(),
                DownloadStrategy::Partitioned { parts } => format!("{} parts", parts),
            };
            println!(
                "{} Saved {} ({}, {})",
                style("✓").green().bold(),
                style(report.path.display()).cyan(),
                format_bytes(report.bytes),
                how
            );
        }
    }

    Ok(())
}

fn print_event(event: &CoreEvent) {
    match event {
        CoreEvent::StatusChanged { status, error, .. } => match error {
            Some(error) => eprintln!("{} {}: {}", style("✗").red().bold(), status, error),
            None => eprintln!("{} {}", style("→").dim(), style(status).dim()),
        },
        CoreEvent::PartCompleted { index, bytes, .. } => {
            eprintln!(
                "  {} part {} ({})",
                style("✓").green(),
                index,
                format_bytes(*bytes)
            );
        }
    }
}

// ============================================================================
// Probe Command
// ============================================================================

#[derive(Serialize)]
struct ProbeOutcome {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ProbeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn probe_urls(settings: Settings, urls: Vec<String>, format: OutputFormat) -> Result<()> {
    let downloader = Downloader::new(settings)?;

    let mut outcomes = Vec::with_capacity(urls.len());
    for url in urls {
        let outcome = match downloader.probe(&url).await {
            Ok(result) => ProbeOutcome {
                url,
                result: Some(result),
                error: None,
            },
            Err(e) => ProbeOutcome {
                url,
                result: None,
                error: Some(e.to_string()),
            },
        };
        outcomes.push(outcome);
    }

    match format {
        OutputFormat::Json => print_json(&outcomes)?,
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct ProbeRow {
                url: String,
                size: String,
                ranges: String,
            }

            let rows: Vec<ProbeRow> = outcomes
                .iter()
                .map(|outcome| ProbeRow {
                    url: outcome.url.clone(),
                    size: outcome
                        .result
                        .as_ref()
                        .map(|r| format_size(r.content_length))
                        .unwrap_or_else(|| "error".to_string()),
                    ranges: match &outcome.result {
                        Some(r) if r.supports_ranges => "Yes".to_string(),
                        Some(_) => "No".to_string(),
                        None => "-".to_string(),
                    },
                })
                .collect();

            println!("{}", Table::new(rows));
        }
        OutputFormat::Human => {
            for outcome in &outcomes {
                match (&outcome.result, &outcome.error) {
                    (Some(info), _) => {
                        println!("{} {}", style("✓").green(), outcome.url);
                        if let Some(ref final_url) = info.final_url {
                            println!("    Redirects to: {}", final_url);
                        }
                        println!("    Size: {}", format_size(info.content_length));
                        if let Some(ref ct) = info.content_type {
                            println!("    Type: {}", ct);
                        }
                        println!(
                            "    Ranges: {}",
                            if info.supports_ranges {
                                style("Yes").green()
                            } else {
                                style("No").yellow()
                            }
                        );
                    }
                    (None, error) => {
                        println!(
                            "{} {}: {}",
                            style("✗").red(),
                            outcome.url,
                            style(error.as_deref().unwrap_or("unknown error")).red()
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

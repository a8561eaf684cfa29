mod cli;
mod key;
mod render;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use mercury_client::{ApiClient, Annotator, AnnotatorConfig, Backend};
use mercury_core::{BufferId, CandidateOutcome, LabelRequest, Stage, TaskView, TextRange, range_of};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    tracing::debug!("mercury v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let client = ApiClient::new(cli.backend.clone());
    let config = AnnotatorConfig {
        debounce: Duration::from_millis(cli.debounce_ms),
    };

    match cli.command {
        Command::Tasks => {
            let count = client.task_count().await.context("fetching task count")?;
            println!("{count} tasks");
        }
        Command::Show { index } => {
            let client = optional_key(client, cli.user_key, &cli.key_file).await?;
            let mut ann = Annotator::new(Arc::new(client), config);
            let view = ann
                .open_task(index)
                .await
                .with_context(|| format!("opening task {index}"))?;
            print_view(view);
        }
        Command::Select {
            index,
            from,
            start,
            end,
        } => {
            let buffer = BufferId::from(from);
            let mut ann = Annotator::new(Arc::new(client), config);
            let view = ann
                .open_task(index)
                .await
                .with_context(|| format!("opening task {index}"))?;
            let len = view.len(buffer);
            if start.max(end) > len {
                bail!("range {start}..{end} is outside the {buffer} buffer (length {len})");
            }
            let gesture = view
                .layout(buffer)
                .gesture(start, end)
                .with_context(|| format!("no rendered text at {start}..{end}"))?;
            ann.gesture(&gesture)?;

            let captured = ann
                .view()
                .is_some_and(|v| v.machine().state().stage == Stage::FirstCaptured);
            if !captured {
                bail!("empty selection");
            }
            match ann.next_candidates().await {
                Some(CandidateOutcome::Applied(count)) => {
                    println!("{count} candidates in {}\n", buffer.opposite());
                }
                Some(CandidateOutcome::Failed) => bail!("candidate query failed"),
                Some(CandidateOutcome::Stale) | None => bail!("no candidate response"),
            }
            if let Some(view) = ann.view() {
                print_view(view);
            }
        }
        Command::Label {
            index,
            source,
            summary,
            inconsistent,
            note,
            tags,
        } => {
            let client = key::with_user_key(client, cli.user_key, &cli.key_file).await?;
            let mut ann = Annotator::new(Arc::new(client), config);
            ann.load_taxonomy().await.context("loading label taxonomy")?;
            for tag in &tags {
                if !ann.labels_mut().set(tag, true) {
                    bail!("unknown label {tag:?}");
                }
            }

            let task = ann
                .backend()
                .task(index)
                .await
                .with_context(|| format!("fetching task {index}"))?;
            let view = TaskView::new(index, task);
            let source = checked_range(&view, BufferId::Source, &source)?;
            let summary = checked_range(&view, BufferId::Summary, &summary)?;
            if source.is_none() && summary.is_none() {
                bail!("at least one side must be labelled");
            }

            let verdict = ann.verdict(!inconsistent, note);
            let request = LabelRequest::new(source, summary, verdict);
            ann.backend()
                .submit_label(index, &request)
                .await
                .context("submitting label")?;
            println!("label submitted for task {index}");
        }
        Command::History { index, show } => {
            let client = key::with_user_key(client, cli.user_key, &cli.key_file).await?;
            let mut ann = Annotator::new(Arc::new(client), config);
            ann.open_task(index)
                .await
                .with_context(|| format!("opening task {index}"))?;
            ann.refresh_history().await.context("fetching history")?;

            if let Some(record_id) = show {
                if ann.preview(&record_id)?.is_none() {
                    bail!("no record {record_id:?} in task {index}");
                }
                if let Some(view) = ann.view() {
                    print_view(view);
                }
                return Ok(());
            }
            if let Some(view) = ann.view() {
                if view.history().is_empty() {
                    println!("no records for task {index}");
                } else {
                    print!(
                        "{}",
                        render::render_history(
                            view.text(BufferId::Source),
                            view.text(BufferId::Summary),
                            view.history()
                        )
                    );
                }
            }
        }
        Command::Export { out } => {
            let client = key::with_user_key(client, cli.user_key, &cli.key_file).await?;
            let ann = Annotator::new(Arc::new(client), config);
            let records = ann.export().await.context("exporting records")?;
            let json = serde_json::to_string_pretty(&records)?;
            tokio::fs::write(&out, json)
                .await
                .with_context(|| format!("writing {}", out.display()))?;
            println!("{} records written to {}", records.len(), out.display());
        }
        Command::Delete { record_id } => {
            let client = key::with_user_key(client, cli.user_key, &cli.key_file).await?;
            client
                .delete_record(&record_id)
                .await
                .with_context(|| format!("deleting record {record_id}"))?;
            println!("deleted {record_id}");
        }
    }

    Ok(())
}

/// Attach a key if one is already known, without issuing a new one.
async fn optional_key(
    client: ApiClient,
    explicit: Option<String>,
    key_file: &Path,
) -> anyhow::Result<ApiClient> {
    let key = match explicit {
        Some(key) => Some(key),
        None => key::read_key_file(key_file).await?,
    };
    Ok(match key {
        Some(key) => client.with_user_key(key),
        None => client,
    })
}

/// Validate a `START END` pair from the command line against `buffer`.
fn checked_range(
    view: &TaskView,
    buffer: BufferId,
    pair: &[i64],
) -> anyhow::Result<Option<TextRange>> {
    let [start, end] = pair else {
        return Ok(None);
    };
    let Some(range) = range_of(*start, *end) else {
        return Ok(None);
    };
    let len = view.len(buffer);
    if range.end > len {
        bail!("{buffer} range {start}..{end} exceeds buffer length {len}");
    }
    if range.is_empty() {
        bail!("{buffer} range {start}..{end} is empty");
    }
    Ok(Some(range))
}

fn print_view(view: &TaskView) {
    println!("task {}", view.index());
    for buffer in [BufferId::Source, BufferId::Summary] {
        let marker = match view.machine().state().anchor_buffer {
            Some(anchor) if anchor == buffer => " (anchor)",
            _ => "",
        };
        println!("\n── {buffer}{marker} ──");
        print!(
            "{}",
            render::render_partition(view.text(buffer), &view.partition(buffer))
        );
    }
}

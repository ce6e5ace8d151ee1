use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use feedkit::elasticsearch::{push_bulk_file, EsClient};
use feedkit::{BulkConverter, Realigner};

/// One input/output pair
#[derive(Debug, Clone)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Where to load converted files, if anywhere
#[derive(Debug, Clone)]
pub struct PushTarget {
    pub es_url: String,
    pub index: String,
    pub batch_size: usize,
}

fn spinner() -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} lines ({per_sec}) {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

/// Convert every job in order, then optionally push the results
pub async fn run_jobs(jobs: &[Job], realigner: Realigner, push: Option<PushTarget>) -> Result<()> {
    info!(
        "Base time {} for {} file(s), field '{}'",
        realigner.base(),
        jobs.len(),
        realigner.field()
    );

    let es = match &push {
        Some(target) => {
            let client = EsClient::connect(&target.es_url, &target.index)
                .await
                .context("Failed to connect to Elasticsearch")?;
            info!("Connected to Elasticsearch at {}", target.es_url);
            Some((client, target.batch_size))
        }
        None => None,
    };

    let mut converter = BulkConverter::new(realigner);
    for job in jobs {
        let pb = spinner()?;
        pb.set_message(job.input.display().to_string());
        converter = converter.with_progress(pb.clone());

        let result = converter.convert_file(&job.input, &job.output);
        pb.finish_and_clear();
        result?;

        if let Some((client, batch_size)) = &es {
            let (indexed, errors) = push_bulk_file(client, &job.output, *batch_size).await?;
            info!(
                "Indexed {} documents from {} ({} errors)",
                indexed,
                job.output.display(),
                errors
            );
        }
    }

    if let Some((client, _)) = &es {
        info!(
            "Index '{}' now holds {} documents",
            client.target(),
            client.settled_count().await?
        );
    }

    Ok(())
}

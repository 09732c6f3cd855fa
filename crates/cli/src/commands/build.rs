//! Build command handler.
//!
//! Indexes one plain-text file, or every `.txt`/`.md` file under a directory.

use campus_core::{config::AppConfig, AppError, AppResult};
use campus_retrieval::{BuildStats, RetrievalEngine};
use clap::Args;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions picked up by `--dir`.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Build (or rebuild) document indexes
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Document id (defaults to the file stem)
    pub document_id: Option<String>,

    /// Plain-text file to index
    #[arg(long, conflicts_with = "dir", required_unless_present = "dir")]
    pub file: Option<PathBuf>,

    /// Directory of .txt/.md files to index, one document per file
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Maximum characters per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// A document to index: its id and source file.
#[derive(Debug, Clone)]
pub struct BuildJob {
    pub document_id: String,
    pub path: PathBuf,
}

/// Outcome of one build job.
#[derive(Debug)]
pub struct BuildOutcome {
    pub job: BuildJob,
    pub result: AppResult<BuildStats>,
}

impl BuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing build command");

        let mut config = config.clone();
        if let Some(chunk_size) = self.chunk_size {
            if chunk_size == 0 {
                return Err(AppError::Config(
                    "--chunk-size must be greater than 0".to_string(),
                ));
            }
            config.retrieval.chunk_size = chunk_size;
        }

        let engine = RetrievalEngine::open(&config)?;
        let jobs = self.collect_jobs()?;

        if jobs.is_empty() {
            println!("No documents to index");
            return Ok(());
        }

        let outcomes = build_all(&engine, jobs).await;

        let failed = outcomes
            .iter()
            .filter(|o| matches!(o.result, Err(ref e) if !matches!(e, AppError::EmptyInput { .. })))
            .count();

        if self.json {
            let output: Vec<serde_json::Value> = outcomes.iter().map(outcome_json).collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            for outcome in &outcomes {
                print_outcome(outcome);
            }
        }

        if failed > 0 {
            return Err(AppError::Other(format!(
                "{} of {} documents failed to build",
                failed,
                outcomes.len()
            )));
        }

        // A single empty document is an error; empty files in a directory are skipped
        if self.file.is_some() {
            if let Some(BuildOutcome { result: Err(e), .. }) = outcomes.into_iter().next() {
                return Err(e);
            }
        }

        Ok(())
    }

    fn collect_jobs(&self) -> AppResult<Vec<BuildJob>> {
        if let Some(file) = &self.file {
            let document_id = match &self.document_id {
                Some(id) => id.clone(),
                None => document_id_for(file)?,
            };
            return Ok(vec![BuildJob {
                document_id,
                path: file.clone(),
            }]);
        }

        match &self.dir {
            Some(dir) => collect_dir(dir),
            None => Err(AppError::Config(
                "either --file or --dir is required".to_string(),
            )),
        }
    }
}

/// Find every indexable file under `dir`, sorted by path.
pub fn collect_dir(dir: &Path) -> AppResult<Vec<BuildJob>> {
    if !dir.is_dir() {
        return Err(AppError::Config(format!("Not a directory: {:?}", dir)));
    }

    let mut jobs = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let is_text = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| TEXT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));

        if path.is_file() && is_text {
            jobs.push(BuildJob {
                document_id: document_id_for(path)?,
                path: path.to_path_buf(),
            });
        }
    }

    jobs.sort_by(|a, b| a.path.cmp(&b.path));

    // One build per document id; the first path wins
    let mut seen = HashSet::new();
    jobs.retain(|job| {
        let first = seen.insert(job.document_id.clone());
        if !first {
            tracing::warn!(
                "Skipping {:?}: document id '{}' is already taken",
                job.path,
                job.document_id
            );
        }
        first
    });

    tracing::debug!("Found {} documents under {:?}", jobs.len(), dir);
    Ok(jobs)
}

fn document_id_for(path: &Path) -> AppResult<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::InvalidDocumentId(path.display().to_string()))
}

/// Build every job on the blocking thread pool, concurrently.
///
/// Outcomes are returned in job order.
pub async fn build_all(engine: &RetrievalEngine, jobs: Vec<BuildJob>) -> Vec<BuildOutcome> {
    let tasks = jobs.into_iter().map(|job| {
        let engine = engine.clone();
        async move {
            let task_job = job.clone();
            let result = tokio::task::spawn_blocking(move || {
                let text = std::fs::read_to_string(&task_job.path).map_err(|e| {
                    AppError::Other(format!("Failed to read {:?}: {}", task_job.path, e))
                })?;
                engine.build(&task_job.document_id, &text)
            })
            .await
            .unwrap_or_else(|e| Err(AppError::Other(format!("Build task failed: {}", e))));

            if let Err(e) = &result {
                tracing::debug!("Build of '{}' failed: {}", job.document_id, e);
            }

            BuildOutcome { job, result }
        }
    });

    futures::future::join_all(tasks).await
}

fn outcome_json(outcome: &BuildOutcome) -> serde_json::Value {
    match &outcome.result {
        Ok(stats) => serde_json::json!({
            "documentId": stats.document_id,
            "path": outcome.job.path,
            "chunksCount": stats.chunks_count,
            "dimensions": stats.dimensions,
            "bytesProcessed": stats.bytes_processed,
            "durationSecs": stats.duration_secs,
        }),
        Err(e) => serde_json::json!({
            "documentId": outcome.job.document_id,
            "path": outcome.job.path,
            "error": e.to_string(),
        }),
    }
}

fn print_outcome(outcome: &BuildOutcome) {
    match &outcome.result {
        Ok(stats) => println!(
            "Indexed '{}' ({} chunks, {} terms, {} bytes) in {:.2}s",
            stats.document_id,
            stats.chunks_count,
            stats.dimensions,
            stats.bytes_processed,
            stats.duration_secs
        ),
        Err(AppError::EmptyInput { document_id }) => {
            println!("Skipped '{}': no text to index", document_id)
        }
        Err(e) => println!("Failed '{}': {}", outcome.job.document_id, e),
    }
}

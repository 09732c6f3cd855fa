//! Chunks and sections command handlers.
//!
//! Both work on a file directly and never touch the index store.

use campus_core::{config::AppConfig, AppError, AppResult};
use campus_retrieval::{chunker, detect_sections, section_content};
use clap::Args;
use std::path::{Path, PathBuf};

/// Show how a file would be chunked
#[derive(Args, Debug)]
pub struct ChunksCommand {
    /// Plain-text file to chunk
    #[arg(long)]
    pub file: PathBuf,

    /// Use the overlapping splitter instead of the sentence chunker
    #[arg(long)]
    pub overlap: bool,

    /// Maximum characters per chunk (default: retrieval.chunkSize)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChunksCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chunks command for {:?}", self.file);

        let text = read_text(&self.file)?;
        let chunk_size = self.chunk_size.unwrap_or(config.retrieval.chunk_size);

        let chunks = if self.overlap {
            chunker::chunk_overlapping(&text, chunk_size, config.retrieval.chunk_overlap)?
        } else {
            chunker::chunk_sentences(&text, chunk_size)
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&chunks)?);
            return Ok(());
        }

        for (i, chunk) in chunks.iter().enumerate() {
            println!("--- chunk {} ({} chars)", i, chunk.chars().count());
            println!("{}", chunk);
        }
        println!("{} chunks", chunks.len());

        Ok(())
    }
}

/// Detect headings in a file, or print selected sections
#[derive(Args, Debug)]
pub struct SectionsCommand {
    /// Plain-text file to scan
    #[arg(long)]
    pub file: PathBuf,

    /// Section ids to print, e.g. h0,h2
    #[arg(long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SectionsCommand {
    pub async fn execute(&self, _config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing sections command for {:?}", self.file);

        let text = read_text(&self.file)?;
        let sections = detect_sections(&text);

        if !self.select.is_empty() {
            let content = section_content(&text, &sections, &self.select);
            if self.json {
                let output = serde_json::json!({ "content": content });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print!("{}", content);
            }
            return Ok(());
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&sections)?);
            return Ok(());
        }

        if sections.is_empty() {
            println!("No headings detected");
            return Ok(());
        }

        for section in &sections {
            let indent = "  ".repeat(section.level.saturating_sub(1));
            println!(
                "{:<4} {}{} ({} words)",
                section.id, indent, section.heading, section.word_count
            );
        }

        Ok(())
    }
}

fn read_text(path: &Path) -> AppResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| AppError::Other(format!("Failed to read {:?}: {}", path, e)))
}

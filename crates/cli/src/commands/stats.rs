//! Index inspection and removal command handlers.

use campus_core::{config::AppConfig, AppResult};
use campus_retrieval::RetrievalEngine;
use clap::Args;

/// Show statistics for a document index
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Document id
    pub document_id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command for document '{}'", self.document_id);

        let engine = RetrievalEngine::open(config)?;
        let Some(stats) = engine.stats(&self.document_id)? else {
            println!("No index for '{}'", self.document_id);
            return Ok(());
        };

        let chunk_size = stats
            .chunk_size
            .map_or_else(|| "n/a (pre-chunked)".to_string(), |n| n.to_string());

        if self.json {
            let output = serde_json::json!({
                "documentId": stats.document_id,
                "store": config.store,
                "chunksCount": stats.chunks_count,
                "dimensions": stats.dimensions,
                "fingerprint": stats.fingerprint,
                "builtAt": stats.built_at.to_rfc3339(),
                "chunkSize": stats.chunk_size,
                "maxFeatures": stats.max_features,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Document: {}", stats.document_id);
            println!("Store: {}", config.store);
            println!("Chunks: {}", stats.chunks_count);
            println!("Terms: {}", stats.dimensions);
            println!("Built at: {}", stats.built_at.to_rfc3339());
            println!("Fingerprint: {}", stats.fingerprint);
            println!(
                "Settings: chunk size {}, max features {}",
                chunk_size, stats.max_features
            );
        }

        Ok(())
    }
}

/// List indexed documents
#[derive(Args, Debug)]
pub struct ListCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ListCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing list command");

        let engine = RetrievalEngine::open(config)?;
        let ids = engine.list()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&ids)?);
        } else if ids.is_empty() {
            println!("No indexed documents");
        } else {
            for id in ids {
                println!("{}", id);
            }
        }

        Ok(())
    }
}

/// Discard a document's index
#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Document id
    pub document_id: String,
}

impl DeleteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing delete command for document '{}'", self.document_id);

        let engine = RetrievalEngine::open(config)?;
        if engine.delete(&self.document_id)? {
            println!("Deleted index for '{}'", self.document_id);
        } else {
            println!("No index for '{}'", self.document_id);
        }

        Ok(())
    }
}

//! Query and context command handlers.

use campus_core::{config::AppConfig, AppResult};
use campus_retrieval::RetrievalEngine;
use clap::Args;

/// Rank a document's chunks against a question
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// Document id
    pub document_id: String,

    /// Query text
    pub query: String,

    /// Number of chunks to retrieve (default: retrieval.topK)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing query command for document '{}'", self.document_id);

        let engine = RetrievalEngine::open(config)?;
        let k = self.top_k.unwrap_or(engine.config().top_k);
        let results = engine.query(&self.document_id, &self.query, k)?;

        if self.json {
            let output = serde_json::json!({
                "documentId": self.document_id,
                "query": self.query,
                "results": results,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        if results.is_empty() {
            println!("No chunks found for '{}'", self.document_id);
            return Ok(());
        }

        for (rank, chunk) in results.iter().enumerate() {
            println!(
                "[{}] score {:.3} (chunk {})",
                rank + 1,
                chunk.score,
                chunk.position
            );
            println!("{}", chunk.text);
            println!();
        }

        Ok(())
    }
}

/// Print the retrieved chunks as a prompt context block
#[derive(Args, Debug)]
pub struct ContextCommand {
    /// Document id
    pub document_id: String,

    /// Query text
    pub query: String,

    /// Number of chunks to include (default: retrieval.topK)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,
}

impl ContextCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing context command for document '{}'", self.document_id);

        let engine = RetrievalEngine::open(config)?;
        let k = self.top_k.unwrap_or(engine.config().top_k);
        let context = engine.context(&self.document_id, &self.query, k)?;

        if context.is_empty() {
            tracing::warn!("No context retrieved for '{}'", self.document_id);
        } else {
            println!("{}", context);
        }

        Ok(())
    }
}

//! Bulk loading of converted documents into Elasticsearch.

use std::io::{BufRead, Lines};
use std::path::Path;

use anyhow::{Context, Result};
use elasticsearch::http::request::JsonBody;
use elasticsearch::BulkParts;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::EsClient;
use crate::bulk::open_input;

/// Buffers documents and sends them as `create` operations
pub struct BulkIndexer {
    client: EsClient,
    batch_size: usize,
    buffer: Vec<Value>,
    total_indexed: usize,
    total_errors: usize,
}

impl BulkIndexer {
    pub fn new(client: EsClient, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            client,
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            total_indexed: 0,
            total_errors: 0,
        }
    }

    /// Add a document to the buffer, flushing if batch is full
    pub async fn add(&mut self, doc: Value) -> Result<()> {
        self.buffer.push(doc);

        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }

        Ok(())
    }

    /// Flush the buffer to Elasticsearch
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let docs = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.batch_size));
        let count = docs.len();

        debug!("Flushing {} documents to Elasticsearch", count);

        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(count * 2);
        for doc in docs {
            body.push(serde_json::json!({ "create": {} }).into());
            body.push(doc.into());
        }

        let response = self
            .client
            .client()
            .bulk(BulkParts::Index(self.client.target()))
            .body(body)
            .send()
            .await
            .context("Bulk request failed")?;

        let status = response.status_code();
        let response_body = response.json::<Value>().await?;
        if !status.is_success() {
            anyhow::bail!("Bulk request rejected with {}: {}", status, response_body);
        }

        let error_count = count_item_errors(&response_body);
        if error_count > 0 {
            self.total_errors += error_count;
            warn!(
                "Bulk request had {} errors out of {} documents",
                error_count, count
            );
        }

        self.total_indexed += count - error_count;
        Ok(())
    }

    /// Finish indexing and return `(indexed, errors)`
    pub async fn finish(mut self) -> Result<(usize, usize)> {
        self.flush().await?;
        Ok((self.total_indexed, self.total_errors))
    }
}

/// Count failed items in a bulk response
fn count_item_errors(response: &Value) -> usize {
    if !response["errors"].as_bool().unwrap_or(false) {
        return 0;
    }
    response["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|item| item["create"]["error"].is_object())
                .count()
        })
        .unwrap_or(0)
}

/// Iterates the document lines of a bulk file, checking each action line
pub struct BulkDocuments<R> {
    lines: Lines<R>,
    line_num: usize,
}

impl<R: BufRead> BulkDocuments<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_num: 0,
        }
    }

    fn next_line(&mut self) -> Option<Result<String>> {
        loop {
            let line = self.lines.next()?;
            self.line_num += 1;
            match line {
                Ok(l) if l.trim().is_empty() => continue,
                Ok(l) => return Some(Ok(l)),
                Err(e) => {
                    let line_num = self.line_num;
                    return Some(
                        Err::<String, _>(e)
                            .with_context(|| format!("Failed to read line {}", line_num)),
                    );
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for BulkDocuments<R> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let action = match self.next_line()? {
            Ok(l) => l,
            Err(e) => return Some(Err(e)),
        };
        let action_line = self.line_num;

        let is_create = serde_json::from_str::<Value>(&action)
            .map(|v| v.get("create").is_some())
            .unwrap_or(false);
        if !is_create {
            return Some(Err(anyhow::anyhow!(
                "Expected a create action at line {}",
                action_line
            )));
        }

        let doc = match self.next_line() {
            Some(Ok(l)) => l,
            Some(Err(e)) => return Some(Err(e)),
            None => {
                return Some(Err(anyhow::anyhow!(
                    "Action at line {} has no document",
                    action_line
                )))
            }
        };

        Some(
            serde_json::from_str(&doc)
                .with_context(|| format!("Invalid document at line {}", self.line_num)),
        )
    }
}

/// Load a bulk file written by the converter into the client's index
pub async fn push_bulk_file(
    client: &EsClient,
    path: &Path,
    batch_size: usize,
) -> Result<(usize, usize)> {
    info!(
        "Pushing {} to index '{}'",
        path.display(),
        client.target()
    );

    let mut indexer = BulkIndexer::new(client.clone(), batch_size);
    for doc in BulkDocuments::new(open_input(path)?) {
        indexer.add(doc?).await?;
    }
    indexer.finish().await
}

use std::path::PathBuf;

use async_trait::async_trait;
use opsgate_core::registry::parse_args;
use opsgate_core::{ParamType, ToolContext, ToolDescriptor, ToolError, ToolHandler, ToolOutput};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::files::{read_text, write_output};

#[derive(Debug, Deserialize)]
struct Args {
    file_path: PathBuf,
    file_dest: PathBuf,
}

/// Finds the two most similar lines of a file using embeddings.
pub struct SimilarTexts;

#[async_trait]
impl ToolHandler for SimilarTexts {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "similar_texts",
            "Embed every non-empty line of a text file, find the pair of lines with \
             the highest cosine similarity, and write that pair (one per line) to a \
             destination file.",
        )
        .required("file_path", ParamType::String, "Path of the file, one text per line")
        .required("file_dest", ParamType::String, "Path to write the most similar pair to")
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(arguments)?;
        let text = read_text(&args.file_path).await?;

        let lines: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if lines.len() < 2 {
            return Err(ToolError::InvalidInput(format!(
                "need at least two non-empty lines, found {}",
                lines.len()
            )));
        }

        let embeddings = ctx.llm.embed(&lines).await?;
        if embeddings.len() != lines.len() {
            return Err(ToolError::InvalidInput(format!(
                "got {} embeddings for {} lines",
                embeddings.len(),
                lines.len()
            )));
        }

        let (i, j, score) = most_similar_pair(&embeddings)
            .ok_or_else(|| ToolError::InvalidInput("no pair to compare".into()))?;
        debug!("Most similar pair: lines {i} and {j} ({score:.4})");

        write_output(&args.file_dest, &format!("{}\n{}\n", lines[i], lines[j])).await?;
        Ok(ToolOutput::new(format!(
            "most similar pair (cosine {score:.4}) written to {}",
            args.file_dest.display()
        )))
    }
}

/// Indices and score of the pair with the highest cosine similarity. Ties keep the first pair.
fn most_similar_pair(vectors: &[Vec<f32>]) -> Option<(usize, usize, f32)> {
    let mut best: Option<(usize, usize, f32)> = None;
    for i in 0..vectors.len() {
        for j in (i + 1)..vectors.len() {
            let score = cosine(&vectors[i], &vectors[j]);
            if best.map_or(true, |(_, _, top)| score > top) {
                best = Some((i, j, score));
            }
        }
    }
    best
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

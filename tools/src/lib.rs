//! Built-in tool handlers.
//!
//! Every handler reads its input, transforms it (locally, through a child
//! process, or through the language model) and writes the result to a
//! destination file. No handler calls another.

mod count_days;
mod database;
mod dataset;
mod email;
mod files;
mod format;
mod image;
mod markdown_titles;
mod process;
mod recent_logs;
mod similar_texts;
mod sort_json;

use opsgate_core::{Registry, RegistryError};

pub use count_days::CountDays;
pub use database::QueryDatabase;
pub use dataset::GenerateDataset;
pub use email::ExtractEmail;
pub use format::FormatFile;
pub use image::ExtractFromImage;
pub use markdown_titles::MarkdownTitles;
pub use recent_logs::RecentLogs;
pub use similar_texts::SimilarTexts;
pub use sort_json::SortJson;

/// The full catalog, in the order it is offered to the model.
pub fn builtin_registry() -> Result<Registry, RegistryError> {
    Registry::builder()
        .register(GenerateDataset)
        .register(FormatFile)
        .register(CountDays)
        .register(SortJson)
        .register(RecentLogs)
        .register(MarkdownTitles)
        .register(ExtractEmail)
        .register(ExtractFromImage)
        .register(SimilarTexts)
        .register(QueryDatabase)
        .build()
}

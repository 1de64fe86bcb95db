// Terminal and markdown rendering of pipeline results

use std::fmt::Write as _;

use clap::ValueEnum;

use crate::database::lancedb::RetrievedChunk;
use crate::pipeline::CompletedRun;

pub const PREVIEW_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

/// Escape angle brackets so model output cannot inject markup
#[inline]
pub fn escape_markup(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

/// First `max_chars` characters of `text`, with an ellipsis when cut
#[inline]
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        head + "..."
    } else {
        head
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// One-line summary of a retrieved chunk followed by an indented preview
#[inline]
pub fn chunk_card(index: usize, chunk: &RetrievedChunk) -> String {
    let metadata = &chunk.metadata;
    format!(
        "#{} {} | {} | {} | distance {:.4}\n    {}",
        index,
        metadata.equipment_type,
        title_case(metadata.severity.as_str()),
        metadata.chunk_type,
        chunk.distance,
        preview(&chunk.text, PREVIEW_CHARS)
    )
}

#[inline]
pub fn render_run(run: &CompletedRun, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(render_text(run)),
        OutputFormat::Markdown => Ok(render_markdown(run)),
        OutputFormat::Json => serde_json::to_string_pretty(run),
    }
}

fn render_text(run: &CompletedRun) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Rewritten query: {}", run.retrieval_query);
    let _ = writeln!(
        out,
        "\nRetrieved {} chunks from the maintenance knowledge base:",
        run.retrieved_chunks.len()
    );
    for (i, chunk) in run.retrieved_chunks.iter().enumerate() {
        let _ = writeln!(out, "{}", chunk_card(i + 1, chunk));
    }
    let _ = writeln!(out, "\nKnowledge analysis:\n{}", run.knowledge_analysis);
    let _ = writeln!(out, "\nResponse:\n{}", run.final_response);
    let _ = writeln!(out, "\nCompleted in {:.2?}", run.total_elapsed());

    out
}

fn render_markdown(run: &CompletedRun) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "## Retrieval\n");
    let _ = writeln!(out, "**Rewritten Query:** {}\n", escape_markup(&run.retrieval_query));
    let _ = writeln!(
        out,
        "**Retrieved {} chunks** from maintenance knowledge base\n",
        run.retrieved_chunks.len()
    );
    for (i, chunk) in run.retrieved_chunks.iter().enumerate() {
        let metadata = &chunk.metadata;
        let _ = writeln!(
            out,
            "- **#{}** {} | {} | {} | Distance: {:.4}\n  > {}",
            i + 1,
            escape_markup(&metadata.equipment_type),
            title_case(metadata.severity.as_str()),
            metadata.chunk_type,
            chunk.distance,
            escape_markup(&preview(&chunk.text, PREVIEW_CHARS))
        );
    }
    let _ = writeln!(
        out,
        "\n## Knowledge Extraction\n\n{}",
        escape_markup(&run.knowledge_analysis)
    );
    let _ = writeln!(
        out,
        "\n## Response Synthesis\n\n{}",
        escape_markup(&run.final_response)
    );

    out
}

//! Prompt builders, one per language model stage.

use std::fmt::Write as _;

use crate::database::lancedb::RetrievedChunk;

#[inline]
pub fn rewrite_prompt(query: &str) -> String {
    format!(
        r#"You are a maintenance knowledge system query optimiser. A junior engineer
has asked the following question:

"{query}"

Rewrite this as a precise technical query optimised for searching a vector database of heavy
vehicle maintenance logs. The database contains fault descriptions, symptoms, diagnostic steps,
root causes, resolutions, parts replaced, and engineer notes for trucks and armoured vehicles.

Focus on key technical terms, fault types, symptoms, and equipment categories.
Return ONLY the rewritten query, nothing else."#
    )
}

/// Serialize retrieved chunks as numbered blocks with their metadata inline
#[inline]
pub fn format_chunks(chunks: &[RetrievedChunk]) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let metadata = &chunk.metadata;
        let _ = write!(
            out,
            "\n--- Chunk {} (type: {}, equipment: {}, severity: {}, distance: {:.4}) ---\n{}\n",
            i + 1,
            metadata.chunk_type,
            metadata.equipment_type,
            metadata.severity,
            chunk.distance,
            chunk.text
        );
    }
    out
}

#[inline]
pub fn extraction_prompt(query: &str, chunks: &[RetrievedChunk]) -> String {
    let chunks = format_chunks(chunks);
    format!(
        r#"You are an expert heavy vehicle maintenance analyst. You have been given
retrieved maintenance log chunks related to a technician's query.

QUERY: {query}

RETRIEVED MAINTENANCE DATA:
{chunks}

Analyse the retrieved data and provide:
1. **Fault Patterns**: Common fault patterns relevant to this query across equipment types.
2. **Diagnostic Heuristics**: Step-by-step diagnostic approach based on historical data.
3. **Root Causes**: Most likely root causes ranked by frequency in the data.
4. **Recommended Resolutions**: What worked before, including parts and repair times.
5. **Warnings & Notes**: Any engineer notes or recurring issues to watch for.

Be specific: reference equipment types, part numbers, and repair times from the data.
Structure your analysis clearly with headers."#
    )
}

#[inline]
pub fn synthesis_prompt(query: &str, analysis: &str) -> String {
    format!(
        r#"You are a helpful senior maintenance engineer assisting a junior technician.

The junior engineer asked: "{query}"

Based on analysis of our maintenance knowledge base, here is what was found:

{analysis}

Now write a clear, actionable response for the junior engineer. Use plain language they can
understand and act on. Include:
- What the most likely problem is
- How to diagnose it step by step
- What the fix usually involves (parts, tools, time)
- Any safety warnings or things to watch out for

Keep it practical and direct. If there are multiple possible causes, rank them by likelihood."#
    )
}

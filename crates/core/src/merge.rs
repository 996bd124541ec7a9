//! Merging per-slide results into one ordered, attributed document.

use crate::error::{Error, Result};
use crate::router::{ComplexRecord, SimpleSlide, TableRecord};
use crate::text::derive_title;
use crate::types::{source_id, Category, ExtractionRecord, MergedDocument};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

pub const SIMPLE_SECTION_HEADER: &str = "# Simple Slides (Text Extraction)";
pub const COMPLEX_SECTION_HEADER: &str = "# Complex Slides (Visual Analysis)";
pub const TABLE_SECTION_HEADER: &str = "# Table Slides (Table Analysis)";

/// Markdown for the simple slides alone: one `## source` block per slide.
pub fn simple_section_markdown(simple: &[SimpleSlide]) -> String {
    let mut sorted: Vec<&SimpleSlide> = simple.iter().collect();
    sorted.sort_by_key(|s| s.slide);
    sorted
        .iter()
        .map(|s| format!("## {}\n\n{}", s.source, s.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Combine the three category outputs.
///
/// Sections appear as simple, complex, table; inside each, slides ascend.
/// Every slide contributes exactly one record. A slide index that occurs more
/// than once across all inputs is rejected.
pub fn merge(
    simple: &[SimpleSlide],
    complex: &[ComplexRecord],
    tables: &[TableRecord],
    doc_name: &str,
    timestamp: DateTime<Utc>,
) -> Result<MergedDocument> {
    let mut seen = HashSet::new();
    let all_indices = simple
        .iter()
        .map(|s| s.slide)
        .chain(complex.iter().map(|c| c.slide))
        .chain(tables.iter().map(|t| t.slide));
    for slide in all_indices {
        if !seen.insert(slide) {
            return Err(Error::Merge(format!(
                "slide {} appears in more than one result",
                slide
            )));
        }
    }

    let mut simple: Vec<&SimpleSlide> = simple.iter().collect();
    let mut complex: Vec<&ComplexRecord> = complex.iter().collect();
    let mut tables: Vec<&TableRecord> = tables.iter().collect();
    simple.sort_by_key(|s| s.slide);
    complex.sort_by_key(|c| c.slide);
    tables.sort_by_key(|t| t.slide);

    let mut markdown = String::new();
    let mut records = Vec::with_capacity(simple.len() + complex.len() + tables.len());
    let record = |slide: usize, category: Category, body: &str| ExtractionRecord {
        source: source_id(doc_name, slide),
        slide,
        category,
        title: record_title(body, slide),
        content: body.to_string(),
        last_updated: timestamp,
    };

    if !simple.is_empty() {
        markdown.push_str(SIMPLE_SECTION_HEADER);
        markdown.push_str("\n\n");
        for block in &simple {
            markdown.push_str(&format!("## {}\n\n{}\n\n", block.source, block.text));
            records.push(record(block.slide, Category::Simple, &block.text));
        }
    }

    if !complex.is_empty() {
        markdown.push_str(COMPLEX_SECTION_HEADER);
        markdown.push_str("\n\n");
        for entry in &complex {
            markdown.push_str(&entry.markdown);
            markdown.push_str("\n\n");
            let header = format!("## {}", source_id(doc_name, entry.slide));
            let body = entry
                .markdown
                .strip_prefix(&header)
                .unwrap_or(&entry.markdown)
                .trim();
            records.push(record(entry.slide, Category::Complex, body));
        }
    }

    if !tables.is_empty() {
        markdown.push_str(TABLE_SECTION_HEADER);
        markdown.push_str("\n\n");
        for entry in &tables {
            markdown.push_str(&format!(
                "## {}\n\n{}\n\n",
                source_id(doc_name, entry.slide),
                entry.description
            ));
            records.push(record(entry.slide, Category::Table, &entry.description));
        }
    }

    log::info!(
        "Merged {} simple, {} complex and {} table slides into {} records",
        simple.len(),
        complex.len(),
        tables.len(),
        records.len()
    );

    Ok(MergedDocument {
        markdown: markdown.trim_end().to_string(),
        records,
    })
}

fn record_title(body: &str, slide: usize) -> String {
    let title = derive_title(body);
    if title.is_empty() {
        format!("Slide {}", slide)
    } else {
        title
    }
}

//! Domain types for representing parsed slides and extracted content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape names that mark layout infrastructure rather than content.
const PLACEHOLDER_NAME_MARKERS: &[&str] = &["footer", "slide number", "placeholder"];

/// Represents an entire presentation as an ordered list of slides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presentation {
    /// Original filename (without path).
    pub filename: String,

    /// Detected format of the source file.
    pub format: PresentationFormat,

    /// Slides in presentation order.
    pub slides: Vec<Slide>,
}

impl Presentation {
    /// Create a new presentation with the given filename and format.
    pub fn new(filename: impl Into<String>, format: PresentationFormat) -> Self {
        Self {
            filename: filename.into(),
            format,
            slides: Vec::new(),
        }
    }

    /// Add a slide to the presentation.
    pub fn add_slide(&mut self, slide: Slide) {
        self.slides.push(slide);
    }
}

/// The format of the source presentation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationFormat {
    /// Modern PPTX (Office Open XML).
    Pptx,
    /// Legacy PPT (OLE/CFB binary). Detected so it can be rejected clearly.
    Ppt,
}

impl PresentationFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pptx" => Some(Self::Pptx),
            "ppt" => Some(Self::Ppt),
            _ => None,
        }
    }

    /// Detect format from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // PPTX is a ZIP file (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Pptx);
        }

        // PPT is an OLE/CFB file (D0 CF 11 E0 A1 B1 1A E1)
        if bytes.len() >= 8
            && bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1])
        {
            return Some(Self::Ppt);
        }

        None
    }
}

/// Position and size of a shape, in EMU.
///
/// Not consulted by classification, but kept so slides can be re-exported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

/// Cell text of a table, row by row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableGrid {
    pub rows: Vec<Vec<String>>,
}

impl TableGrid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Render the populated cells of each row joined with `" | "`, one row per line.
    ///
    /// Empty cells are skipped and rows without any text are dropped.
    pub fn to_text(&self) -> String {
        self.rows
            .iter()
            .filter_map(|row| {
                let cells: Vec<&str> = row
                    .iter()
                    .map(|c| c.trim())
                    .filter(|c| !c.is_empty())
                    .collect();
                if cells.is_empty() {
                    None
                } else {
                    Some(cells.join(" | "))
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether any cell has non-whitespace text.
    pub fn has_text(&self) -> bool {
        self.rows
            .iter()
            .flatten()
            .any(|cell| !cell.trim().is_empty())
    }
}

/// The kind of a shape. Closed so every dispatch site must handle each kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ShapeKind {
    TextBox,
    AutoShape,
    Table(TableGrid),
    Picture,
    /// Straight lines and connectors.
    Connector,
    Group(Vec<Shape>),
    /// A shape bound to the slide layout (title, body, footer, date, ...).
    Placeholder,
    /// Charts, diagrams, OLE objects and anything else we do not inspect.
    Other,
}

/// A visual element on a slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// Shape name as authored (e.g. "Rectangle 3", "Footer Placeholder 4").
    pub name: String,

    pub kind: ShapeKind,

    pub geometry: Geometry,

    /// Text frame content, paragraphs separated by `\n`. `None` for shapes
    /// without a text frame.
    pub text: Option<String>,
}

impl Shape {
    /// Create a shape without text or geometry.
    pub fn new(name: impl Into<String>, kind: ShapeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            geometry: Geometry::default(),
            text: None,
        }
    }

    /// Attach text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attach geometry.
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Trimmed text of this shape's own text frame, if non-empty.
    pub fn own_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Whether this shape is layout infrastructure rather than content.
    pub fn is_placeholder(&self) -> bool {
        if matches!(self.kind, ShapeKind::Placeholder) {
            return true;
        }
        let name = self.name.to_lowercase();
        PLACEHOLDER_NAME_MARKERS.iter().any(|m| name.contains(m))
    }

    /// Append every non-empty text fragment of this shape, in traversal order.
    ///
    /// Tables contribute one `" | "`-joined line per row; groups contribute
    /// the text of their children.
    pub fn collect_text<'a>(&'a self, out: &mut Vec<std::borrow::Cow<'a, str>>) {
        if let Some(text) = self.own_text() {
            out.push(text.into());
        }
        match &self.kind {
            ShapeKind::Table(grid) => {
                let table_text = grid.to_text();
                if !table_text.is_empty() {
                    out.push(table_text.into());
                }
            }
            ShapeKind::Group(children) => {
                for child in children {
                    child.collect_text(out);
                }
            }
            ShapeKind::TextBox
            | ShapeKind::AutoShape
            | ShapeKind::Picture
            | ShapeKind::Connector
            | ShapeKind::Placeholder
            | ShapeKind::Other => {}
        }
    }
}

/// Derived shape-kind flags for a slide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SlideFlags {
    pub has_table: bool,
    pub has_textbox: bool,
    pub has_picture: bool,
    pub has_connector: bool,
    pub has_group: bool,
}

/// One page of a presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    /// 1-based slide number.
    pub index: usize,

    /// Top-level shapes in document order.
    pub shapes: Vec<Shape>,

    /// Set when the slide XML could only be partially read.
    pub read_error: Option<String>,
}

impl Slide {
    /// Create a new slide with the given number and shapes.
    pub fn new(index: usize, shapes: Vec<Shape>) -> Self {
        Self {
            index,
            shapes,
            read_error: None,
        }
    }

    /// Create a slide whose content could not be read.
    pub fn unreadable(index: usize, shapes: Vec<Shape>, reason: impl Into<String>) -> Self {
        Self {
            index,
            shapes,
            read_error: Some(reason.into()),
        }
    }

    /// Shape-kind flags over the top-level shapes.
    pub fn flags(&self) -> SlideFlags {
        let mut flags = SlideFlags::default();
        for shape in &self.shapes {
            match shape.kind {
                ShapeKind::Table(_) => flags.has_table = true,
                ShapeKind::TextBox => flags.has_textbox = true,
                ShapeKind::Picture => flags.has_picture = true,
                ShapeKind::Connector => flags.has_connector = true,
                ShapeKind::Group(_) => flags.has_group = true,
                ShapeKind::AutoShape | ShapeKind::Placeholder | ShapeKind::Other => {}
            }
        }
        flags
    }

    /// All non-empty text on the slide, one fragment per line.
    pub fn text(&self) -> String {
        let mut parts = Vec::new();
        for shape in &self.shapes {
            shape.collect_text(&mut parts);
        }
        parts.join("\n")
    }
}

/// Extraction strategy a slide is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Table,
    Complex,
    Simple,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Table => "table",
            Category::Complex => "complex",
            Category::Simple => "simple",
        };
        f.write_str(name)
    }
}

/// Partition of the valid slide indices into categories.
///
/// Each index appears in exactly one list; lists are kept ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub table: Vec<usize>,
    pub complex: Vec<usize>,
    pub simple: Vec<usize>,
}

impl ClassificationResult {
    /// Record the category of a slide. An index already present is moved.
    pub fn assign(&mut self, slide: usize, category: Category) {
        for list in [&mut self.table, &mut self.complex, &mut self.simple] {
            list.retain(|&s| s != slide);
        }
        let list = match category {
            Category::Table => &mut self.table,
            Category::Complex => &mut self.complex,
            Category::Simple => &mut self.simple,
        };
        let pos = list.partition_point(|&s| s < slide);
        list.insert(pos, slide);
    }

    /// Category of a slide, if it was classified.
    pub fn category_of(&self, slide: usize) -> Option<Category> {
        if self.table.binary_search(&slide).is_ok() {
            Some(Category::Table)
        } else if self.complex.binary_search(&slide).is_ok() {
            Some(Category::Complex)
        } else if self.simple.binary_search(&slide).is_ok() {
            Some(Category::Simple)
        } else {
            None
        }
    }

    /// Number of classified slides.
    pub fn len(&self) -> usize {
        self.table.len() + self.complex.len() + self.simple.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Format the source identifier of a slide: `"{doc}:slide-{n}"`.
pub fn source_id(doc_name: &str, slide: usize) -> String {
    format!("{}:slide-{}", doc_name, slide)
}

/// One attributed unit of extracted content, ready for ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// `"{doc}:slide-{n}"`.
    pub source: String,

    pub slide: usize,

    pub category: Category,

    pub title: String,

    pub content: String,

    pub last_updated: DateTime<Utc>,
}

/// Final merged output of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedDocument {
    /// Simple, complex and table sections concatenated in that order.
    pub markdown: String,

    /// Flat record list, grouped by section in the same order.
    pub records: Vec<ExtractionRecord>,
}

impl MergedDocument {
    pub fn is_empty(&self) -> bool {
        self.markdown.is_empty() && self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(
            PresentationFormat::from_magic(&[0x50, 0x4B, 0x03, 0x04, 0, 0, 0, 0]),
            Some(PresentationFormat::Pptx)
        );
        assert_eq!(
            PresentationFormat::from_magic(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]),
            Some(PresentationFormat::Ppt)
        );
        assert_eq!(PresentationFormat::from_magic(b"ab"), None);
        assert_eq!(
            PresentationFormat::from_extension("PPTX"),
            Some(PresentationFormat::Pptx)
        );
        assert_eq!(PresentationFormat::from_extension("key"), None);
    }

    #[test]
    fn test_table_text_skips_empty_cells() {
        let grid = TableGrid::new(vec![
            vec!["Region".into(), "".into(), "Q1".into()],
            vec![" ".into(), "".into()],
            vec!["North".into(), "12".into()],
        ]);
        assert_eq!(grid.to_text(), "Region | Q1\nNorth | 12");
        assert!(grid.has_text());
        assert!(!TableGrid::default().has_text());
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(Shape::new("Footer Placeholder 3", ShapeKind::TextBox).is_placeholder());
        assert!(Shape::new("Slide Number 2", ShapeKind::AutoShape).is_placeholder());
        assert!(Shape::new("Title 1", ShapeKind::Placeholder).is_placeholder());
        assert!(!Shape::new("TextBox 5", ShapeKind::TextBox).is_placeholder());
    }

    #[test]
    fn test_slide_text_walks_tables_and_groups() {
        let slide = Slide::new(
            1,
            vec![
                Shape::new("Title 1", ShapeKind::Placeholder).with_text("  Overview "),
                Shape::new(
                    "Table 2",
                    ShapeKind::Table(TableGrid::new(vec![vec!["a".into(), "b".into()]])),
                ),
                Shape::new(
                    "Group 3",
                    ShapeKind::Group(vec![
                        Shape::new("Oval 4", ShapeKind::AutoShape).with_text("inner"),
                        Shape::new("Picture 5", ShapeKind::Picture),
                    ]),
                ),
                Shape::new("TextBox 6", ShapeKind::TextBox).with_text("   "),
            ],
        );
        assert_eq!(slide.text(), "Overview\na | b\ninner");
    }

    #[test]
    fn test_flags() {
        let slide = Slide::new(
            2,
            vec![
                Shape::new("Picture 1", ShapeKind::Picture),
                Shape::new("Straight Connector 2", ShapeKind::Connector),
            ],
        );
        let flags = slide.flags();
        assert!(flags.has_picture);
        assert!(flags.has_connector);
        assert!(!flags.has_table);
        assert!(!flags.has_group);
    }

    #[test]
    fn test_classification_assign_keeps_partition_sorted() {
        let mut result = ClassificationResult::default();
        result.assign(4, Category::Simple);
        result.assign(2, Category::Simple);
        result.assign(3, Category::Table);
        result.assign(4, Category::Complex);
        assert_eq!(result.simple, vec![2]);
        assert_eq!(result.table, vec![3]);
        assert_eq!(result.complex, vec![4]);
        assert_eq!(result.category_of(4), Some(Category::Complex));
        assert_eq!(result.category_of(9), None);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_source_id() {
        assert_eq!(source_id("deck.pptx", 5), "deck.pptx:slide-5");
    }
}

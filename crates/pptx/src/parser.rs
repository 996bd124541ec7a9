//! PPTX shape-tree parser.

use deck_core::{
    Error, Geometry, Presentation, PresentationFormat, Result, Shape, ShapeKind, Slide,
    SlideSource, TableGrid,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

pub(crate) const PRESENTATION_PATH: &str = "ppt/presentation.xml";
pub(crate) const PRESENTATION_RELS_PATH: &str = "ppt/_rels/presentation.xml.rels";

/// Parser for PPTX (Office Open XML) files.
pub struct PptxParser;

impl PptxParser {
    /// Create a new PPTX parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse a PPTX file from a reader.
    ///
    /// A slide whose XML cannot be read is kept as an unreadable slide so
    /// the rest of the deck still parses.
    pub fn parse<R: Read + Seek>(&self, reader: R, filename: &str) -> Result<Presentation> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::Parse(format!("Failed to open ZIP: {}", e)))?;

        let mut presentation = Presentation::new(filename, PresentationFormat::Pptx);
        let slide_order = self.slide_order(&mut archive)?;
        log::debug!("{}: {} slides in presentation order", filename, slide_order.len());

        for (idx, slide_path) in slide_order.iter().enumerate() {
            let index = idx + 1;
            let slide = match read_file_from_archive(&mut archive, slide_path)
                .and_then(|xml| parse_shape_tree(&xml))
            {
                Ok(shapes) => Slide::new(index, shapes),
                Err(reason) => {
                    log::warn!("Slide {} ({}) is unreadable: {}", index, slide_path, reason);
                    Slide::unreadable(index, Vec::new(), reason)
                }
            };
            presentation.add_slide(slide);
        }

        Ok(presentation)
    }

    /// Ordered slide part paths.
    ///
    /// The `sldIdLst` in presentation.xml defines the order. Without it, slide
    /// parts are ordered by the number in their file name.
    fn slide_order<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
        let rels_content = read_file_from_archive(archive, PRESENTATION_RELS_PATH)
            .map_err(Error::Parse)?;
        let rels = parse_slide_relationships(&rels_content)?;

        let listed = match read_file_from_archive(archive, PRESENTATION_PATH) {
            Ok(xml) => parse_slide_id_list(&xml)?,
            Err(e) => {
                log::warn!("{}; ordering slides by part name", e);
                Vec::new()
            }
        };

        let ordered: Vec<String> = listed
            .iter()
            .filter_map(|rid| rels.get(rid).cloned())
            .collect();
        if !ordered.is_empty() {
            return Ok(ordered);
        }

        let mut slides: Vec<(String, Option<usize>)> = rels
            .into_values()
            .map(|path| {
                let number = path.rsplit('/').next().and_then(extract_slide_number);
                (path, number)
            })
            .collect();
        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });
        Ok(slides.into_iter().map(|(path, _)| path).collect())
    }
}

impl Default for PptxParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SlideSource for PptxParser {
    fn open(&self, path: &Path) -> Result<Vec<Slide>> {
        let mut file = File::open(path)?;
        let mut magic = [0u8; 8];
        let read = file.read(&mut magic)?;
        file.rewind()?;

        let by_magic = PresentationFormat::from_magic(&magic[..read]);
        let by_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(PresentationFormat::from_extension);
        if by_magic == Some(PresentationFormat::Ppt)
            || (by_magic.is_none() && by_extension == Some(PresentationFormat::Ppt))
        {
            return Err(Error::UnsupportedFormat(format!(
                "{} is a legacy binary .ppt file; convert it to .pptx first",
                path.display()
            )));
        }

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");
        Ok(self.parse(BufReader::new(file), filename)?.slides)
    }
}

/// Map of relationship id to slide part path for slide relationships.
pub(crate) fn parse_slide_relationships(xml: &str) -> Result<HashMap<String, String>> {
    let mut rels = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let rel_type = attr_value(e, b"Type").unwrap_or_default();
                let target = attr_value(e, b"Target").unwrap_or_default();
                let id = attr_value(e, b"Id").unwrap_or_default();

                if rel_type.ends_with("/slide") {
                    let full_path = match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("ppt/{}", target),
                    };
                    rels.insert(id, full_path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Parse(format!(
                    "Error parsing relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }
    Ok(rels)
}

/// Relationship ids of `sldId` entries, in document order.
fn parse_slide_id_list(xml: &str) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldId" =>
            {
                if let Some(rid) = relationship_id(e) {
                    ids.push(rid);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Parse(format!(
                    "Error parsing presentation.xml: {}",
                    e
                )));
            }
            _ => {}
        }
    }
    Ok(ids)
}

/// Elements that open a shape in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Sp,
    Pic,
    CxnSp,
    GraphicFrame,
    GrpSp,
}

impl Element {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"sp" => Some(Self::Sp),
            b"pic" => Some(Self::Pic),
            b"cxnSp" => Some(Self::CxnSp),
            b"graphicFrame" => Some(Self::GraphicFrame),
            b"grpSp" => Some(Self::GrpSp),
            _ => None,
        }
    }
}

/// A shape under construction while its element is open.
#[derive(Debug)]
struct ShapeBuilder {
    element: Element,
    name: Option<String>,
    offset: Option<(i64, i64)>,
    extent: Option<(i64, i64)>,
    is_textbox: bool,
    is_placeholder: bool,
    paragraphs: Vec<String>,
    table: Option<Vec<Vec<String>>>,
    in_cell: bool,
    children: Vec<Shape>,
}

impl ShapeBuilder {
    fn new(element: Element) -> Self {
        Self {
            element,
            name: None,
            offset: None,
            extent: None,
            is_textbox: false,
            is_placeholder: false,
            paragraphs: Vec::new(),
            table: None,
            in_cell: false,
            children: Vec::new(),
        }
    }

    /// Where text currently being read belongs.
    fn text_target(&mut self) -> Option<&mut String> {
        if self.in_cell {
            self.table
                .as_mut()
                .and_then(|rows| rows.last_mut())
                .and_then(|row| row.last_mut())
        } else {
            self.paragraphs.last_mut()
        }
    }

    fn start_paragraph(&mut self) {
        if self.in_cell {
            if let Some(cell) = self.text_target() {
                if !cell.is_empty() {
                    cell.push('\n');
                }
            }
        } else {
            self.paragraphs.push(String::new());
        }
    }

    fn finish(self) -> Shape {
        let kind = match self.element {
            Element::GrpSp => ShapeKind::Group(self.children),
            Element::CxnSp => ShapeKind::Connector,
            Element::GraphicFrame => match self.table {
                Some(rows) => ShapeKind::Table(TableGrid::new(
                    rows.into_iter()
                        .map(|row| row.into_iter().map(|c| c.trim().to_string()).collect())
                        .collect(),
                )),
                None => ShapeKind::Other,
            },
            Element::Sp | Element::Pic if self.is_placeholder => ShapeKind::Placeholder,
            Element::Pic => ShapeKind::Picture,
            Element::Sp if self.is_textbox => ShapeKind::TextBox,
            Element::Sp => ShapeKind::AutoShape,
        };

        let mut shape = Shape::new(self.name.unwrap_or_default(), kind);
        if let (Some((x, y)), Some((cx, cy))) = (self.offset, self.extent) {
            shape = shape.with_geometry(Geometry { x, y, cx, cy });
        }
        let text = self.paragraphs.join("\n");
        let text = text.trim();
        if !text.is_empty() {
            shape = shape.with_text(text);
        }
        shape
    }
}

/// Build the top-level shapes of a slide from its XML.
///
/// Content in `mc:Fallback` branches is skipped so alternate renditions of
/// the same shape are not counted twice.
fn parse_shape_tree(xml: &str) -> std::result::Result<Vec<Shape>, String> {
    let mut reader = Reader::from_str(xml);
    let mut roots: Vec<Shape> = Vec::new();
    let mut stack: Vec<ShapeBuilder> = Vec::new();
    let mut fallback_depth = 0usize;
    let mut in_text_run = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at position {}: {}", reader.buffer_position(), e))?;

        if fallback_depth > 0 {
            match event {
                Event::Start(_) => fallback_depth += 1,
                Event::End(_) => fallback_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(ref e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"Fallback" {
                    fallback_depth = 1;
                    continue;
                }
                if let Some(element) = Element::from_local_name(local) {
                    stack.push(ShapeBuilder::new(element));
                    continue;
                }
                if let Some(top) = stack.last_mut() {
                    match local {
                        b"tbl" => top.table = Some(Vec::new()),
                        b"tr" => {
                            if let Some(rows) = top.table.as_mut() {
                                rows.push(Vec::new());
                            }
                        }
                        b"tc" => {
                            if let Some(row) = top.table.as_mut().and_then(|rows| rows.last_mut()) {
                                row.push(String::new());
                                top.in_cell = true;
                            }
                        }
                        b"p" => top.start_paragraph(),
                        b"t" => in_text_run = true,
                        _ => apply_properties(top, local, e),
                    }
                }
            }
            Event::Empty(ref e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if let Some(top) = stack.last_mut() {
                    match local {
                        b"br" => {
                            if let Some(target) = top.text_target() {
                                target.push('\n');
                            }
                        }
                        b"tc" => {
                            if let Some(row) = top.table.as_mut().and_then(|rows| rows.last_mut()) {
                                row.push(String::new());
                            }
                        }
                        _ => apply_properties(top, local, e),
                    }
                }
            }
            Event::Text(ref e) if in_text_run => {
                let text = e
                    .unescape()
                    .map_err(|e| format!("Invalid text content: {}", e))?;
                if let Some(target) = stack.last_mut().and_then(|top| top.text_target()) {
                    target.push_str(&text);
                }
            }
            Event::End(ref e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match local {
                    b"t" => in_text_run = false,
                    b"tc" => {
                        if let Some(top) = stack.last_mut() {
                            top.in_cell = false;
                        }
                    }
                    _ => {
                        if Element::from_local_name(local).is_some() {
                            if let Some(builder) = stack.pop() {
                                let shape = builder.finish();
                                match stack.last_mut() {
                                    Some(parent) if parent.element == Element::GrpSp => {
                                        parent.children.push(shape)
                                    }
                                    Some(_) => {}
                                    None => roots.push(shape),
                                }
                            }
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(format!("{} shape elements were never closed", stack.len()));
    }
    Ok(roots)
}

/// Record name, placeholder, text box and geometry attributes on the open shape.
fn apply_properties(top: &mut ShapeBuilder, local: &[u8], e: &BytesStart<'_>) {
    match local {
        b"cNvPr" if top.name.is_none() => top.name = attr_value(e, b"name"),
        b"cNvSpPr" => {
            if matches!(attr_value(e, b"txBox").as_deref(), Some("1") | Some("true")) {
                top.is_textbox = true;
            }
        }
        b"ph" => top.is_placeholder = true,
        b"off" if top.offset.is_none() => {
            if let (Some(x), Some(y)) = (int_attr(e, b"x"), int_attr(e, b"y")) {
                top.offset = Some((x, y));
            }
        }
        b"ext" if top.extent.is_none() => {
            if let (Some(cx), Some(cy)) = (int_attr(e, b"cx"), int_attr(e, b"cy")) {
                top.extent = Some((cx, cy));
            }
        }
        _ => {}
    }
}

/// The namespaced `r:id` of an element, as opposed to its plain `id`.
pub(crate) fn relationship_id(e: &BytesStart<'_>) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        let key = attr.key.as_ref();
        (key.contains(&b':') && local_name(key) == b"id")
            .then(|| String::from_utf8_lossy(&attr.value).to_string())
    })
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

fn int_attr(e: &BytesStart<'_>, key: &[u8]) -> Option<i64> {
    attr_value(e, key).and_then(|v| v.parse().ok())
}

/// Read a file from the ZIP archive.
fn read_file_from_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> std::result::Result<String, String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| format!("File not found in archive '{}': {}", path, e))?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;

    Ok(content)
}

/// Extract the local name from a potentially namespaced XML element name.
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

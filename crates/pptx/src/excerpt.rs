//! Single-slide copies of a deck.
//!
//! Every part of the package is copied unchanged except presentation.xml,
//! whose slide list is cut down to the one requested slide, and that slide's
//! own part, which loses any `show="0"` so a hidden slide still exports.
//! Office suites then render only that slide.

use crate::parser::{
    local_name, parse_slide_relationships, relationship_id, PRESENTATION_PATH,
    PRESENTATION_RELS_PATH,
};
use deck_core::RenderError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Write a copy of `deck` to `output` that presents only `slide` (1-based).
pub fn write_single_slide_deck(deck: &Path, slide: usize, output: &Path) -> Result<(), RenderError> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(deck)?))
        .map_err(|e| RenderError::Failed(format!("cannot open {}: {}", deck.display(), e)))?;

    let kept = keep_only_slide(&read_part(&mut archive, PRESENTATION_PATH)?, slide)?;

    let mut rewritten = vec![(PRESENTATION_PATH.to_string(), kept.presentation)];
    if let Some(part) = slide_part(&mut archive, kept.rel_id.as_deref())? {
        let xml = read_part(&mut archive, &part)?;
        rewritten.push((part, unhide_slide(&xml)?));
    }

    let mut writer = ZipWriter::new(BufWriter::new(File::create(output)?));
    for i in 0..archive.len() {
        let part = archive
            .by_index_raw(i)
            .map_err(|e| RenderError::Failed(format!("corrupt entry {}: {}", i, e)))?;
        if rewritten.iter().any(|(name, _)| name == part.name()) {
            continue;
        }
        writer
            .raw_copy_file(part)
            .map_err(|e| RenderError::Failed(format!("copy failed: {}", e)))?;
    }

    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, content) in &rewritten {
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| RenderError::Failed(e.to_string()))?;
        writer.write_all(content)?;
    }
    writer
        .finish()
        .map_err(|e| RenderError::Failed(e.to_string()))?
        .flush()?;
    Ok(())
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String, RenderError> {
    let mut part = archive
        .by_name(name)
        .map_err(|e| RenderError::Failed(format!("{}: {}", name, e)))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)?;
    Ok(xml)
}

/// Part name of the slide behind `rel_id`, if the package resolves it.
fn slide_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    rel_id: Option<&str>,
) -> Result<Option<String>, RenderError> {
    let Some(rel_id) = rel_id else {
        return Ok(None);
    };
    let rels = read_part(archive, PRESENTATION_RELS_PATH)?;
    let rels = parse_slide_relationships(&rels).map_err(|e| RenderError::Failed(e.to_string()))?;
    Ok(rels
        .get(rel_id)
        .filter(|part| archive.file_names().any(|name| name == part.as_str()))
        .cloned())
}

struct KeptSlide {
    presentation: Vec<u8>,
    rel_id: Option<String>,
}

/// presentation.xml with every `sldId` but the `slide`-th removed.
fn keep_only_slide(xml: &str, slide: usize) -> Result<KeptSlide, RenderError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut seen = 0usize;
    let mut kept = None;
    let mut skip_depth = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| RenderError::Failed(format!("presentation.xml: {}", e)))?;

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                _ => {}
            }
            continue;
        }

        match &event {
            Event::Eof => break,
            Event::Empty(e) | Event::Start(e) if local_name(e.name().as_ref()) == b"sldId" => {
                seen += 1;
                if seen != slide {
                    if matches!(event, Event::Start(_)) {
                        skip_depth = 1;
                    }
                    continue;
                }
                kept = Some(relationship_id(e));
            }
            _ => {}
        }
        writer
            .write_event(event)
            .map_err(|e| RenderError::Failed(format!("presentation.xml: {}", e)))?;
    }

    match kept {
        Some(rel_id) => Ok(KeptSlide {
            presentation: writer.into_inner().into_inner(),
            rel_id,
        }),
        None => Err(RenderError::Failed(format!(
            "slide {} not in the slide list ({} slides)",
            slide, seen
        ))),
    }
}

/// Slide XML with the `show` attribute dropped from its root element.
fn unhide_slide(xml: &str) -> Result<Vec<u8>, RenderError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut root_seen = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| RenderError::Failed(format!("slide XML: {}", e)))?;
        let written = match event {
            Event::Eof => break,
            Event::Start(e) if !root_seen => {
                root_seen = true;
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let mut root = BytesStart::new(name);
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() != b"show" {
                        root.push_attribute(attr);
                    }
                }
                writer.write_event(Event::Start(root))
            }
            other => writer.write_event(other),
        };
        written.map_err(|e| RenderError::Failed(format!("slide XML: {}", e)))?;
    }
    Ok(writer.into_inner().into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tests::{build_deck, slide_xml, text_box};
    use crate::PptxParser;
    use deck_core::SlideSource;

    #[test]
    fn test_keep_only_slide() {
        let xml = r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="256" r:id="rId2"/><p:sldId id="257" r:id="rId3"/><p:sldId id="258" r:id="rId4"/></p:sldIdLst></p:presentation>"#;
        let kept = keep_only_slide(xml, 2).unwrap();
        let out = String::from_utf8(kept.presentation).unwrap();
        assert!(out.contains(r#"r:id="rId3""#));
        assert!(!out.contains("rId2"));
        assert!(!out.contains("rId4"));
        assert_eq!(kept.rel_id.as_deref(), Some("rId3"));
    }

    #[test]
    fn test_missing_slide_is_an_error() {
        let xml = r#"<p:presentation xmlns:p="p"><p:sldIdLst/></p:presentation>"#;
        assert!(keep_only_slide(xml, 1).is_err());
    }

    #[test]
    fn test_unhide_slide_drops_only_show() {
        let xml = r#"<p:sld xmlns:p="p" show="0" showMasterSp="0"><p:cSld/></p:sld>"#;
        let out = String::from_utf8(unhide_slide(xml).unwrap()).unwrap();
        assert_eq!(out, r#"<p:sld xmlns:p="p" showMasterSp="0"><p:cSld/></p:sld>"#);
    }

    #[test]
    fn test_hidden_slide_is_shown_in_excerpt() {
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("deck.pptx");
        let hidden = slide_xml(&text_box(2, "TextBox 1", "Backup")).replacen("<p:sld ", "<p:sld show=\"0\" ", 1);
        assert!(hidden.contains(r#"show="0""#));
        std::fs::write(
            &deck,
            build_deck(
                &[1, 2, 3],
                &[
                    (1, slide_xml(&text_box(2, "TextBox 1", "One"))),
                    (2, hidden),
                    (3, slide_xml(&text_box(2, "TextBox 1", "Three"))),
                ],
            ),
        )
        .unwrap();

        let single = dir.path().join("single.pptx");
        write_single_slide_deck(&deck, 2, &single).unwrap();

        let mut archive = ZipArchive::new(File::open(&single).unwrap()).unwrap();
        let slide = read_part(&mut archive, "ppt/slides/slide2.xml").unwrap();
        assert!(!slide.contains("show="));
        assert!(slide.contains("Backup"));
        let untouched = read_part(&mut archive, "ppt/slides/slide3.xml").unwrap();
        assert!(untouched.contains("Three"));

        let slides = PptxParser::new().open(&single).unwrap();
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].text(), "Backup");
    }

    #[test]
    fn test_single_slide_deck_parses_to_one_slide() {
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("deck.pptx");
        std::fs::write(
            &deck,
            build_deck(
                &[1, 2, 3],
                &[
                    (1, slide_xml(&text_box(2, "TextBox 1", "One"))),
                    (2, slide_xml(&text_box(2, "TextBox 1", "Two"))),
                    (3, slide_xml(&text_box(2, "TextBox 1", "Three"))),
                ],
            ),
        )
        .unwrap();

        let single = dir.path().join("single.pptx");
        write_single_slide_deck(&deck, 2, &single).unwrap();

        let slides = PptxParser::new().open(&single).unwrap();
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].text(), "Two");
    }
}

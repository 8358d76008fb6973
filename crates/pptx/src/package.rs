//! Open XML package access: parts, relationships and slide order.

use deck_core::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::ZipArchive;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";

/// Default 4:3 canvas, used when `p:sldSz` is missing.
const DEFAULT_SLIDE_SIZE: (u64, u64) = (9_144_000, 6_858_000);

/// A relationship entry from a .rels part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

/// Slide parts in presentation order plus the canvas size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationLayout {
    pub slide_parts: Vec<String>,
    pub slide_width: u64,
    pub slide_height: u64,
}

/// Read a part from the archive as UTF-8 text.
pub fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

    Ok(content)
}

/// Resolve slide order and canvas size from `ppt/presentation.xml`.
///
/// Order follows `p:sldIdLst`. When the list is absent, slide
/// relationships are ordered by the number in their id or target.
pub fn presentation_layout<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<PresentationLayout> {
    let presentation = read_part(archive, PRESENTATION_PART)
        .map_err(|e| Error::CorruptedFile(format!("Not a slide deck: {}", e)))?;
    let rels = parse_relationships(&read_part(archive, PRESENTATION_RELS)?)?;

    let (slide_ids, size) = parse_presentation(&presentation)?;
    let by_id: HashMap<&str, &Relationship> = rels.iter().map(|r| (r.id.as_str(), r)).collect();

    let slide_parts = if slide_ids.is_empty() {
        let mut slides: Vec<(String, Option<usize>)> = rels
            .iter()
            .filter(|r| is_slide_relationship(&r.rel_type))
            .map(|r| {
                let order = extract_slide_number(&r.id).or_else(|| extract_slide_number(&r.target));
                (resolve_target(PRESENTATION_PART, &r.target), order)
            })
            .collect();

        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });
        slides.into_iter().map(|(path, _)| path).collect()
    } else {
        let mut parts = Vec::with_capacity(slide_ids.len());
        for rel_id in &slide_ids {
            let rel = by_id.get(rel_id.as_str()).ok_or_else(|| {
                Error::CorruptedFile(format!("Slide relationship '{}' not found", rel_id))
            })?;
            parts.push(resolve_target(PRESENTATION_PART, &rel.target));
        }
        parts
    };

    let (slide_width, slide_height) = size.unwrap_or(DEFAULT_SLIDE_SIZE);
    Ok(PresentationLayout {
        slide_parts,
        slide_width,
        slide_height,
    })
}

/// Name of the layout a slide uses, if it can be resolved.
pub fn layout_name<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    slide_part: &str,
) -> Result<Option<String>> {
    let rels_part = rels_path_for(slide_part);
    let rels = match read_part(archive, &rels_part) {
        Ok(xml) => parse_relationships(&xml)?,
        Err(_) => return Ok(None),
    };

    let Some(layout_rel) = rels.iter().find(|r| r.rel_type.ends_with("/slideLayout")) else {
        return Ok(None);
    };
    let layout_part = resolve_target(slide_part, &layout_rel.target);
    let xml = read_part(archive, &layout_part)?;

    let mut reader = Reader::from_str(&xml);
    reader.trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if local_name(e.name().as_ref()) == b"cSld" =>
            {
                let name = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref() == b"name")
                    .map(|a| String::from_utf8_lossy(&a.value).to_string());
                return Ok(name);
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing layout '{}': {}",
                    layout_part, e
                )))
            }
            _ => {}
        }
    }
}

/// Parse every `Relationship` element of a .rels part.
pub fn parse_relationships(xml: &str) -> Result<Vec<Relationship>> {
    let mut rels = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut rel = Relationship {
                    id: String::new(),
                    rel_type: String::new(),
                    target: String::new(),
                };
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).to_string();
                    match attr.key.as_ref() {
                        b"Id" => rel.id = value,
                        b"Type" => rel.rel_type = value,
                        b"Target" => rel.target = value,
                        _ => {}
                    }
                }
                rels.push(rel);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(rels)
}

/// Slide relationship ids in `p:sldIdLst` order, and `p:sldSz` if present.
fn parse_presentation(xml: &str) -> Result<(Vec<String>, Option<(u64, u64)>)> {
    let mut ids = Vec::new();
    let mut size = None;
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"sldId" => {
                        // `r:id`, not the numeric `id`
                        if let Some(attr) = e
                            .attributes()
                            .flatten()
                            .find(|a| a.key.as_ref().ends_with(b":id"))
                        {
                            ids.push(String::from_utf8_lossy(&attr.value).to_string());
                        }
                    }
                    b"sldSz" => {
                        let mut cx = None;
                        let mut cy = None;
                        for attr in e.attributes().flatten() {
                            let value = String::from_utf8_lossy(&attr.value).parse::<u64>().ok();
                            match attr.key.as_ref() {
                                b"cx" => cx = value,
                                b"cy" => cy = value,
                                _ => {}
                            }
                        }
                        if let (Some(cx), Some(cy)) = (cx, cy) {
                            size = Some((cx, cy));
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing presentation: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok((ids, size))
}

fn is_slide_relationship(rel_type: &str) -> bool {
    rel_type.ends_with("/slide")
}

/// Resolve a relationship target against the part that owns it.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = source_part.split('/').collect();
    segments.pop();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// The .rels part that belongs to `part`.
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Extract the local name from a potentially namespaced XML element name.
pub fn local_name(name: &[u8]) -> &[u8] {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_slide_number() {
        assert_eq!(extract_slide_number("rId1"), Some(1));
        assert_eq!(extract_slide_number("rId12"), Some(12));
        assert_eq!(extract_slide_number("slide123.xml"), Some(123));
        assert_eq!(extract_slide_number("nodigits"), None);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"p:sp"), b"sp");
        assert_eq!(local_name(b"a:t"), b"t");
        assert_eq!(local_name(b"sp"), b"sp");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("ppt/presentation.xml", "slides/slide1.xml"),
            "ppt/slides/slide1.xml"
        );
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "../slideLayouts/slideLayout2.xml"),
            "ppt/slideLayouts/slideLayout2.xml"
        );
        assert_eq!(
            resolve_target("ppt/presentation.xml", "/ppt/slides/slide9.xml"),
            "ppt/slides/slide9.xml"
        );
    }

    #[test]
    fn test_rels_path_for() {
        assert_eq!(
            rels_path_for("ppt/slides/slide4.xml"),
            "ppt/slides/_rels/slide4.xml.rels"
        );
    }

    #[test]
    fn test_parse_presentation_order_and_size() {
        let xml = r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="257" r:id="rId7"/><p:sldId id="256" r:id="rId2"/></p:sldIdLst><p:sldSz cx="12192000" cy="6858000"/></p:presentation>"#;
        let (ids, size) = parse_presentation(xml).unwrap();
        assert_eq!(ids, vec!["rId7", "rId2"]);
        assert_eq!(size, Some((12_192_000, 6_858_000)));
    }

    #[test]
    fn test_parse_relationships() {
        let xml = r#"<Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/></Relationships>"#;
        let rels = parse_relationships(xml).unwrap();
        assert_eq!(rels.len(), 1);
        assert!(rels[0].rel_type.ends_with("/slideLayout"));
        assert!(!is_slide_relationship(&rels[0].rel_type));
    }
}

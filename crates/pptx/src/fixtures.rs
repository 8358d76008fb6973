//! In-memory deck builder for tests.
//!
//! Produces a minimal but well-formed package: content types, package and
//! presentation relationships, one layout, and one part per slide.

use quick_xml::escape::escape;
use std::fmt::Write as _;
use std::io::{self, Cursor, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::ZipWriter;

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// A shape to place on a generated slide.
#[derive(Debug, Clone)]
pub enum FixtureShape {
    /// Text box; one inner list of run texts per paragraph.
    Text { paragraphs: Vec<Vec<String>> },
    Group(Vec<FixtureShape>),
    Picture,
    Table { rows: usize, columns: usize },
}

impl FixtureShape {
    /// Text box with a single run.
    pub fn text(text: &str) -> Self {
        Self::paragraphs(vec![vec![text]])
    }

    /// Text box with explicit paragraphs and runs.
    pub fn paragraphs(paragraphs: Vec<Vec<&str>>) -> Self {
        Self::Text {
            paragraphs: paragraphs
                .into_iter()
                .map(|runs| runs.into_iter().map(str::to_string).collect())
                .collect(),
        }
    }

    pub fn group(children: Vec<FixtureShape>) -> Self {
        Self::Group(children)
    }
}

/// Build a deck with one slide per entry of `slides`.
pub fn build_deck(slides: &[Vec<FixtureShape>]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut add = |name: &str, body: &str| -> zip::result::ZipResult<()> {
        zip.start_file(name, FileOptions::default())?;
        zip.write_all(body.as_bytes())?;
        Ok(())
    };

    let parts = [
        ("[Content_Types].xml", content_types(slides.len())),
        ("_rels/.rels", package_rels()),
        ("ppt/presentation.xml", presentation(slides.len())),
        ("ppt/_rels/presentation.xml.rels", presentation_rels(slides.len())),
        ("ppt/slideLayouts/slideLayout1.xml", layout()),
    ];
    for (name, body) in parts {
        add(name, &body).expect("fixture part");
    }
    for (i, shapes) in slides.iter().enumerate() {
        let number = i + 1;
        add(&format!("ppt/slides/slide{}.xml", number), &slide(shapes)).expect("fixture slide");
        add(&format!("ppt/slides/_rels/slide{}.xml.rels", number), &slide_rels())
            .expect("fixture slide rels");
    }

    zip.finish().expect("fixture zip").into_inner()
}

/// Build a deck and write it to `path`.
pub fn write_deck(path: &Path, slides: &[Vec<FixtureShape>]) -> io::Result<()> {
    std::fs::write(path, build_deck(slides))
}

/// A deck of single-text-box slides.
pub fn text_deck(texts: &[&str]) -> Vec<Vec<FixtureShape>> {
    texts.iter().map(|t| vec![FixtureShape::text(t)]).collect()
}

fn content_types(slide_count: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/>"#,
    );
    for n in 1..=slide_count {
        let _ = write!(
            xml,
            r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#,
            n
        );
    }
    xml.push_str("</Types>");
    xml
}

fn package_rels() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{}"><Relationship Id="rId1" Type="{}/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#,
        PKG_REL_NS, REL_NS
    )
}

fn presentation(slide_count: usize) -> String {
    let mut ids = String::new();
    for n in 1..=slide_count {
        let _ = write!(ids, r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + n, n + 1);
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation {}><p:sldIdLst>{}</p:sldIdLst><p:sldSz cx="9144000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
        NS, ids
    )
}

fn presentation_rels(slide_count: usize) -> String {
    let mut rels = String::new();
    for n in 1..=slide_count {
        let _ = write!(
            rels,
            r#"<Relationship Id="rId{}" Type="{}/slide" Target="slides/slide{}.xml"/>"#,
            n + 1,
            REL_NS,
            n
        );
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{}">{}</Relationships>"#,
        PKG_REL_NS, rels
    )
}

fn layout() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldLayout {}><p:cSld name="Title and Content"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld></p:sldLayout>"#,
        NS
    )
}

fn slide_rels() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{}"><Relationship Id="rId1" Type="{}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/></Relationships>"#,
        PKG_REL_NS, REL_NS
    )
}

fn slide(shapes: &[FixtureShape]) -> String {
    let mut next_id = 2;
    let mut body = String::new();
    for shape in shapes {
        write_shape(&mut body, shape, &mut next_id);
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld {}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        NS, body
    )
}

fn write_shape(out: &mut String, shape: &FixtureShape, next_id: &mut usize) {
    let id = *next_id;
    *next_id += 1;

    match shape {
        FixtureShape::Text { paragraphs } => {
            let _ = write!(
                out,
                r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="TextBox {}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="838200" y="{}"/><a:ext cx="7772400" cy="914400"/></a:xfrm></p:spPr><p:txBody><a:bodyPr wrap="square"/><a:lstStyle/>"#,
                id,
                id - 1,
                365125 * id
            );
            for runs in paragraphs {
                if runs.is_empty() {
                    out.push_str(r#"<a:p><a:endParaRPr lang="en-US"/></a:p>"#);
                    continue;
                }
                out.push_str("<a:p>");
                for text in runs {
                    let _ = write!(
                        out,
                        r#"<a:r><a:rPr lang="en-US" sz="2800" b="1" dirty="0"><a:solidFill><a:srgbClr val="1F4E79"/></a:solidFill></a:rPr><a:t>{}</a:t></a:r>"#,
                        escape(text.as_str())
                    );
                }
                out.push_str("</a:p>");
            }
            out.push_str("</p:txBody></p:sp>");
        }
        FixtureShape::Group(children) => {
            let _ = write!(
                out,
                r#"<p:grpSp><p:nvGrpSpPr><p:cNvPr id="{}" name="Group {}"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>"#,
                id,
                id - 1
            );
            for child in children {
                write_shape(out, child, next_id);
            }
            out.push_str("</p:grpSp>");
        }
        FixtureShape::Picture => {
            let _ = write!(
                out,
                r#"<p:pic><p:nvPicPr><p:cNvPr id="{}" name="Picture {}"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId9"/></p:blipFill><p:spPr/></p:pic>"#,
                id,
                id - 1
            );
        }
        FixtureShape::Table { rows, columns } => {
            let _ = write!(
                out,
                r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{}" name="Table {}"/><p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr><p:xfrm/><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl><a:tblGrid>"#,
                id,
                id - 1
            );
            for _ in 0..*columns {
                out.push_str(r#"<a:gridCol w="3048000"/>"#);
            }
            out.push_str("</a:tblGrid>");
            for r in 0..*rows {
                out.push_str(r#"<a:tr h="370840">"#);
                for c in 0..*columns {
                    let _ = write!(
                        out,
                        r#"<a:tc><a:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:t>Cell {} {}</a:t></a:r></a:p></a:txBody></a:tc>"#,
                        r, c
                    );
                }
                out.push_str("</a:tr>");
            }
            out.push_str("</a:tbl></a:graphicData></a:graphic></p:graphicFrame>");
        }
    }
}

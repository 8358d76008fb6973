//! Document model reader: inventories every addressable text run.

use crate::package::{self, local_name};
use crate::walker::{Node, SlideWalker};
use deck_core::normalize::is_blank;
use deck_core::{
    DeckSnapshot, Error, Result, RunLog, RunRef, RunSource, ShapeRecord, SlideRecord, TableInfo,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

const CHART_URI_SUFFIX: &str = "/chart";

/// Reader for slide decks (Office Open XML).
pub struct DeckReader;

impl DeckReader {
    /// Create a new reader.
    pub fn new() -> Self {
        Self
    }

    /// Read the deck at `path`.
    pub fn read(&self, path: &Path, log: &RunLog) -> Result<DeckSnapshot> {
        let file = File::open(path)?;
        self.parse(BufReader::new(file), log)
    }

    /// Read a deck from any seekable source.
    ///
    /// Problems confined to one slide or shape become warnings on that
    /// slide; only package-level problems fail the read.
    pub fn parse<R: Read + Seek>(&self, reader: R, log: &RunLog) -> Result<DeckSnapshot> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let layout = package::presentation_layout(&mut archive)?;
        let mut snapshot = DeckSnapshot::new(layout.slide_width, layout.slide_height);

        for (idx, slide_part) in layout.slide_parts.iter().enumerate() {
            let number = idx + 1;
            let layout_name = match package::layout_name(&mut archive, slide_part) {
                Ok(Some(name)) => name,
                Ok(None) => "Unknown".to_string(),
                Err(e) => {
                    log.warn("read", format!("Slide {}: layout unreadable: {}", number, e));
                    "Unknown".to_string()
                }
            };

            let mut slide = SlideRecord::new(number, layout_name);
            match package::read_part(&mut archive, slide_part) {
                Ok(xml) => read_slide_xml(&xml, &mut slide),
                Err(e) => slide.warnings.push(format!("Slide part unreadable: {}", e)),
            }

            for warning in &slide.warnings {
                log.warn("read", format!("Slide {}: {}", number, warning));
            }
            snapshot.add_slide(slide);
        }

        log.info(
            "read",
            format!(
                "Read {} slides ({}x{} EMU)",
                snapshot.slide_count, snapshot.slide_width, snapshot.slide_height
            ),
        );
        Ok(snapshot)
    }
}

impl Default for DeckReader {
    fn default() -> Self {
        Self::new()
    }
}

/// A shape being assembled while its element is open.
#[derive(Debug)]
struct ShapeBuilder {
    path: Vec<usize>,
    record: ShapeRecord,
    failure: Option<String>,
}

/// Walk one slide's XML and add its shapes to `slide`.
///
/// A malformed text container only drops that shape's text. A fatal XML
/// error stops the walk; shapes completed before it are kept.
fn read_slide_xml(xml: &str, slide: &mut SlideRecord) {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut walker = SlideWalker::new();
    let mut builders: Vec<ShapeBuilder> = Vec::new();
    let mut run_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                open_element(e, &mut walker, &mut builders, &mut run_text);
            }
            Ok(Event::Empty(ref e)) => {
                open_element(e, &mut walker, &mut builders, &mut run_text);
                close_element(&mut walker, &mut builders, &mut run_text, slide);
            }
            Ok(Event::End(_)) => {
                close_element(&mut walker, &mut builders, &mut run_text, slide);
            }
            Ok(Event::Text(ref e)) if walker.in_run_text() => match e.unescape() {
                Ok(text) => run_text.push_str(&text),
                Err(err) => {
                    if let Some(builder) = builders.last_mut() {
                        builder
                            .failure
                            .get_or_insert_with(|| format!("bad run text: {}", err));
                    }
                }
            },
            Ok(Event::CData(ref e)) if walker.in_run_text() => {
                run_text.push_str(&String::from_utf8_lossy(e));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                slide.warnings.push(format!(
                    "XML error at byte {}: {}; remaining shapes skipped",
                    reader.buffer_position(),
                    e
                ));
                break;
            }
            _ => {}
        }
    }
}

fn open_element(
    e: &BytesStart,
    walker: &mut SlideWalker,
    builders: &mut Vec<ShapeBuilder>,
    run_text: &mut String,
) {
    let name = e.name();
    let local = local_name(name.as_ref());
    let node = walker.enter(local);

    match node {
        Node::Shape { path, kind } => {
            let index = path.first().copied().unwrap_or_default();
            builders.push(ShapeBuilder {
                path,
                record: ShapeRecord::new(index, kind),
                failure: None,
            });
            return;
        }
        Node::TextBody => {
            if let Some(builder) = builders.last_mut() {
                builder.record.has_text = true;
            }
        }
        Node::RunText(_) => run_text.clear(),
        _ => {}
    }

    let Some(builder) = builders.last_mut() else {
        return;
    };
    let record = &mut builder.record;

    match local {
        b"cNvPr" if record.name.is_empty() => {
            if let Some(attr) = e.attributes().flatten().find(|a| a.key.as_ref() == b"name") {
                record.name = String::from_utf8_lossy(&attr.value).to_string();
            }
        }
        b"graphicData" => {
            let is_chart = e.attributes().flatten().any(|a| {
                a.key.as_ref() == b"uri" && a.value.as_ref().ends_with(CHART_URI_SUFFIX.as_bytes())
            });
            if is_chart {
                record.has_chart = true;
            }
        }
        b"tbl" => {
            record.has_table = true;
            record.table.get_or_insert_with(TableInfo::default);
        }
        b"tr" => {
            if let Some(table) = record.table.as_mut() {
                table.rows += 1;
            }
        }
        b"gridCol" => {
            if let Some(table) = record.table.as_mut() {
                table.columns += 1;
            }
        }
        _ => {}
    }
}

fn close_element(
    walker: &mut SlideWalker,
    builders: &mut Vec<ShapeBuilder>,
    run_text: &mut String,
    slide: &mut SlideRecord,
) {
    match walker.leave() {
        Node::RunText(address) => {
            if is_blank(run_text) {
                return;
            }
            if let Some(builder) = builders.last_mut() {
                if builder.path == address.shape_path {
                    builder.record.text_map.push(RunRef {
                        paragraph_index: address.paragraph_index,
                        run_index: address.run_index,
                        text: std::mem::take(run_text),
                        source: RunSource::Own,
                    });
                }
            }
        }
        Node::Shape { .. } => {
            if let Some(builder) = builders.pop() {
                finish_shape(builder, builders, slide);
            }
        }
        _ => {}
    }
}

/// Close a shape: flatten it into its parent group, or add it to the slide.
fn finish_shape(builder: ShapeBuilder, parents: &mut [ShapeBuilder], slide: &mut SlideRecord) {
    let ShapeBuilder {
        path,
        mut record,
        failure,
    } = builder;

    if let Some(failure) = failure {
        slide.warnings.push(format!(
            "Error processing text in shape {} ('{}'): {}",
            path_label(&path),
            record.name,
            failure
        ));
        record.text_map.clear();
    }

    if record.is_group() && !record.text_map.is_empty() {
        record.group_text_warning = Some(format!(
            "Group shape '{}' (shape {}) contains {} text run(s) that will not be rewritten",
            record.name,
            path_label(&path),
            record.text_map.len()
        ));
    }

    match parents.last_mut() {
        Some(parent) => {
            let child_index = path.last().copied().unwrap_or_default();
            parent
                .record
                .text_map
                .extend(record.text_map.into_iter().map(|run| {
                    let mut nested = vec![child_index];
                    if let RunSource::Grouped { path } = run.source {
                        nested.extend(path);
                    }
                    RunRef {
                        source: RunSource::Grouped { path: nested },
                        ..run
                    }
                }));
        }
        None => slide.add_shape(record),
    }
}

fn path_label(path: &[usize]) -> String {
    path.iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

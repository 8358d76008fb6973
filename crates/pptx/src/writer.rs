//! Document writer: re-injects regenerated text into a fresh copy of the
//! original deck.
//!
//! Only the contents of targeted `a:t` elements change. Every other event
//! of the slide XML is written back as read, and parts without replacements
//! are copied without recompression.

use crate::package::{self, local_name};
use crate::walker::{Node, RunAddress, SlideWalker};
use deck_core::{
    mark_failed, sanitize_generated_text, ContentMapping, Error, Result, RunLog, SlideContent,
    REGENERATION_FAILED_MARKER,
};
use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Top-level shape, paragraph and run index of one target run.
pub type RunKey = (usize, usize, usize);

/// Outcome of a completed write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Runs whose text was replaced.
    pub replaced: usize,

    /// Replacements that could not be applied; those runs kept their text.
    pub errors: Vec<String>,
}

struct SlidePlan {
    number: usize,
    targets: HashMap<RunKey, String>,
}

/// Writes content mappings back into decks.
pub struct DeckWriter;

impl DeckWriter {
    /// Create a new writer.
    pub fn new() -> Self {
        Self
    }

    /// Copy `original` to `output`, replacing mapped runs.
    ///
    /// The output only appears once the whole package has been written; on
    /// error nothing is left at `output`.
    pub fn write(
        &self,
        original: &Path,
        output: &Path,
        mapping: &ContentMapping,
        log: &RunLog,
    ) -> Result<WriteReport> {
        let file = File::open(original)?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let layout = package::presentation_layout(&mut archive)?;
        let mut report = WriteReport::default();
        let mut plans: HashMap<String, SlidePlan> = HashMap::new();

        for slide in &mapping.slides {
            let Some(part) = slide
                .number
                .checked_sub(1)
                .and_then(|i| layout.slide_parts.get(i))
            else {
                report.errors.push(format!(
                    "Slide {}: not present in the original deck; {} replacement(s) skipped",
                    slide.number,
                    slide.text_mappings.len()
                ));
                continue;
            };
            let targets = replacement_targets(slide, &mut report.errors);
            if !targets.is_empty() {
                plans.insert(
                    part.clone(),
                    SlidePlan {
                        number: slide.number,
                        targets,
                    },
                );
            }
        }

        let directory = match output.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(directory)?;

        {
            let mut zip = ZipWriter::new(staged.as_file_mut());
            for i in 0..archive.len() {
                let (name, compression) = {
                    let entry = archive.by_index(i).map_err(zip_error)?;
                    (entry.name().to_string(), entry.compression())
                };

                let Some(plan) = plans.get(&name) else {
                    zip.raw_copy_file(archive.by_index(i).map_err(zip_error)?)
                        .map_err(zip_error)?;
                    continue;
                };

                let mut xml = String::new();
                archive
                    .by_index(i)
                    .map_err(zip_error)?
                    .read_to_string(&mut xml)?;

                let rewritten = match rewrite_slide_xml(&xml, &plan.targets) {
                    Ok((rewritten, applied)) => {
                        report.replaced += applied.len();
                        report.errors.extend(unapplied(plan, &applied));
                        rewritten
                    }
                    Err(e) => {
                        report.errors.push(format!(
                            "Slide {}: {}; slide left unchanged",
                            plan.number, e
                        ));
                        zip.raw_copy_file(archive.by_index(i).map_err(zip_error)?)
                            .map_err(zip_error)?;
                        continue;
                    }
                };

                let method = match compression {
                    CompressionMethod::Stored => CompressionMethod::Stored,
                    _ => CompressionMethod::Deflated,
                };
                zip.start_file(name, FileOptions::default().compression_method(method))
                    .map_err(zip_error)?;
                zip.write_all(rewritten.as_bytes())?;
            }
            zip.finish().map_err(zip_error)?;
        }

        staged.persist(output).map_err(|e| Error::IoError(e.error))?;

        for error in &report.errors {
            log.warn("write", error.clone());
        }
        log.info(
            "write",
            format!(
                "Wrote {} ({} runs replaced, {} errors)",
                output.display(),
                report.replaced,
                report.errors.len()
            ),
        );
        Ok(report)
    }
}

impl Default for DeckWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn zip_error(e: zip::result::ZipError) -> Error {
    Error::ZipError(e.to_string())
}

/// Target runs of one slide with the text to write into each.
///
/// Slides that were never processed get failure-marked originals.
fn replacement_targets(slide: &SlideContent, errors: &mut Vec<String>) -> HashMap<RunKey, String> {
    let pairs: Vec<(RunKey, String)> = match &slide.rewrite {
        Some(rewrite) => rewrite
            .replacements
            .iter()
            .map(|r| {
                let m = &r.mapping;
                ((m.shape_index, m.paragraph_index, m.run_index), r.new_text.clone())
            })
            .collect(),
        None => slide
            .text_mappings
            .iter()
            .map(|m| {
                (
                    (m.shape_index, m.paragraph_index, m.run_index),
                    mark_failed(REGENERATION_FAILED_MARKER, &m.text),
                )
            })
            .collect(),
    };

    let mut targets = HashMap::with_capacity(pairs.len());
    for (key, text) in pairs {
        if targets.insert(key, sanitize_generated_text(&text)).is_some() {
            errors.push(format!(
                "Slide {}: duplicate replacement for shape {}, paragraph {}, run {}; last one wins",
                slide.number, key.0, key.1, key.2
            ));
        }
    }
    targets
}

/// Errors for targets that matched no run, in shape/paragraph/run order.
fn unapplied(plan: &SlidePlan, applied: &HashSet<RunKey>) -> Vec<String> {
    let mut missing: Vec<&RunKey> = plan
        .targets
        .keys()
        .filter(|key| !applied.contains(*key))
        .collect();
    missing.sort();
    missing
        .into_iter()
        .map(|(shape, paragraph, run)| {
            format!(
                "Slide {}: no run at shape {}, paragraph {}, run {}; original text kept",
                plan.number, shape, paragraph, run
            )
        })
        .collect()
}

fn target_key(address: &RunAddress) -> Option<RunKey> {
    address
        .top_level_shape()
        .map(|shape| (shape, address.paragraph_index, address.run_index))
}

/// Stream `xml` through, swapping the content of targeted run texts.
///
/// Returns the new XML and the keys that were applied.
fn rewrite_slide_xml(
    xml: &str,
    targets: &HashMap<RunKey, String>,
) -> Result<(String, HashSet<RunKey>)> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut walker = SlideWalker::new();
    let mut applied = HashSet::new();
    let mut replacing = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::XmlError(format!(
                "Error at position {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match &event {
            Event::Start(e) => {
                let node = walker.enter(local_name(e.name().as_ref()));
                if let Node::RunText(address) = node {
                    if let Some((key, text)) = target_key(&address)
                        .and_then(|key| targets.get(&key).map(|text| (key, text)))
                    {
                        write_event(&mut writer, &event)?;
                        write_event(&mut writer, &Event::Text(BytesText::new(text)))?;
                        applied.insert(key);
                        replacing = true;
                        continue;
                    }
                }
            }
            Event::End(_) => {
                let node = walker.leave();
                if replacing {
                    if matches!(node, Node::RunText(_)) {
                        replacing = false;
                    } else {
                        continue;
                    }
                }
            }
            Event::Empty(e) => {
                walker.enter(local_name(e.name().as_ref()));
                walker.leave();
            }
            Event::Eof => break,
            _ => {}
        }

        if replacing {
            continue;
        }
        write_event(&mut writer, &event)?;
    }

    let out = String::from_utf8(writer.into_inner())
        .map_err(|e| Error::XmlError(format!("Rewritten slide is not UTF-8: {}", e)))?;
    Ok((out, applied))
}

fn write_event<W: Write>(writer: &mut Writer<W>, event: &Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::XmlError(format!("Failed to write slide XML: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, FixtureShape};
    use crate::reader::DeckReader;
    use deck_core::{build_content_mapping, SlideRewrite};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn deck_on_disk(dir: &TempDir, slides: &[Vec<FixtureShape>]) -> std::path::PathBuf {
        let path = dir.path().join("input.pptx");
        fixtures::write_deck(&path, slides).unwrap();
        path
    }

    fn mapping_for(path: &Path) -> ContentMapping {
        let log = RunLog::new();
        let snapshot = DeckReader::new().read(path, &log).unwrap();
        build_content_mapping(&snapshot, &log)
    }

    fn uppercase_all(mapping: &mut ContentMapping) {
        for slide in &mut mapping.slides {
            let regenerated = slide
                .text_mappings
                .iter()
                .map(|m| m.text.to_uppercase())
                .collect();
            slide.rewrite = Some(SlideRewrite::from_regenerated(slide, regenerated));
        }
    }

    fn slide_xml(path: &Path, part: &str) -> String {
        let bytes = std::fs::read(path).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        package::read_part(&mut archive, part).unwrap()
    }

    #[test]
    fn test_uppercase_replacement_round_trip() {
        let dir = TempDir::new().unwrap();
        let input = deck_on_disk(
            &dir,
            &[
                vec![FixtureShape::paragraphs(vec![vec!["Hello ", "world"], vec!["Second line"]])],
                vec![FixtureShape::text("Closing & thanks")],
            ],
        );
        let output = dir.path().join("output.pptx");

        let mut mapping = mapping_for(&input);
        uppercase_all(&mut mapping);
        let report = DeckWriter::new()
            .write(&input, &output, &mapping, &RunLog::new())
            .unwrap();

        assert_eq!(report.replaced, 4);
        assert!(report.errors.is_empty());

        let written = mapping_for(&output);
        assert_eq!(written.slides[0].texts, vec!["HELLO WORLD\nSECOND LINE"]);
        assert_eq!(written.slides[1].texts, vec!["CLOSING & THANKS"]);
        assert!(slide_xml(&output, "ppt/slides/slide2.xml").contains("CLOSING &amp; THANKS"));
    }

    #[test]
    fn test_unchanged_mapping_keeps_text_and_formatting() {
        let dir = TempDir::new().unwrap();
        let input = deck_on_disk(&dir, &fixtures::text_deck(&["Alpha", "Beta"]));
        let output = dir.path().join("output.pptx");

        let mut mapping = mapping_for(&input);
        for slide in &mut mapping.slides {
            let same = slide.source_texts();
            slide.rewrite = Some(SlideRewrite::from_regenerated(slide, same));
        }
        DeckWriter::new()
            .write(&input, &output, &mapping, &RunLog::new())
            .unwrap();

        let before = slide_xml(&input, "ppt/slides/slide1.xml");
        let after = slide_xml(&output, "ppt/slides/slide1.xml");
        assert!(after.contains(r#"<a:rPr lang="en-US" sz="2800" b="1" dirty="0">"#));
        assert!(after.contains(r#"<a:srgbClr val="1F4E79"/>"#));
        assert_eq!(before, after);
    }

    #[test]
    fn test_missing_run_is_reported_and_rest_applied() {
        let dir = TempDir::new().unwrap();
        let input = deck_on_disk(&dir, &fixtures::text_deck(&["Keep going"]));
        let output = dir.path().join("output.pptx");

        let mut mapping = mapping_for(&input);
        uppercase_all(&mut mapping);
        let rewrite = mapping.slides[0].rewrite.as_mut().unwrap();
        let mut stray = rewrite.replacements[0].clone();
        stray.mapping.shape_index = 7;
        stray.new_text = "Nowhere".to_string();
        rewrite.replacements.push(stray);

        let report = DeckWriter::new()
            .write(&input, &output, &mapping, &RunLog::new())
            .unwrap();

        assert_eq!(report.replaced, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("shape 7"));
        assert_eq!(mapping_for(&output).slides[0].texts, vec!["KEEP GOING"]);
    }

    #[test]
    fn test_unprocessed_slide_gets_failure_marker() {
        let dir = TempDir::new().unwrap();
        let input = deck_on_disk(&dir, &fixtures::text_deck(&["Untouched"]));
        let output = dir.path().join("output.pptx");

        let mapping = mapping_for(&input);
        DeckWriter::new()
            .write(&input, &output, &mapping, &RunLog::new())
            .unwrap();

        assert_eq!(
            mapping_for(&output).slides[0].texts,
            vec![format!("{}Untouched", REGENERATION_FAILED_MARKER)]
        );
    }

    #[test]
    fn test_group_text_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let input = deck_on_disk(
            &dir,
            &[vec![
                FixtureShape::group(vec![FixtureShape::text("Inside group")]),
                FixtureShape::text("Outside"),
            ]],
        );
        let output = dir.path().join("output.pptx");

        let mut mapping = mapping_for(&input);
        uppercase_all(&mut mapping);
        let report = DeckWriter::new()
            .write(&input, &output, &mapping, &RunLog::new())
            .unwrap();

        assert_eq!(report.replaced, 1);
        assert_eq!(
            mapping_for(&output).slides[0].texts,
            vec!["Inside group", "OUTSIDE"]
        );
    }

    #[test]
    fn test_slide_outside_deck_is_an_error() {
        let dir = TempDir::new().unwrap();
        let input = deck_on_disk(&dir, &fixtures::text_deck(&["Only"]));
        let output = dir.path().join("output.pptx");

        let mut mapping = mapping_for(&input);
        uppercase_all(&mut mapping);
        let mut ghost = mapping.slides[0].clone();
        ghost.number = 9;
        mapping.slides.push(ghost);

        let report = DeckWriter::new()
            .write(&input, &output, &mapping, &RunLog::new())
            .unwrap();
        assert_eq!(report.replaced, 1);
        assert!(report.errors[0].starts_with("Slide 9"));
    }

    #[test]
    fn test_other_parts_copied_verbatim() {
        let dir = TempDir::new().unwrap();
        let input = deck_on_disk(&dir, &fixtures::text_deck(&["One", "Two"]));
        let output = dir.path().join("output.pptx");

        let mut mapping = mapping_for(&input);
        uppercase_all(&mut mapping);
        DeckWriter::new()
            .write(&input, &output, &mapping, &RunLog::new())
            .unwrap();

        for part in ["ppt/presentation.xml", "ppt/slideLayouts/slideLayout1.xml"] {
            assert_eq!(slide_xml(&input, part), slide_xml(&output, part));
        }
    }
}

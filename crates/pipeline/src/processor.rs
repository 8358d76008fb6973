//! End-to-end entry point: read, map, regenerate, write.

use crate::orchestrator::SectionOrchestrator;
use crate::progress::{Progress, ProgressCallback};
use deck_core::sections::section_count;
use deck_core::{
    build_content_mapping, Error, ProcessingResult, ProcessorConfig, Result, RunLog,
};
use deck_pptx::{DeckReader, DeckWriter};
use deck_rewrite::SectionRewriter;
use std::path::Path;
use std::time::Instant;

const STAGE: &str = "process";

/// Regenerates the text of slide decks.
pub struct DeckProcessor<R> {
    rewriter: R,
    config: ProcessorConfig,
}

impl<R: SectionRewriter> DeckProcessor<R> {
    pub fn new(rewriter: R, config: ProcessorConfig) -> Self {
        Self { rewriter, config }
    }

    pub fn rewriter(&self) -> &R {
        &self.rewriter
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Regenerate `input` into `output`.
    ///
    /// `max_slides_per_section` overrides the configured section size.
    /// Configuration problems (including a deck over the slide limit) and
    /// unreadable input are errors, raised before any rewrite request. A
    /// failed write is not: it comes back as `success == false` with a
    /// warning, and no output file.
    pub async fn process(
        &self,
        input: &Path,
        output: &Path,
        max_slides_per_section: Option<usize>,
        user_info: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<ProcessingResult> {
        let started = Instant::now();
        let log = RunLog::new();

        let mut config = self.config.clone();
        if let Some(max) = max_slides_per_section {
            config = config.with_max_slides_per_section(max);
        }
        config.validate()?;

        log.info(STAGE, format!("Processing {}", input.display()));
        let snapshot = DeckReader::new().read(input, &log)?;
        let mut mapping = build_content_mapping(&snapshot, &log);

        let total = mapping.slide_count;
        if total > config.max_total_slides {
            return Err(Error::TooManySlides {
                max: config.max_total_slides,
                actual: total,
            });
        }

        let mut result = ProcessingResult {
            total_slides: total,
            section_count: section_count(total, config.max_slides_per_section),
            warnings: mapping.warnings.clone(),
            ..ProcessingResult::default()
        };

        let progress = Progress::new(progress, total);
        SectionOrchestrator::new(&self.rewriter, &config, user_info, &progress)
            .run(&mut mapping, &mut result, &log)
            .await?;

        let modification_started = Instant::now();
        match DeckWriter::new().write(input, output, &mapping, &log) {
            Ok(report) => {
                result.replaced_runs = report.replaced;
                result.warnings.extend(report.errors);
                result.success = true;
            }
            Err(e) => {
                log.warn(STAGE, format!("Failed to write {}: {}", output.display(), e));
                result
                    .warnings
                    .push(format!("Failed to write output: {}", e));
                result.success = false;
            }
        }
        result.modification_secs = modification_started.elapsed().as_secs_f64();
        result.total_duration_secs = started.elapsed().as_secs_f64();

        log.info(
            STAGE,
            format!(
                "Finished in {:.2}s: {} slides, {} sections, success={}",
                result.total_duration_secs, result.total_slides, result.section_count, result.success
            ),
        );
        result.debug_log = log.into_entries();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck_core::{ContentMapping, REGENERATION_FAILED_MARKER};
    use deck_pptx::fixtures::{self, FixtureShape};
    use deck_rewrite::testing::{echo_reply, StubTransport};
    use deck_rewrite::{ChatRequest, RewriteClient, RewriteConfig, TransportError};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    type Reply = fn(&ChatRequest, usize) -> std::result::Result<String, TransportError>;

    fn processor(reply: Reply) -> DeckProcessor<RewriteClient<StubTransport<Reply>>> {
        let config = RewriteConfig::default().with_backoff_base(Duration::from_millis(10));
        DeckProcessor::new(
            RewriteClient::new(StubTransport::new(reply), config),
            ProcessorConfig::new().with_section_retry(3, Duration::from_millis(10)),
        )
    }

    fn uppercase(request: &ChatRequest, _: usize) -> std::result::Result<String, TransportError> {
        Ok(echo_reply(request.user_prompt(), str::to_uppercase))
    }

    fn server_error(_: &ChatRequest, _: usize) -> std::result::Result<String, TransportError> {
        Err(TransportError::Status {
            code: 500,
            body: "Internal Server Error".to_string(),
        })
    }

    fn malformed(_: &ChatRequest, _: usize) -> std::result::Result<String, TransportError> {
        Ok("Sorry, here is your content: {slide 1".to_string())
    }

    fn deck(dir: &TempDir, slides: &[Vec<FixtureShape>]) -> (PathBuf, PathBuf) {
        let input = dir.path().join("input.pptx");
        fixtures::write_deck(&input, slides).unwrap();
        (input, dir.path().join("output.pptx"))
    }

    fn read_back(path: &Path) -> ContentMapping {
        let log = RunLog::new();
        let snapshot = DeckReader::new().read(path, &log).unwrap();
        build_content_mapping(&snapshot, &log)
    }

    fn texts(mapping: &ContentMapping) -> Vec<String> {
        mapping
            .slides
            .iter()
            .flat_map(|slide| slide.texts.iter().cloned())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_uppercase_end_to_end() {
        let dir = TempDir::new().unwrap();
        let (input, output) = deck(
            &dir,
            &fixtures::text_deck(&["Learn Day Trading", "Start today", "Join now"]),
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: ProgressCallback = Arc::new(move |current: usize, total: usize| {
            sink.lock().unwrap().push((current, total));
        });

        let processor = processor(uppercase);
        let result = processor
            .process(&input, &output, None, "Pottery classes", Some(progress))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.total_slides, 3);
        assert_eq!(result.section_count, 1);
        assert_eq!(result.replaced_runs, 3);
        assert_eq!(
            texts(&read_back(&output)),
            vec!["LEARN DAY TRADING", "START TODAY", "JOIN NOW"]
        );
        assert_eq!(result.before_after[0].changes[0].before, "Learn Day Trading");
        assert_eq!(result.before_after[0].changes[0].after, "LEARN DAY TRADING");
        assert_eq!(result.before_after[2].changes[0].after, "JOIN NOW");
        assert!(!result.debug_log.is_empty());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&(3, 3)));
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_degrade_to_markers() {
        let dir = TempDir::new().unwrap();
        let (input, output) = deck(&dir, &fixtures::text_deck(&["Start today", "Join now"]));

        let processor = processor(server_error);
        let result = processor
            .process(&input, &output, None, "", None)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(processor.rewriter().transport().calls(), 1);
        assert_eq!(
            texts(&read_back(&output)),
            vec![
                format!("{}Start today", REGENERATION_FAILED_MARKER),
                format!("{}Join now", REGENERATION_FAILED_MARKER)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_replies_degrade_to_markers() {
        let dir = TempDir::new().unwrap();
        let (input, output) = deck(&dir, &fixtures::text_deck(&["Join now"]));

        let processor = processor(malformed);
        let result = processor
            .process(&input, &output, None, "", None)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(processor.rewriter().transport().calls(), 3);
        assert_eq!(
            texts(&read_back(&output)),
            vec![format!("{}Join now", REGENERATION_FAILED_MARKER)]
        );
        // The section itself validated: the client always answers per slide
        assert!(!result.sections[0].failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_many_slides_rejected_before_any_call() {
        let dir = TempDir::new().unwrap();
        let names: Vec<String> = (1..=501).map(|n| format!("Slide {}", n)).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let (input, output) = deck(&dir, &fixtures::text_deck(&names));

        let processor = processor(uppercase);
        let err = processor
            .process(&input, &output, None, "", None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::TooManySlides {
                max: 500,
                actual: 501
            }
        ));
        assert_eq!(processor.rewriter().transport().calls(), 0);
        assert!(!output.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_section_size_rejected() {
        let dir = TempDir::new().unwrap();
        let (input, output) = deck(&dir, &fixtures::text_deck(&["Join now"]));

        let processor = processor(uppercase);
        let err = processor
            .process(&input, &output, Some(0), "", None)
            .await
            .unwrap_err();

        assert!(err.is_config());
        assert_eq!(processor.rewriter().transport().calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_text_kept_and_warned() {
        let dir = TempDir::new().unwrap();
        let (input, output) = deck(
            &dir,
            &[vec![
                FixtureShape::group(vec![FixtureShape::text("Grouped caption")]),
                FixtureShape::text("Free text"),
            ]],
        );

        let processor = processor(uppercase);
        let result = processor
            .process(&input, &output, None, "", None)
            .await
            .unwrap();

        assert_eq!(result.replaced_runs, 1);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.starts_with("Slide 1: Group shape")));
        assert_eq!(
            texts(&read_back(&output)),
            vec!["Grouped caption", "FREE TEXT"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_section_override_splits_deck() {
        let dir = TempDir::new().unwrap();
        let (input, output) = deck(&dir, &fixtures::text_deck(&["One", "Two", "Three"]));

        let processor = processor(uppercase);
        let result = processor
            .process(&input, &output, Some(2), "", None)
            .await
            .unwrap();

        assert_eq!(result.section_count, 2);
        assert_eq!(result.sections.len(), 2);
        assert_eq!(result.sections[0].slide_numbers, vec![1, 2]);
        assert_eq!(processor.rewriter().transport().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unwritable_output_reports_failure() {
        let dir = TempDir::new().unwrap();
        let (input, _) = deck(&dir, &fixtures::text_deck(&["Join now"]));
        let output = dir.path().join("missing").join("output.pptx");

        let processor = processor(uppercase);
        let result = processor
            .process(&input, &output, None, "", None)
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.starts_with("Failed to write output")));
        assert!(!output.exists());
    }
}

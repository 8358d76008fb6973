//! Drives sections of the content mapping through a rewriter.

use crate::progress::Progress;
use deck_core::{
    split_into_sections, ContentMapping, ProcessingResult, ProcessorConfig, Result, RunLog,
    RunningContext, SectionReport, SlideContent, SlideRewrite, SlideTexts,
};
use deck_rewrite::{RewriteRequest, SectionRewriter};
use std::ops::Range;
use std::time::{Duration, Instant};

const STAGE: &str = "orchestrate";

/// Reason recorded on slides whose section never validated.
pub const MAX_RETRIES_EXCEEDED: &str = "Max retries exceeded";

/// Runs every section of one document through the rewriter.
pub struct SectionOrchestrator<'a, R> {
    rewriter: &'a R,
    config: &'a ProcessorConfig,
    user_info: &'a str,
    progress: &'a Progress,
}

impl<'a, R: SectionRewriter> SectionOrchestrator<'a, R> {
    pub fn new(
        rewriter: &'a R,
        config: &'a ProcessorConfig,
        user_info: &'a str,
        progress: &'a Progress,
    ) -> Self {
        Self {
            rewriter,
            config,
            user_info,
            progress,
        }
    }

    /// Attach a rewrite to every slide of `mapping`, section by section.
    ///
    /// Section reports, before/after records and key concepts are added to
    /// `result`. A section that never validates degrades to failure-marked
    /// text; only configuration problems return an error.
    pub async fn run(
        &self,
        mapping: &mut ContentMapping,
        result: &mut ProcessingResult,
        log: &RunLog,
    ) -> Result<()> {
        let ranges = section_ranges(&mapping.slides, self.config.max_slides_per_section)?;
        let total = mapping.slides.len();
        log.info(
            STAGE,
            format!("Processing {} slides in {} sections", total, ranges.len()),
        );

        let mut context = RunningContext::new();
        let mut processed = 0;
        for (index, range) in ranges.into_iter().enumerate() {
            let section = &mut mapping.slides[range];
            let report = self
                .process_section(index, section, &context, processed, log)
                .await;

            context.absorb(index, section, self.config.summary_max_chars);
            result.before_after.extend(
                section
                    .iter()
                    .filter_map(|slide| slide.rewrite.as_ref())
                    .map(|rewrite| rewrite.before_after.clone()),
            );

            processed += section.len();
            self.progress.report(processed);
            log.info(
                STAGE,
                format!(
                    "Section {}: {} slides in {:.2}s ({} attempt(s){})",
                    index + 1,
                    report.slide_count,
                    report.duration_secs,
                    report.attempts,
                    if report.failed { ", failed" } else { "" }
                ),
            );
            result.sections.push(report);
        }

        result.key_concepts = context.key_concepts;
        Ok(())
    }

    async fn process_section(
        &self,
        index: usize,
        section: &mut [SlideContent],
        context: &RunningContext,
        processed_before: usize,
        log: &RunLog,
    ) -> SectionReport {
        let started = Instant::now();
        let sources: Vec<SlideTexts> = section.iter().map(SlideContent::rewrite_source).collect();
        let max_attempts = self.config.section_max_attempts.max(1);

        let mut attempts = 0;
        let mut regenerated = None;
        while attempts < max_attempts {
            attempts += 1;
            let request = RewriteRequest {
                slides: &sources,
                previous_summary: &context.summary,
                key_concepts: &context.key_concepts,
                user_info: self.user_info,
            };

            let ticker = self.progress.start_ticker(
                processed_before,
                processed_before + section.len(),
                self.config.progress_tick(),
            );
            let entries = self.rewriter.rewrite_section(request, log).await;
            ticker.stop().await;

            if entries.len() == sources.len() {
                regenerated = Some(entries);
                break;
            }
            log.warn(
                STAGE,
                format!(
                    "Incomplete regeneration in section {}, attempt {}. Expected {} slides, got {}",
                    index + 1,
                    attempts,
                    sources.len(),
                    entries.len()
                ),
            );
            if attempts < max_attempts {
                tokio::time::sleep(self.section_backoff(attempts - 1)).await;
            }
        }

        let failed = regenerated.is_none();
        match regenerated {
            Some(entries) => {
                for (slide, entry) in section.iter_mut().zip(entries) {
                    let rewrite = SlideRewrite::from_regenerated(slide, entry.texts);
                    slide.rewrite = Some(rewrite);
                }
            }
            None => {
                log.warn(
                    STAGE,
                    format!(
                        "Section {} failed after {} attempts; keeping marked originals",
                        index + 1,
                        attempts
                    ),
                );
                for slide in section.iter_mut() {
                    let rewrite = SlideRewrite::failed(slide, MAX_RETRIES_EXCEEDED);
                    slide.rewrite = Some(rewrite);
                }
            }
        }

        SectionReport {
            index,
            slide_count: section.len(),
            slide_numbers: section.iter().map(|slide| slide.number).collect(),
            duration_secs: started.elapsed().as_secs_f64(),
            regenerated_texts_count: section
                .iter()
                .filter_map(|slide| slide.rewrite.as_ref())
                .map(|rewrite| rewrite.replacements.len())
                .sum(),
            attempts,
            failed,
        }
    }

    /// `base * 2^attempt`, no jitter.
    fn section_backoff(&self, attempt: usize) -> Duration {
        self.config
            .section_backoff_base()
            .saturating_mul(1u32 << attempt.min(16))
    }
}

/// Index ranges of the sections `slides` splits into.
fn section_ranges(slides: &[SlideContent], max_per_section: usize) -> Result<Vec<Range<usize>>> {
    let mut start = 0;
    Ok(split_into_sections(slides, max_per_section)?
        .into_iter()
        .map(|section| {
            let range = start..start + section.len();
            start = range.end;
            range
        })
        .collect())
}

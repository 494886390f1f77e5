// file: src/pipeline/progress.rs
// description: progress bars and counters for chunk ingestion
// reference: uses indicatif for progress bars and tracks ingestion metrics

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    pub chunks_read: usize,
    pub chunks_skipped: usize,
    pub chunks_inserted: usize,
    pub chunks_failed: usize,
    pub batches: usize,
    pub documents_replaced: usize,
    pub duration_secs: f64,
}

impl IngestStats {
    pub fn chunks_per_second(&self) -> f64 {
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        self.chunks_inserted as f64 / self.duration_secs
    }

    /// Percentage of attempted chunks that made it into the index.
    pub fn success_rate(&self) -> f64 {
        let total = self.chunks_inserted + self.chunks_failed;
        if total == 0 {
            return 0.0;
        }
        (self.chunks_inserted as f64 / total as f64) * 100.0
    }

    pub fn summary(&self) -> String {
        let inserted = format!("{} inserted", self.chunks_inserted).green();
        let failed = if self.chunks_failed > 0 {
            format!("{} failed", self.chunks_failed).red()
        } else {
            format!("{} failed", self.chunks_failed).normal()
        };
        format!(
            "{}, {}, {} skipped in {} batches ({:.1} chunks/s)",
            inserted,
            failed,
            self.chunks_skipped,
            self.batches,
            self.chunks_per_second()
        )
    }
}

pub struct IngestProgress {
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
    inserted: AtomicUsize,
    failed: AtomicUsize,
    batches: AtomicUsize,
    start_time: Instant,
}

impl IngestProgress {
    pub fn new(total_chunks: usize, colored: bool) -> Self {
        let multi_progress = MultiProgress::new();
        let main_bar = create_progress_bar(&multi_progress, total_chunks as u64, colored);
        let detail_bar = create_detail_bar(&multi_progress);

        Self {
            main_bar,
            detail_bar,
            inserted: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            batches: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Progress without terminal output, for tests and JSON mode.
    pub fn hidden() -> Self {
        Self {
            main_bar: ProgressBar::hidden(),
            detail_bar: ProgressBar::hidden(),
            inserted: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            batches: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn batch_inserted(&self, count: usize) {
        self.inserted.fetch_add(count, Ordering::SeqCst);
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(count as u64);
        self.update_detail_bar();
    }

    pub fn batch_failed(&self, count: usize) {
        self.failed.fetch_add(count, Ordering::SeqCst);
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(count as u64);
        self.update_detail_bar();
    }

    pub fn set_message(&self, message: String) {
        self.detail_bar.set_message(message);
    }

    pub fn finish(&self) {
        self.main_bar.finish_with_message("Ingestion complete");
        self.detail_bar.finish_and_clear();
    }

    pub fn get_stats(&self) -> IngestStats {
        IngestStats {
            chunks_inserted: self.inserted.load(Ordering::SeqCst),
            chunks_failed: self.failed.load(Ordering::SeqCst),
            batches: self.batches.load(Ordering::SeqCst),
            duration_secs: self.start_time.elapsed().as_secs_f64(),
            ..IngestStats::default()
        }
    }

    fn update_detail_bar(&self) {
        let inserted = self.inserted.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        self.detail_bar
            .set_message(format!("Inserted: {} | Failed: {}", inserted, failed));
    }
}

fn create_progress_bar(multi_progress: &MultiProgress, total: u64, colored: bool) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(total));
    let (template, chars) = if colored {
        (
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta}) {msg}",
            "█▓▒░",
        )
    } else {
        (
            "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} chunks ({eta}) {msg}",
            "=>-",
        )
    };
    let style = ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(chars);
    bar.set_style(style);
    bar
}

fn create_detail_bar(multi_progress: &MultiProgress) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(0));
    let style = ProgressStyle::default_bar()
        .template("{msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

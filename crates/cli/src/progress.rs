//! Progress reporting and summaries for the CLI

use std::path::Path;
use std::time::Instant;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Progress reporter with a main bar and a stats line
pub struct ProgressReporter {
    _multi: MultiProgress,
    main_bar: ProgressBar,
    stats_bar: ProgressBar,
    _start_time: Instant,
    mode: ProgressMode,
}

/// Progress tracking mode
enum ProgressMode {
    /// Track progress by bytes processed
    Bytes,
    /// Track progress by records processed
    Records,
}

impl ProgressReporter {
    /// Create a new progress reporter tracking bytes
    pub fn new(total_bytes: u64) -> Self {
        Self::build(ProgressMode::Bytes, total_bytes,
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}")
    }

    /// Create a new progress reporter tracking records
    pub fn new_record_based(total_records: u64) -> Self {
        Self::build(ProgressMode::Records, total_records,
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {human_pos}/{human_len} ({per_sec}) {msg}")
    }

    fn build(mode: ProgressMode, total: u64, template: &str) -> Self {
        let multi = MultiProgress::new();

        let main_bar = multi.add(ProgressBar::new(total));
        main_bar.set_style(
            ProgressStyle::default_bar()
                .template(template)
                .unwrap()
                .progress_chars("█▓▒░-"),
        );

        let stats_bar = multi.add(ProgressBar::new(0));
        stats_bar.set_style(ProgressStyle::default_bar().template("Stats: {msg}").unwrap());

        Self {
            _multi: multi,
            main_bar,
            stats_bar,
            _start_time: Instant::now(),
            mode,
        }
    }

    /// Update progress with current statistics
    pub fn update(&self, position: u64, total: usize, matched: usize, skipped: usize) {
        match self.mode {
            ProgressMode::Bytes => self.main_bar.set_position(position),
            ProgressMode::Records => self.main_bar.set_position(total as u64),
        }
        self.main_bar.set_message("Processing...");

        let stats_msg = if matched > 0 && skipped > 0 {
            format!(
                "{} total | {} matched ({:.1}%) | {} skipped",
                Self::format_number(total),
                Self::format_number(matched),
                (matched as f64 / total as f64) * 100.0,
                Self::format_number(skipped),
            )
        } else if matched > 0 {
            format!(
                "{} total | {} matched ({:.1}%)",
                Self::format_number(total),
                Self::format_number(matched),
                (matched as f64 / total as f64) * 100.0
            )
        } else if skipped > 0 {
            format!(
                "{} total | {} skipped",
                Self::format_number(total),
                Self::format_number(skipped),
            )
        } else {
            format!("{} total", Self::format_number(total))
        };

        self.stats_bar.set_message(stats_msg);
    }

    /// Finish progress reporting
    pub fn finish(&self) {
        self.main_bar.finish_with_message("Complete!");
        self.stats_bar.finish();
    }

    /// Format large numbers compactly
    fn format_number(n: usize) -> String {
        if n >= 1_000_000 {
            format!("{:.1}M", n as f64 / 1_000_000.0)
        } else if n >= 1_000 {
            format!("{:.1}K", n as f64 / 1_000.0)
        } else {
            n.to_string()
        }
    }
}

/// Print a formatted dedup run report
pub fn print_dedup_report(
    store_path: &Path,
    processed: usize,
    matched: usize,
    groups_created: usize,
    groups_removed: usize,
    components_matched: usize,
) {
    println!("\n{}", "═".repeat(60));
    println!("Deduplication Complete");
    println!("{}", "═".repeat(60));
    println!("Store:              {}", store_path.display());
    println!("Records processed:  {}", format_with_commas(processed));

    if processed > 0 {
        println!(
            "Records matched:    {} ({:.1}%)",
            format_with_commas(matched),
            (matched as f64 / processed as f64) * 100.0
        );
    }

    println!("Groups created:     {}", format_with_commas(groups_created));

    if groups_removed > 0 {
        println!("Groups removed:     {}", format_with_commas(groups_removed));
    }

    if components_matched > 0 {
        println!(
            "Component matches:  {}",
            format_with_commas(components_matched)
        );
    }

    println!("{}", "═".repeat(60));
}

/// Print a formatted ingest report
pub fn print_ingest_report(input: &Path, loaded: usize, skipped: usize) {
    println!("\n{}", "═".repeat(60));
    println!("Harvest Load Complete");
    println!("{}", "═".repeat(60));
    println!("Input:              {}", input.display());
    println!("Records loaded:     {}", format_with_commas(loaded));

    if skipped > 0 {
        println!("Records skipped:    {}", format_with_commas(skipped));
    }

    println!("{}", "═".repeat(60));
}

/// Format number with thousand separators
fn format_with_commas(n: usize) -> String {
    n.to_string()
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(std::str::from_utf8)
        .collect::<Result<Vec<&str>, _>>()
        .unwrap()
        .join(",")
}

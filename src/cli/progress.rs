//! Progress display module
//!
//! Per-piece download progress, written to stderr so stdout only carries
//! command output.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::download::strategy::ProgressFn;

/// Download statistics for progress display
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DownloadStats {
    /// Bytes downloaded so far
    pub downloaded: u64,
    /// Total bytes expected
    pub total: u64,
    /// Pieces completed
    pub pieces: u32,
}

impl DownloadStats {
    /// Fraction complete, 0.0 to 1.0
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.downloaded as f64 / self.total as f64
        }
    }

    /// Format bytes to human readable string
    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_index])
    }

    /// Format duration to human readable string
    pub fn format_duration(duration: Duration) -> String {
        let total_secs = duration.as_secs();
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

/// Progress display for CLI
pub struct ProgressDisplay {
    start_time: Instant,
    stats: DownloadStats,
    quiet: bool,
}

impl ProgressDisplay {
    /// Create a new progress display
    pub fn new(quiet: bool) -> Self {
        Self {
            start_time: Instant::now(),
            stats: DownloadStats::default(),
            quiet,
        }
    }

    /// Record a completed piece and redraw the progress line
    pub fn piece_done(&mut self, index: u32, downloaded: u64, total: u64) -> io::Result<()> {
        self.stats = DownloadStats {
            downloaded,
            total,
            pieces: self.stats.pieces + 1,
        };
        if self.quiet {
            return Ok(());
        }

        let line = self.render_line(index);
        let mut stderr = io::stderr();
        write!(stderr, "\r\x1b[2K{}", line)?;
        if downloaded >= total {
            writeln!(stderr)?;
        }
        stderr.flush()
    }

    fn render_line(&self, index: u32) -> String {
        let progress_percent = self.stats.progress() * 100.0;
        let bar_width: usize = 40;
        let filled = ((progress_percent / 100.0) * bar_width as f64) as usize;
        let bar = "=".repeat(filled.min(bar_width)) + &" ".repeat(bar_width.saturating_sub(filled));

        format!(
            "[{}] {:.1}% | {} / {} | piece {} | {}",
            bar,
            progress_percent,
            DownloadStats::format_bytes(self.stats.downloaded),
            DownloadStats::format_bytes(self.stats.total),
            index,
            DownloadStats::format_duration(self.start_time.elapsed()),
        )
    }

    /// Adapt this display into a downloader progress callback
    pub fn into_callback(mut self) -> ProgressFn {
        Box::new(move |index, downloaded, total| {
            // Progress output is best effort
            let _ = self.piece_done(index, downloaded, total);
        })
    }

    pub fn stats(&self) -> DownloadStats {
        self.stats
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

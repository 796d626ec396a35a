use std::sync::atomic::{AtomicU32, Ordering};

use super::constants::DEFAULT_MAX_PRINT;

/// Process-wide warning and error counters shared by all decode calls.
///
/// Counters saturate instead of wrapping and use relaxed ordering; the counts
/// are a diagnostics aid and may be approximate under concurrent use. Each
/// increment reports whether the caller should still log its message, which
/// caps the number of printed messages per kind.
#[derive(Debug)]
pub struct Diagnostics {
    warnings: AtomicU32,
    errors: AtomicU32,
    max_warning_print: u32,
    max_error_print: u32,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PRINT, DEFAULT_MAX_PRINT)
    }
}

impl Diagnostics {
    pub fn new(max_warning_print: u32, max_error_print: u32) -> Self {
        Self {
            warnings: AtomicU32::new(0),
            errors: AtomicU32::new(0),
            max_warning_print,
            max_error_print,
        }
    }

    /// Count a warning. Returns true if the message should be logged.
    pub fn warning(&self) -> bool {
        saturating_increment(&self.warnings) < self.max_warning_print
    }

    /// Count an error. Returns true if the message should be logged.
    pub fn error(&self) -> bool {
        saturating_increment(&self.errors) < self.max_error_print
    }

    pub fn warning_count(&self) -> u32 {
        self.warnings.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u32 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Log the final counts
    pub fn report(&self, print_if_none: bool) {
        let warnings = self.warning_count();
        let errors = self.error_count();
        if warnings > 0 {
            spdlog::warn!(
                "Found {} warnings in decoding ({} printed)",
                warnings,
                warnings.min(self.max_warning_print)
            );
        } else if print_if_none {
            spdlog::info!("No warnings found in decoding");
        }
        if errors > 0 {
            spdlog::error!(
                "Found {} errors in decoding ({} printed)",
                errors,
                errors.min(self.max_error_print)
            );
        } else if print_if_none {
            spdlog::info!("No errors found in decoding");
        }
    }
}

/// Returns the value before the increment
fn saturating_increment(counter: &AtomicU32) -> u32 {
    match counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
        Some(v.saturating_add(1))
    }) {
        Ok(prev) | Err(prev) => prev,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_print_cap() {
        let diag = Diagnostics::new(2, 0);
        assert!(diag.warning());
        assert!(diag.warning());
        assert!(!diag.warning());
        assert_eq!(diag.warning_count(), 3);
        assert!(!diag.error());
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn test_saturates() {
        let diag = Diagnostics::default();
        diag.errors.store(u32::MAX, Ordering::Relaxed);
        diag.error();
        assert_eq!(diag.error_count(), u32::MAX);
    }

    #[test]
    fn test_shared_between_threads() {
        let diag = Arc::new(Diagnostics::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let d = diag.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        d.warning();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(diag.warning_count(), 400);
    }
}

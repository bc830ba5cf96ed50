use std::collections::BTreeSet;
use std::io::{self, Write};

use crate::article::ArticleRecord;
use crate::parse::RowError;

/// How many validation errors are printed before the rest are summarised.
pub const MAX_LISTED_ERRORS: usize = 20;

/// Result of the parse pass over the whole file.
#[derive(Debug, Default)]
pub struct Validation {
    /// CSV records read, excluding the header.
    pub rows: usize,
    pub articles: Vec<ArticleRecord>,
    pub errors: Vec<RowError>,
}

impl Validation {
    /// Rows that produced no article. A row can carry several stopping errors.
    pub fn rejected_rows(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| e.kind.is_fatal_for_row())
            .map(|e| e.row)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn write_report(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "\nValidation Results:")?;
        writeln!(out, "  - Total rows: {}", self.rows)?;
        writeln!(out, "  - Valid articles: {}", self.articles.len())?;
        writeln!(out, "  - Errors: {}", self.errors.len())?;

        if self.errors.is_empty() {
            return Ok(());
        }
        writeln!(out, "\nErrors found:")?;
        for e in self.errors.iter().take(MAX_LISTED_ERRORS) {
            writeln!(out, "  - {e}")?;
        }
        if self.errors.len() > MAX_LISTED_ERRORS {
            writeln!(
                out,
                "  ... and {} more errors",
                self.errors.len() - MAX_LISTED_ERRORS
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::RowErrorKind;

    fn render(v: &Validation) -> String {
        let mut buf = Vec::new();
        v.write_report(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn clean_report_has_no_error_section() {
        let v = Validation {
            rows: 3,
            ..Validation::default()
        };
        let text = render(&v);
        assert!(text.contains("  - Total rows: 3\n"));
        assert!(text.contains("  - Errors: 0\n"));
        assert!(!text.contains("Errors found"));
    }

    #[test]
    fn caps_listed_errors_at_twenty() {
        let errors = (0..25)
            .map(|i| RowError::new(i + 2, RowErrorKind::UnknownCategory(format!("c{i}"))))
            .collect();
        let v = Validation {
            rows: 25,
            articles: Vec::new(),
            errors,
        };
        let text = render(&v);
        assert!(text.contains("  - Row 2: unknown category_slug 'c0'\n"));
        assert!(text.contains("  - Row 21: unknown category_slug 'c19'\n"));
        assert!(!text.contains("'c20'"));
        assert!(text.ends_with("  ... and 5 more errors\n"));
    }

    #[test]
    fn rejected_rows_counts_each_stopped_row_once() {
        let v = Validation {
            rows: 4,
            articles: Vec::new(),
            errors: vec![
                RowError::new(2, RowErrorKind::MissingField("title")),
                RowError::new(2, RowErrorKind::MissingField("slug")),
                RowError::new(3, RowErrorKind::UnknownCategory("museums".into())),
                RowError::new(4, RowErrorKind::BlocksEmpty),
            ],
        };
        assert_eq!(v.rejected_rows(), 2);
        assert_eq!(Validation::default().rejected_rows(), 0);
    }
}

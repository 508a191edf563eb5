//! Core types for provider requests and parsed result lines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Export format requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportFormat {
    /// `domain;rank` per line.
    Csv,
    /// `domain;rank;snippet` per line.
    CsvSnippets,
}

impl ExportFormat {
    /// Select the format from a query definition's snippet flag.
    ///
    /// Only `"yes"` (any case) requests snippets.
    pub fn from_snippet_flag(flag: &str) -> Self {
        if flag.eq_ignore_ascii_case("yes") {
            Self::CsvSnippets
        } else {
            Self::Csv
        }
    }

    /// The value of the `export` query parameter.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::CsvSnippets => "csvsnippets",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One parsed line of provider output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultLine {
    /// Matching website domain.
    pub domain: String,
    /// Provider rank, kept verbatim as text.
    pub rank: String,
    /// Matching source excerpt; empty when snippets were not requested.
    pub snippet: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_flag_is_case_insensitive() {
        assert_eq!(ExportFormat::from_snippet_flag("yes"), ExportFormat::CsvSnippets);
        assert_eq!(ExportFormat::from_snippet_flag("YES"), ExportFormat::CsvSnippets);
        assert_eq!(ExportFormat::from_snippet_flag("Yes"), ExportFormat::CsvSnippets);
    }

    #[test]
    fn anything_else_is_plain_csv() {
        assert_eq!(ExportFormat::from_snippet_flag("no"), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_snippet_flag(""), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_snippet_flag("y"), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_snippet_flag(" yes"), ExportFormat::Csv);
    }

    #[test]
    fn export_format_tokens() {
        assert_eq!(ExportFormat::Csv.token(), "csv");
        assert_eq!(ExportFormat::CsvSnippets.token(), "csvsnippets");
        assert_eq!(ExportFormat::CsvSnippets.to_string(), "csvsnippets");
    }
}

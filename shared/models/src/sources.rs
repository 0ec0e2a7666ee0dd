//! Source kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five ingestable document kinds. Each kind has its own metadata table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Txt,
    Md,
    Docx,
    Memo,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Pdf,
        SourceKind::Txt,
        SourceKind::Md,
        SourceKind::Docx,
        SourceKind::Memo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Pdf => "pdf",
            SourceKind::Txt => "txt",
            SourceKind::Md => "md",
            SourceKind::Docx => "docx",
            SourceKind::Memo => "memo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(SourceKind::Pdf),
            "txt" => Some(SourceKind::Txt),
            "md" => Some(SourceKind::Md),
            "docx" => Some(SourceKind::Docx),
            "memo" => Some(SourceKind::Memo),
            _ => None,
        }
    }

    /// Whether sources of this kind reference an uploaded file on disk.
    pub fn is_file_backed(&self) -> bool {
        !matches!(self, SourceKind::Memo)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips() {
        for kind in SourceKind::ALL {
            assert_eq!(SourceKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SourceKind::parse("wav"), None);
    }

    #[test]
    fn memo_is_not_file_backed() {
        assert!(!SourceKind::Memo.is_file_backed());
        assert!(SourceKind::Pdf.is_file_backed());
    }
}

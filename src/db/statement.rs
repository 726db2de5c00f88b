//! Statement classification by leading keyword.

/// Result shape of a statement, decided by its leading keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    /// Any other statement, carrying its upper-cased verb (e.g. `CREATE`).
    Command(String),
}

impl StatementKind {
    /// Classify a statement by its first keyword (case-insensitive, trimmed).
    pub fn classify(sql: &str) -> Self {
        let verb: String = sql
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();

        match verb.to_lowercase().as_str() {
            "select" => Self::Select,
            "insert" => Self::Insert,
            _ => Self::Command(verb.to_uppercase()),
        }
    }
}

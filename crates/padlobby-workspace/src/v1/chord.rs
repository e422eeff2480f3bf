use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordErrorKind {
    /// No buttons at all.
    Empty,
    /// A `+` without a button on one side.
    DanglingPlus,
    /// Two buttons without a `+` between them.
    MissingPlus,
}

impl fmt::Display for ChordErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChordErrorKind::Empty => "no buttons",
            ChordErrorKind::DanglingPlus => "dangling '+'",
            ChordErrorKind::MissingPlus => "buttons must be joined with '+'",
        })
    }
}

/// Splits a chord expression such as `tl + tr` into button terms.
pub(crate) fn split_chord(input: &str) -> Result<Vec<&str>, ChordErrorKind> {
    if input.trim().is_empty() {
        return Err(ChordErrorKind::Empty);
    }
    input
        .split('+')
        .map(str::trim)
        .map(|term| {
            if term.is_empty() {
                Err(ChordErrorKind::DanglingPlus)
            } else if term.contains(char::is_whitespace) {
                Err(ChordErrorKind::MissingPlus)
            } else {
                Ok(term)
            }
        })
        .collect()
}

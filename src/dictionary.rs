// WHY: user vocabulary overrides must survive the base converter untouched.
// Matched spans are tracked as protected segments rather than textual
// markers, so nothing in the input can collide with them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One custom override: `simplified` in the input becomes `traditional` in the output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DictPair {
    pub simplified: String,
    pub traditional: String,
}

impl DictPair {
    pub fn new(simplified: impl Into<String>, traditional: impl Into<String>) -> Self {
        Self {
            simplified: simplified.into(),
            traditional: traditional.into(),
        }
    }
}

/// What is wrong with a dictionary line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    MissingComma,
    TooManyCommas,
    EmptySide,
    Duplicate { first_line: usize },
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingComma => f.write_str("missing comma"),
            Self::TooManyCommas => f.write_str("only one comma allowed"),
            Self::EmptySide => f.write_str("neither side may be empty"),
            Self::Duplicate { first_line } => {
                write!(f, "duplicate entry, already defined on line {first_line}")
            }
        }
    }
}

/// Validation problem on a 1-based line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictValidationError {
    pub line: usize,
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl DictValidationError {
    fn new(line: usize, kind: ValidationErrorKind) -> Self {
        let message = format!("line {line}: {kind}");
        Self { line, kind, message }
    }
}

impl fmt::Display for DictValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Iterate non-blank lines with their 1-based position
fn numbered_lines(csv: &str) -> impl Iterator<Item = (usize, &str)> {
    csv.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty())
}

/// Structural check of one line, independent of other lines
fn split_line(line: &str) -> Result<(&str, &str), ValidationErrorKind> {
    match line.matches(',').count() {
        0 => return Err(ValidationErrorKind::MissingComma),
        1 => {}
        _ => return Err(ValidationErrorKind::TooManyCommas),
    }
    let (left, right) = line
        .split_once(',')
        .ok_or(ValidationErrorKind::MissingComma)?;
    let (left, right) = (left.trim(), right.trim());
    if left.is_empty() || right.is_empty() {
        return Err(ValidationErrorKind::EmptySide);
    }
    Ok((left, right))
}

/// Collect every problem in `csv`; an empty list means the text is valid
pub fn validate(csv: &str) -> Vec<DictValidationError> {
    let mut errors = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (line_no, line) in numbered_lines(csv) {
        match split_line(line) {
            Ok((simplified, _)) => {
                if let Some(&first_line) = seen.get(simplified) {
                    errors.push(DictValidationError::new(
                        line_no,
                        ValidationErrorKind::Duplicate { first_line },
                    ));
                } else {
                    seen.insert(simplified, line_no);
                }
            }
            Err(kind) => errors.push(DictValidationError::new(line_no, kind)),
        }
    }

    errors
}

/// Lenient parse: structurally invalid lines are dropped, order and duplicates kept
pub fn parse(csv: &str) -> Vec<DictPair> {
    numbered_lines(csv)
        .filter_map(|(_, line)| split_line(line).ok())
        .map(|(simplified, traditional)| DictPair::new(simplified, traditional))
        .collect()
}

/// Piece of working text: either still open to conversion or claimed by a pair
#[derive(Debug)]
enum Segment<'t> {
    Open(&'t str),
    Protected(usize),
}

/// Pairs pre-sorted for longest-match-first substitution
#[derive(Debug, Clone, Default)]
pub struct DictionaryOverlay {
    pairs: Vec<DictPair>,
}

impl DictionaryOverlay {
    pub fn new(pairs: &[DictPair]) -> Self {
        let mut pairs: Vec<DictPair> = pairs
            .iter()
            .filter(|p| !p.simplified.is_empty())
            .cloned()
            .collect();
        // stable: equal-length keys keep caller order
        pairs.sort_by(|a, b| b.simplified.chars().count().cmp(&a.simplified.chars().count()));
        Self { pairs }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Convert `text` with `base`, letting custom pairs win over the spans they match
    pub fn apply<F>(&self, text: &str, base: &F) -> String
    where
        F: Fn(&str) -> String + ?Sized,
    {
        if self.pairs.is_empty() {
            return base(text);
        }

        let mut segments = vec![Segment::Open(text)];
        for (index, pair) in self.pairs.iter().enumerate() {
            segments = protect(segments, &pair.simplified, index);
        }

        let mut output = String::with_capacity(text.len());
        for segment in segments {
            match segment {
                Segment::Open(span) => output.push_str(&base(span)),
                Segment::Protected(index) => output.push_str(&self.pairs[index].traditional),
            }
        }
        output
    }
}

/// Claim every occurrence of `key` inside the open segments
fn protect<'t>(segments: Vec<Segment<'t>>, key: &str, index: usize) -> Vec<Segment<'t>> {
    let mut result = Vec::with_capacity(segments.len());
    for segment in segments {
        let span = match segment {
            Segment::Open(span) if span.contains(key) => span,
            other => {
                result.push(other);
                continue;
            }
        };

        let mut rest = 0;
        for (start, matched) in span.match_indices(key) {
            if start > rest {
                result.push(Segment::Open(&span[rest..start]));
            }
            result.push(Segment::Protected(index));
            rest = start + matched.len();
        }
        if rest < span.len() {
            result.push(Segment::Open(&span[rest..]));
        }
    }
    result
}

/// One-shot convenience over [`DictionaryOverlay`]
pub fn apply<F>(text: &str, pairs: &[DictPair], base: &F) -> String
where
    F: Fn(&str) -> String + ?Sized,
{
    if pairs.is_empty() {
        return base(text);
    }
    DictionaryOverlay::new(pairs).apply(text, base)
}

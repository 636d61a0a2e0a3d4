//! Prepub part-range parsing and normalization.
//!
//! Grammar: `volume["." part][":" volume["." part]]`, numbers are positive
//! integers. A single endpoint selects exactly that volume or part, so `4.1`
//! normalizes to `4.1:4.1`.

use std::fmt;
use std::str::FromStr;

use crate::download::error::PipelineError;

const FIELD: &str = "prepub_parts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRef {
    pub volume: u32,
    pub part: Option<u32>,
}

impl fmt::Display for PartRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.part {
            Some(part) => write!(f, "{}.{}", self.volume, part),
            None => write!(f, "{}", self.volume),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub start: PartRef,
    pub end: PartRef,
}

impl fmt::Display for PartRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl FromStr for PartRange {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut pieces = trimmed.split(':');
        let start_raw = pieces.next().unwrap_or("");
        let end_raw = pieces.next();
        if pieces.next().is_some() {
            return Err(invalid(trimmed, "at most one ':' separator is allowed"));
        }

        let start = parse_ref(start_raw).map_err(|why| invalid(trimmed, why))?;
        let end = match end_raw {
            Some(raw) => parse_ref(raw).map_err(|why| invalid(trimmed, why))?,
            None => start,
        };

        if starts_after(&start, &end) {
            return Err(invalid(trimmed, "start of the range is after its end"));
        }

        Ok(Self { start, end })
    }
}

/// What the collaborator should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartSelection {
    All,
    Range(PartRange),
}

impl PartSelection {
    pub fn parse(raw: Option<&str>) -> Result<Self, PipelineError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::All),
            Some(s) => s.parse::<PartRange>().map(Self::Range),
        }
    }

    /// The value handed to `jncep --parts`, if any.
    pub fn as_arg(&self) -> Option<String> {
        match self {
            Self::All => None,
            Self::Range(r) => Some(r.to_string()),
        }
    }
}

impl fmt::Display for PartSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Range(r) => fmt::Display::fmt(r, f),
        }
    }
}

fn parse_ref(raw: &str) -> Result<PartRef, &'static str> {
    let (volume_raw, part_raw) = match raw.split_once('.') {
        Some((v, p)) => (v, Some(p)),
        None => (raw, None),
    };

    let volume = parse_number(volume_raw).ok_or("volume must be a positive integer")?;
    let part = match part_raw {
        Some(p) => Some(parse_number(p).ok_or("part must be a positive integer")?),
        None => None,
    };

    Ok(PartRef { volume, part })
}

fn parse_number(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u32>().ok().filter(|n| *n > 0)
}

// A whole-volume endpoint is comparable only by volume, so `4:4.2` is allowed.
fn starts_after(start: &PartRef, end: &PartRef) -> bool {
    if start.volume != end.volume {
        return start.volume > end.volume;
    }
    matches!((start.part, end.part), (Some(a), Some(b)) if a > b)
}

fn invalid(input: &str, why: &str) -> PipelineError {
    PipelineError::validation(
        FIELD,
        format!("invalid part range {input:?} ({why}); expected <vol>[.part] or <vol>[.part]:<vol>[.part]"),
    )
}

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::error::GatewayError;

/// One comma-separated piece of an array specifier: a bare index, a
/// contiguous range, or a strided range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Single(u32),
    Range { start: u32, end: u32, step: u32 },
}

/// A parsed Slurm array specifier, e.g. `"1-5,7,9-11:2"` (spec §4.4, §8).
///
/// Stride zero (`"1-10:0"`) is rejected with `InvalidResourceSpec` rather
/// than coerced to stride 1 — a design decision recorded in SPEC_FULL.md §9
/// resolving spec.md's open question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayRange {
    segments: Vec<Segment>,
    tasks: Vec<u32>,
}

impl ArrayRange {
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(GatewayError::InvalidResourceSpec(
                "array range must not be empty".to_string(),
            ));
        }

        let mut segments = Vec::new();
        let mut set = BTreeSet::new();

        for token in raw.split(',') {
            let token = token.trim();
            if token.is_empty() {
                return Err(GatewayError::InvalidResourceSpec(format!(
                    "array range `{raw}` has an empty element"
                )));
            }
            let segment = Self::parse_token(raw, token)?;
            match segment {
                Segment::Single(v) => {
                    set.insert(v);
                }
                Segment::Range { start, end, step } => {
                    let mut v = start;
                    while v <= end {
                        set.insert(v);
                        v += step;
                    }
                }
            }
            segments.push(segment);
        }

        if set.is_empty() {
            return Err(GatewayError::InvalidResourceSpec(format!(
                "array range `{raw}` expands to no tasks"
            )));
        }

        Ok(Self {
            segments,
            tasks: set.into_iter().collect(),
        })
    }

    fn parse_token(raw: &str, token: &str) -> Result<Segment, GatewayError> {
        let bad = |msg: &str| Err(GatewayError::InvalidResourceSpec(format!("array range `{raw}`: {msg}")));

        if let Some((range, step)) = token.split_once(':') {
            let step: u32 = step
                .parse()
                .map_err(|_| GatewayError::InvalidResourceSpec(format!("array range `{raw}`: bad stride `{step}`")))?;
            if step == 0 {
                return bad("stride zero is not a valid array step");
            }
            let (start, end) = Self::parse_bounds(raw, range)?;
            if start > end {
                return bad("range start is greater than end");
            }
            return Ok(Segment::Range { start, end, step });
        }

        if let Some((start, end)) = token.split_once('-') {
            let start: u32 = start
                .parse()
                .map_err(|_| GatewayError::InvalidResourceSpec(format!("array range `{raw}`: bad bound `{start}`")))?;
            let end: u32 = end
                .parse()
                .map_err(|_| GatewayError::InvalidResourceSpec(format!("array range `{raw}`: bad bound `{end}`")))?;
            if start > end {
                return bad("range start is greater than end");
            }
            return Ok(Segment::Range { start, end, step: 1 });
        }

        let value: u32 = token
            .parse()
            .map_err(|_| GatewayError::InvalidResourceSpec(format!("array range `{raw}`: bad index `{token}`")))?;
        Ok(Segment::Single(value))
    }

    fn parse_bounds(raw: &str, range: &str) -> Result<(u32, u32), GatewayError> {
        let (start, end) = range.split_once('-').ok_or_else(|| {
            GatewayError::InvalidResourceSpec(format!("array range `{raw}`: strided element needs a `start-end` range"))
        })?;
        let start: u32 = start
            .parse()
            .map_err(|_| GatewayError::InvalidResourceSpec(format!("array range `{raw}`: bad bound `{start}`")))?;
        let end: u32 = end
            .parse()
            .map_err(|_| GatewayError::InvalidResourceSpec(format!("array range `{raw}`: bad bound `{end}`")))?;
        Ok((start, end))
    }

    /// The fully expanded, sorted, deduplicated task id list.
    pub fn tasks(&self) -> &[u32] {
        &self.tasks
    }

    /// Re-renders to an equivalent Slurm-accepted `--array=` form.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            match seg {
                Segment::Single(v) => {
                    let _ = write!(out, "{v}");
                }
                Segment::Range { start, end, step } if *step == 1 => {
                    let _ = write!(out, "{start}-{end}");
                }
                Segment::Range { start, end, step } => {
                    let _ = write!(out, "{start}-{end}:{step}");
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_mixed_ranges_and_strides() {
        let r = ArrayRange::parse("1-5,7,9-11:2").unwrap();
        assert_eq!(r.tasks(), &[1, 2, 3, 4, 5, 7, 9, 11]);
        assert_eq!(r.render(), "1-5,7,9-11:2");
    }

    #[test]
    fn simple_contiguous_range() {
        let r = ArrayRange::parse("1-10").unwrap();
        assert_eq!(r.tasks().len(), 10);
        assert_eq!(r.render(), "1-10");
    }

    #[test]
    fn rejects_zero_stride() {
        let err = ArrayRange::parse("1-10:0").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResourceSpec(_)));
    }

    #[test]
    fn rejects_inverted_and_empty_ranges() {
        assert!(ArrayRange::parse("10-1").is_err());
        assert!(ArrayRange::parse("").is_err());
        assert!(ArrayRange::parse(",").is_err());
    }

    #[test]
    fn list_of_discrete_indices() {
        let r = ArrayRange::parse("1,3,7-9").unwrap();
        assert_eq!(r.tasks(), &[1, 3, 7, 8, 9]);
    }
}

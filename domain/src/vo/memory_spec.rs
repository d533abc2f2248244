use crate::error::GatewayError;

/// A validated `--mem` value: a positive integer followed by one of
/// `K`, `M`, `G`, `T`, optionally suffixed with `B` (spec §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySpec(String);

impl MemorySpec {
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let trimmed = raw.trim();
        let body = trimmed.strip_suffix('B').unwrap_or(trimmed);
        let (digits, suffix) = match body.chars().last() {
            Some(c) if c.is_ascii_alphabetic() => (&body[..body.len() - 1], Some(c)),
            _ => (body, None),
        };

        if digits.starts_with('-') {
            return Err(GatewayError::InvalidParams(format!(
                "memory spec `{raw}` must not be negative"
            )));
        }
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(GatewayError::InvalidResourceSpec(format!(
                "memory spec `{raw}` must start with a positive integer"
            )));
        }
        let amount: u64 = digits.parse().map_err(|_| {
            GatewayError::InvalidResourceSpec(format!("memory spec `{raw}` is not a valid integer"))
        })?;
        if amount == 0 {
            return Err(GatewayError::InvalidResourceSpec(format!(
                "memory spec `{raw}` must be positive"
            )));
        }
        match suffix {
            None | Some('K') | Some('M') | Some('G') | Some('T') => {}
            Some('k') | Some('m') | Some('g') | Some('t') => {}
            Some(other) => {
                return Err(GatewayError::InvalidResourceSpec(format!(
                    "memory spec `{raw}` has unsupported suffix `{other}`; expected one of K,M,G,T[B]"
                )));
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_suffixes() {
        for v in ["4G", "512M", "1T", "10K", "4GB"] {
            assert!(MemorySpec::parse(v).is_ok(), "{v} should parse");
        }
    }

    #[test]
    fn rejects_zero_and_bad_suffix() {
        assert!(MemorySpec::parse("0G").is_err());
        assert!(MemorySpec::parse("4X").is_err());
    }

    #[test]
    fn rejects_negative_as_invalid_params() {
        assert!(matches!(MemorySpec::parse("-4G"), Err(GatewayError::InvalidParams(_))));
    }
}

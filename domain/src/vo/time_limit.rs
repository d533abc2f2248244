use crate::error::GatewayError;

/// A validated `--time` value: `HH:MM:SS` or `D-HH:MM:SS` (spec §4.4, §8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeLimit(String);

impl TimeLimit {
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let bad = || {
            GatewayError::InvalidResourceSpec(format!(
                "time limit `{raw}` must be HH:MM:SS or D-HH:MM:SS"
            ))
        };

        let (days, rest) = match raw.split_once('-') {
            Some((d, rest)) => (Some(d), rest),
            None => (None, raw),
        };
        if let Some(d) = days {
            if d.is_empty() || !d.chars().all(|c| c.is_ascii_digit()) {
                return Err(bad());
            }
        }

        let parts: Vec<&str> = rest.split(':').collect();
        if parts.len() != 3 {
            return Err(bad());
        }
        let mut values = [0u32; 3];
        for (i, p) in parts.iter().enumerate() {
            if p.len() != 2 || !p.chars().all(|c| c.is_ascii_digit()) {
                return Err(bad());
            }
            values[i] = p.parse().map_err(|_| bad())?;
        }
        let [hh, mm, ss] = values;
        if mm > 59 || ss > 59 {
            return Err(bad());
        }
        if days.is_none() && hh > 99 {
            return Err(bad());
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_forms() {
        assert!(TimeLimit::parse("01:00:00").is_ok());
        assert!(TimeLimit::parse("2-04:30:00").is_ok());
    }

    #[test]
    fn rejects_out_of_range_and_malformed() {
        assert!(TimeLimit::parse("99:99:99").is_err());
        assert!(TimeLimit::parse("1:00:00").is_err());
        assert!(TimeLimit::parse("not-a-time").is_err());
    }
}

/// The outcome `salloc --no-shell`'s stderr announces (spec §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SallocOutcome {
    Granted { job_id: String },
    Pending { job_id: String },
    Failed { reason: String },
    ImmediateRejected,
    /// No recognizable line was seen at all; caller should treat as failed.
    Unrecognized,
}

pub fn parse_salloc_stderr(stderr: &str) -> SallocOutcome {
    for line in stderr.lines() {
        let line = line.trim();
        if let Some(id) = extract_after(line, "Granted job allocation ") {
            return SallocOutcome::Granted { job_id: id };
        }
        if let Some(id) = extract_after(line, "Pending job allocation ") {
            return SallocOutcome::Pending { job_id: id };
        }
        let lower = line.to_ascii_lowercase();
        if lower.contains("immediate") && (lower.contains("unavailable") || lower.contains("denied")) {
            return SallocOutcome::ImmediateRejected;
        }
        if lower.contains("allocation failure") || lower.contains("resources unavailable") {
            return SallocOutcome::Failed {
                reason: line.to_string(),
            };
        }
    }
    SallocOutcome::Unrecognized
}

fn extract_after(line: &str, prefix: &str) -> Option<String> {
    line.strip_prefix(prefix).map(|rest| {
        rest.trim_end_matches('.')
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_granted() {
        assert_eq!(
            parse_salloc_stderr("salloc: Granted job allocation 99\n"),
            SallocOutcome::Granted {
                job_id: "99".to_string()
            }
        );
    }

    #[test]
    fn recognizes_pending() {
        assert_eq!(
            parse_salloc_stderr("salloc: Pending job allocation 100\n"),
            SallocOutcome::Pending {
                job_id: "100".to_string()
            }
        );
    }

    #[test]
    fn recognizes_failure_reasons() {
        assert!(matches!(
            parse_salloc_stderr("salloc: error: Job submit/allocate failed: Requested node configuration is not available\nsalloc: error: resources unavailable"),
            SallocOutcome::Failed { .. }
        ));
    }

    #[test]
    fn recognizes_immediate_rejection() {
        assert_eq!(
            parse_salloc_stderr("salloc: error: Unable to allocate resources: Immediate allocation denied"),
            SallocOutcome::ImmediateRejected
        );
    }
}

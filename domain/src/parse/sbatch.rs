use crate::error::GatewayError;

/// Extracts the job id from `sbatch`'s stdout, e.g.
/// `"Submitted batch job 12345"`. Array submissions use the same format and
/// the id returned is the parent array id (spec §4.2).
pub fn parse_sbatch_job_id(stdout: &str) -> Result<String, GatewayError> {
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("Submitted batch job "))
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            GatewayError::Internal(format!(
                "could not find a job id in sbatch output: {stdout:?}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_submission() {
        assert_eq!(parse_sbatch_job_id("Submitted batch job 42\n").unwrap(), "42");
    }

    #[test]
    fn parses_array_submission_parent_id() {
        assert_eq!(
            parse_sbatch_job_id("Submitted batch job 100\n").unwrap(),
            "100"
        );
    }

    #[test]
    fn errors_on_unrecognized_output() {
        assert!(parse_sbatch_job_id("sbatch: error: Batch job submission failed").is_err());
    }
}

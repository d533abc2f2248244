use crate::model::job::JobState;

/// Parses `sacct -j <id> -o State -P -n` output: a single bare state token,
/// used as the second fallback in `check_job_status` once a job has left
/// `squeue`'s view (spec §4.2, §4.4).
pub fn parse_sacct_state(stdout: &str) -> Option<JobState> {
    let token = stdout.lines().next()?.trim();
    if token.is_empty() {
        return None;
    }
    Some(JobState::from_slurm_code(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_the_first_state_token() {
        assert_eq!(parse_sacct_state("COMPLETED\n"), Some(JobState::Completed));
    }

    #[test]
    fn blank_output_is_none() {
        assert_eq!(parse_sacct_state(""), None);
        assert_eq!(parse_sacct_state("\n"), None);
    }

    #[test]
    fn unknown_token_still_normalizes() {
        assert_eq!(parse_sacct_state("XYZ\n"), Some(JobState::Unknown));
    }
}

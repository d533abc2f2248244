use serde::Deserialize;

use crate::model::job::JobState;

/// One row of `squeue`'s pipe-delimited, explicitly-requested-fields output
/// (spec §4.2): `%i|%T|%j|%u|%M|%l|%D|%C|%P|%R|%N`, requested with `-h` so
/// there is no header line.
#[derive(Debug, Clone, Deserialize)]
pub struct SqueueRow {
    pub job_id: String,
    pub state_code: String,
    pub name: String,
    pub user: String,
    pub time_used: String,
    pub time_limit: String,
    pub num_nodes: u32,
    pub num_cpus: u32,
    pub partition: String,
    pub reason: String,
    pub nodelist: String,
}

impl SqueueRow {
    pub fn state(&self) -> JobState {
        JobState::from_slurm_code(&self.state_code)
    }
}

/// Parses `squeue -h -o "%i|%T|%j|%u|%M|%l|%D|%C|%P|%R|%N"` output. Blank
/// input (job no longer queued) yields an empty vec, never an error.
/// Rows with fewer fields than expected are skipped rather than failing
/// the whole parse (spec §4.2's tolerance policy).
pub fn parse_squeue(stdout: &str) -> Vec<SqueueRow> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .from_reader(stdout.as_bytes());

    reader
        .deserialize::<SqueueRow>()
        .filter_map(|r| r.ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_row() {
        let out = "123|RUNNING|myjob|alice|00:05:00|01:00:00|2|8|debug|None|node[01-02]\n";
        let rows = parse_squeue(out);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].job_id, "123");
        assert_eq!(rows[0].state(), JobState::Running);
        assert_eq!(rows[0].num_nodes, 2);
    }

    #[test]
    fn empty_output_is_empty_vec_not_error() {
        assert!(parse_squeue("").is_empty());
        assert!(parse_squeue("\n\n").is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        assert!(parse_squeue("not enough fields here\n").is_empty());
    }
}

use serde::Deserialize;

use crate::model::cluster::PartitionState;

/// One row of `sinfo -h -o "%P|%a|%l|%D|%t|%N"` output.
#[derive(Debug, Clone, Deserialize)]
pub struct PartitionRow {
    pub name: String,
    pub avail: String,
    pub time_limit: String,
    pub nodes: u32,
    pub state_code: String,
    pub nodelist: String,
}

impl PartitionRow {
    pub fn is_default(&self) -> bool {
        self.name.ends_with('*')
    }

    pub fn clean_name(&self) -> String {
        self.name.trim_end_matches('*').to_string()
    }

    pub fn state(&self) -> PartitionState {
        PartitionState::from_sinfo_code(&self.avail)
    }
}

pub fn parse_sinfo(stdout: &str) -> Vec<PartitionRow> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .from_reader(stdout.as_bytes());

    reader
        .deserialize::<PartitionRow>()
        .filter_map(|r| r.ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_partition_marker() {
        let out = "debug*|up|1:00:00|4|idle|mock-node-[0-3]\n";
        let rows = parse_sinfo(out);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_default());
        assert_eq!(rows[0].clean_name(), "debug");
        assert_eq!(rows[0].state(), PartitionState::Up);
    }
}

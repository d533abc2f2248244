//! Output file naming (spec §6's on-disk surface). A job's stdout/stderr
//! path is a pure function of its id and the output directory — the
//! adapter never has to ask Slurm where a job's files are.

use std::path::{Path, PathBuf};

pub fn stdout_path(output_dir: &Path, job_id: &str) -> PathBuf {
    output_dir.join(format!("slurm_{job_id}.out"))
}

pub fn stderr_path(output_dir: &Path, job_id: &str) -> PathBuf {
    output_dir.join(format!("slurm_{job_id}.err"))
}

pub fn array_task_id(array_id: &str, task_id: u32) -> String {
    format!("{array_id}_{task_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_job_paths() {
        assert_eq!(stdout_path(Path::new("/out"), "42"), PathBuf::from("/out/slurm_42.out"));
        assert_eq!(stderr_path(Path::new("/out"), "42"), PathBuf::from("/out/slurm_42.err"));
    }

    #[test]
    fn array_task_paths_match_spec_naming() {
        let id = array_task_id("100", 3);
        assert_eq!(id, "100_3");
        assert_eq!(stdout_path(Path::new("/out"), &id), PathBuf::from("/out/slurm_100_3.out"));
    }
}

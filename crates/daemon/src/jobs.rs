// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job definitions from `jobs.toml`.
//!
//! A bad job file is a configuration error: duplicate names, dangling
//! pre/post references, and dependency cycles are all fatal at startup,
//! never discovered mid-dispatch.

use adminq_core::{GraphError, Job, JobGraph};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobsError {
    #[error("failed to read {0}: {1}")]
    Read(String, #[source] std::io::Error),

    #[error("failed to parse jobs file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("job {job}: frequency out of range")]
    BadFrequency { job: String },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JobsFile {
    #[serde(default)]
    jobs: BTreeMap<String, JobConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JobConfig {
    #[serde(default)]
    command: Option<Vec<String>>,
    #[serde(default, with = "humantime_serde::option")]
    max_freq: Option<std::time::Duration>,
    #[serde(default)]
    pre: Vec<String>,
    #[serde(default)]
    post: Vec<String>,
    #[serde(default)]
    locks: Vec<String>,
}

/// Load and validate a job graph from a TOML file. A missing file yields
/// an empty graph (a queue-only daemon is valid).
pub fn load_jobs(path: &Path) -> Result<JobGraph, JobsError> {
    if !path.exists() {
        return Ok(JobGraph::new());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| JobsError::Read(path.display().to_string(), e))?;
    parse_jobs(&content)
}

/// Parse and validate job definitions.
pub fn parse_jobs(content: &str) -> Result<JobGraph, JobsError> {
    let file: JobsFile = toml::from_str(content)?;
    let mut graph = JobGraph::new();

    for (name, config) in file.jobs {
        let mut job = Job::new(name.clone());
        job.command = config.command;
        job.pre = config.pre;
        job.post = config.post;
        job.locks = config.locks.into_iter().collect();
        if let Some(freq) = config.max_freq {
            job.max_freq = Some(
                chrono::Duration::from_std(freq)
                    .map_err(|_| JobsError::BadFrequency { job: name.clone() })?,
            );
        }
        graph.register(job)?;
    }

    graph.validate()?;
    Ok(graph)
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;

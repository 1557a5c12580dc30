use serde::{Deserialize, Serialize};

/// Label produced by the query classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    JobSearch,
    Other,
}

impl Classification {
    pub const LABELS: [&'static str; 2] = ["job_search", "other"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
    Any,
}

impl JobType {
    pub const VALUES: [&'static str; 4] = ["full-time", "part-time", "contract", "any"];
}

/// Search parameters extracted from a single user message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub keywords: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(
        rename = "jobType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub job_type: Option<JobType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListing {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub salary: String,
    pub url: String,
}

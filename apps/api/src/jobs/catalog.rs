//! Job catalog: the fixed, read-only set of listings the lookup runs against.
//!
//! Built once at startup and shared behind an `Arc`. Nothing mutates it after construction.

use std::path::Path;

use anyhow::{Context, Result};

use crate::models::job::JobListing;

#[derive(Debug, Clone, PartialEq)]
pub struct JobCatalog {
    listings: Vec<JobListing>,
}

impl JobCatalog {
    pub fn new(listings: Vec<JobListing>) -> Self {
        Self { listings }
    }

    /// Loads listings from a JSON array of `JobListing` objects.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job catalog at {}", path.display()))?;
        let listings: Vec<JobListing> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse job catalog at {}", path.display()))?;
        Ok(Self::new(listings))
    }

    pub fn listings(&self) -> &[JobListing] {
        &self.listings
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    /// The four sample listings shipped with the service.
    pub fn builtin() -> Self {
        Self::new(vec![
            listing(
                "Senior Full Stack Engineer",
                "TechFlow Solutions",
                "San Francisco, CA (Hybrid)",
                "We're seeking an experienced full-stack engineer to join our product team. \
                 You'll work with React, Node.js, and GraphQL to build scalable features for our \
                 enterprise SaaS platform. Must have 5+ years of experience with modern JavaScript \
                 frameworks and a track record of building performant web applications.",
                "$165,000 - $195,000",
                "https://techflow.careers/jobs/senior-fullstack-123",
            ),
            listing(
                "Lead Software Engineer",
                "DataViz Inc",
                "San Francisco, CA (Remote Optional)",
                "Join our core engineering team building next-generation data visualization \
                 tools. Looking for someone with deep expertise in React, Node.js, and D3.js. \
                 You'll mentor junior developers and architect new features. Experience with \
                 real-time data processing and WebGL is a plus.",
                "$180,000 - $220,000",
                "https://dataviz.io/careers/lead-engineer-sf",
            ),
            listing(
                "Full Stack Developer",
                "FinTech Forward",
                "San Francisco, CA",
                "Fast-growing fintech startup seeking full stack developers to help build our \
                 consumer banking platform. Stack includes React, Node.js, Express, and \
                 PostgreSQL. Must have experience with financial compliance and security best \
                 practices. Knowledge of payment processing APIs preferred.",
                "$155,000 - $185,000",
                "https://fintechforward.com/jobs/fullstack-dev-2024",
            ),
            listing(
                "Senior Frontend Engineer",
                "CloudScale Systems",
                "San Francisco, CA (Hybrid)",
                "Looking for a frontend specialist with deep React expertise to join our cloud \
                 infrastructure team. You'll work on our customer-facing console and internal \
                 tools. Must have experience with state management, performance optimization, \
                 and building accessible interfaces.",
                "$160,000 - $200,000",
                "https://cloudscale.jobs/frontend-eng-sf",
            ),
        ])
    }
}

fn listing(
    title: &str,
    company: &str,
    location: &str,
    description: &str,
    salary: &str,
    url: &str,
) -> JobListing {
    JobListing {
        title: title.to_string(),
        company: company.to_string(),
        location: location.to_string(),
        description: description.to_string(),
        salary: salary.to_string(),
        url: url.to_string(),
    }
}

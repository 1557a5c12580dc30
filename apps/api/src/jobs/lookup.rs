//! Job lookup: filters the catalog with extracted `SearchParams` and renders the
//! matches as text blocks for the user message.
//!
//! Only `location` filters. `keywords` and `job_type` are carried but not matched on.

use crate::jobs::catalog::JobCatalog;
use crate::models::job::{JobListing, SearchParams};
use crate::models::message::{ContentPart, Message, Role};

/// Text block placed before the listings in an augmented message.
pub const LEAD_IN: &str = "Here are some relevant job listings I found:";

/// Returns the listings matching `params`, in catalog order.
///
/// A listing is kept unless a location was given and the listing's location
/// does not contain it (case-sensitive substring).
pub fn search_jobs<'a>(catalog: &'a JobCatalog, params: &SearchParams) -> Vec<&'a JobListing> {
    catalog
        .listings()
        .iter()
        .filter(|job| match params.location.as_deref() {
            Some(location) => job.location.contains(location),
            None => true,
        })
        .collect()
}

pub fn format_listing(job: &JobListing) -> String {
    format!(
        "Title: {}\nCompany: {}\nLocation: {}\nSalary: {}\nDescription: {}\nURL: {}",
        job.title, job.company, job.location, job.salary, job.description, job.url
    )
}

/// Builds the augmented user message: the original parts, then the lead-in,
/// then one text block per listing.
pub fn augment_message(original: &Message, jobs: &[&JobListing]) -> Message {
    let mut content = Vec::with_capacity(original.content.len() + jobs.len() + 1);
    content.extend(original.content.iter().cloned());
    content.push(ContentPart::text(LEAD_IN));
    content.extend(jobs.iter().map(|job| ContentPart::text(format_listing(job))));

    Message::new(Role::User, content)
}

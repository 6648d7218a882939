//! rxscan — demo prescription-analysis service.
//!
//! One upload endpoint drives a three-step pipeline: OCR an uploaded
//! prescription image to text, recognize drug mentions in that text, then
//! hand the drug list to a (currently stubbed) interaction-analysis service.
//! Whenever a step fails or comes back empty, the service substitutes a
//! fixed demo payload and reports the substitution via the `source` field.

pub mod config;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod staging;

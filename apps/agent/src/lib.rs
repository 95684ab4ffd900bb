//! ApplyEase page-integration engine: job-description extraction, form-field
//! classification, value injection and applied-event tracking for third-party
//! job-application pages.

pub mod agent;
pub mod backend;
pub mod classifier;
pub mod config;
pub mod dom;
pub mod errors;
pub mod extractor;
pub mod injector;
pub mod lexicon;
pub mod matcher;
pub mod models;
pub mod orchestrator;
pub mod relay;
pub mod session;
pub mod tracker;

#[cfg(test)]
mod testing;

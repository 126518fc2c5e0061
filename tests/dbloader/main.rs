//! Full-pipeline tests for the Olio loader.
//!
//! Every test drives a complete clear -> load -> post-load run through the
//! in-memory connector, so no database is needed. The connector records
//! enough bookkeeping to check commit counts, key ranges, connection
//! ownership and watermark values.

mod common;
mod failure_injection;
mod isolation;
mod pipeline;
mod report_export;

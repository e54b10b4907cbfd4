//! Outer surfaces: the HTTP API and the CSV report.

pub mod csv;
pub mod http;

//! Analysis engine.
//!
//! - `analyzer` — orchestrates one full scan: fixtures → odds → aggregation
//!   → compliance filtering → ranked results.

pub mod analyzer;

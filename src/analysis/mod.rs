//! Pass extraction, window filtering, and headway aggregation.
//!
//! This module turns a stream of matched position fixes into discrete
//! stop-pass events, restricts them to the requested time window and
//! line, and aggregates inter-vehicle headways per stop and direction.

pub mod headway;
pub mod passes;
pub mod types;
pub mod utility;
pub mod window;

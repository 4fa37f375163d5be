//! Tool parameter types and boundary helpers.

pub mod report;
pub mod types;
pub mod values;

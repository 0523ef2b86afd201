//! Utility modules: JSON/BSON conversion.
pub mod json;

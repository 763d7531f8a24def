//! Behaviour shared by model types

mod patch;

pub use patch::{merge_json, Patch};

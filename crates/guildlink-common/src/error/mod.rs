//! Error taxonomy shared by every crate

mod kind;

pub use kind::ErrorKind;

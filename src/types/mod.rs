//! Types used across the library, for the moment limited to errors.

pub mod err;

//! Cross-crate hot-reload contracts: the resolver's explicit cache, the
//! change detector's dirty keys and the error taxonomy have to agree for the
//! edit-save-rebuild loop to work. Each test here walks a seam two crates
//! share; single-crate behavior stays in each crate's own tests.
#![forbid(unsafe_code)]

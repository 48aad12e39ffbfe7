//! Thread digest library.
//!
//! Fetches recent posts from a set of accounts through an authenticated
//! session, folds self-reply threads into single records and returns a
//! time-filtered result set together with run statistics.

pub mod accounts;
pub mod config;
pub mod constants;
pub mod fetcher;
pub mod models;
pub mod source;

// src/repository/mod.rs

//! Chart repository access
//!
//! This module provides functionality for:
//! - Building authenticated transports from per-source credentials
//! - Fetching and parsing repository indexes
//! - Normalizing asset URLs listed in an index

mod client;
mod index;
mod urls;

pub use client::{Credentials, FetchClient, HTTP_TIMEOUT, HttpFetchClient, HttpResolver, TransportResolver};
pub use index::{INDEX_FILE, IndexFile, fetch_index, parse_version};
pub use urls::{clean_join, normalize_url, repository_file_url};

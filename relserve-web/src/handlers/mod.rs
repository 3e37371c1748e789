//! HTTP request handlers

pub mod releases;

pub use releases::{AllReleases, all_releases, download_release, latest_release};

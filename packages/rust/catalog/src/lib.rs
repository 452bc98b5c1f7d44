//! Catalog lookup and document transport.
//!
//! This crate provides:
//! - [`CatalogSession`]: one HTTP session shared by every lookup and download of a run
//! - [`CatalogResolver`] / [`HtmlCatalogResolver`]: document code → download URL
//! - [`DocumentFetcher`] / [`HttpDocumentFetcher`]: download URL → scratch file
//!
//! The catalog is queried exactly once per code: the detail page is fetched,
//! the download link is read from it, and nothing else is followed.

pub mod fetcher;
pub mod resolver;
pub mod session;

pub use fetcher::{DocumentFetcher, HttpDocumentFetcher, SCRATCH_EXTENSION, scratch_path};
pub use resolver::{CatalogResolver, HtmlCatalogResolver};
pub use session::{CatalogSession, SessionOptions};

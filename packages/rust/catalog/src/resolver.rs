//! Code → download location, via the catalog's item detail page.

use async_trait::async_trait;
use bundlebot_shared::{BundleError, DocumentCode, ResolvedLocation, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use crate::session::CatalogSession;

/// Maps a document code to the URL its binary content can be fetched from.
#[async_trait]
pub trait CatalogResolver: Send + Sync {
    /// Fails with [`BundleError::ResolutionFailed`] when no download
    /// location can be found for `code`.
    async fn resolve(&self, code: &DocumentCode) -> Result<ResolvedLocation>;
}

/// Resolves codes by reading the download link off the rendered detail page.
#[derive(Debug, Clone)]
pub struct HtmlCatalogResolver {
    client: Client,
    base_url: String,
    link_selector: Selector,
}

impl HtmlCatalogResolver {
    /// The detail page of a code is `base_url` followed by the code.
    ///
    /// Fails with a config error if `link_selector` is not valid CSS.
    pub fn new(session: &CatalogSession, base_url: &Url, link_selector: &str) -> Result<Self> {
        let link_selector = Selector::parse(link_selector).map_err(|e| {
            BundleError::config(format!("invalid link selector '{link_selector}': {e}"))
        })?;

        Ok(Self {
            client: session.client().clone(),
            base_url: base_url.to_string(),
            link_selector,
        })
    }

    /// Detail page URL for a code.
    pub fn detail_url(&self, code: &DocumentCode) -> Result<Url> {
        let raw = format!("{}{}", self.base_url, code.as_str().trim());
        Url::parse(&raw).map_err(|e| {
            BundleError::resolution(code.as_str(), format!("invalid detail URL '{raw}': {e}"))
        })
    }
}

#[async_trait]
impl CatalogResolver for HtmlCatalogResolver {
    #[instrument(skip_all, fields(code = %code))]
    async fn resolve(&self, code: &DocumentCode) -> Result<ResolvedLocation> {
        let detail_url = self.detail_url(code)?;
        debug!(%detail_url, "loading detail page");

        let response = self
            .client
            .get(detail_url.as_str())
            .send()
            .await
            .map_err(|e| BundleError::resolution(code.as_str(), format!("{detail_url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BundleError::resolution(
                code.as_str(),
                format!("{detail_url}: HTTP {status}"),
            ));
        }

        // Relative links resolve against the page actually served.
        let page_url = response.url().clone();
        let body = response.text().await.map_err(|e| {
            BundleError::resolution(code.as_str(), format!("{detail_url}: body read failed: {e}"))
        })?;

        let href = find_download_href(&body, &self.link_selector).ok_or_else(|| {
            BundleError::resolution(
                code.as_str(),
                format!("{detail_url}: download link not found"),
            )
        })?;

        let url = page_url.join(&href).map_err(|e| {
            BundleError::resolution(code.as_str(), format!("bad download link '{href}': {e}"))
        })?;

        debug!(%url, "download location resolved");
        Ok(ResolvedLocation {
            code: code.clone(),
            url,
        })
    }
}

/// `href` of the first element matching `selector`, if it has a non-blank one.
fn find_download_href(html: &str, selector: &Selector) -> Option<String> {
    let doc = Html::parse_document(html);

    doc.select(selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
}

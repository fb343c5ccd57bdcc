//! Data-driven site adapters and the static site registry.
//!
//! Each supported site is described by a [`SiteConfig`]: seed listing URLs,
//! a CSS selector yielding profile links, and per-field extraction
//! selectors. One [`SiteAdapter`] implementation serves every site — the
//! per-site knowledge lives entirely in the config table.

use std::collections::HashSet;
use std::sync::Arc;

use argus_core::error::AppError;
use argus_core::normalize::convert_scale;
use argus_core::proxy::ProxyEndpoint;
use argus_core::record::{FieldKey, NOT_AVAILABLE, Record};
use argus_core::traits::SourceAdapter;
use scraper::{Html, Selector};
use url::Url;

use crate::fetcher::ProxyFetcher;

/// Score range all sources are normalized onto.
const TARGET_SCORE_SCALE: (f64, f64) = (0.0, 10.0);

/// Extraction rules for one site.
pub struct SiteConfig {
    /// Stable source id, used in `Record::source` and the priority table.
    pub id: &'static str,
    /// Listing pages to expand into profile URLs.
    pub seeds: &'static [&'static str],
    /// Selector for anchor elements linking to profile pages.
    pub listing_selector: &'static str,
    /// Field extraction selectors; first match's text wins.
    pub fields: &'static [(FieldKey, &'static str)],
    /// Native range of the site's overall score, if it publishes one.
    pub score_scale: Option<(f64, f64)>,
}

static BUILTIN_SITES: [SiteConfig; 2] = [
    SiteConfig {
        id: "icodrops",
        seeds: &["https://icodrops.com/ico-stats/"],
        listing_selector: "a#ccc",
        fields: &[
            (FieldKey::Name, "div.ico-main-info h3"),
            (FieldKey::Description, "div.ico-description"),
            (FieldKey::Ticker, "span.grey + span.black"),
        ],
        score_scale: None,
    },
    SiteConfig {
        id: "trackico",
        seeds: &["https://www.trackico.io/"],
        listing_selector: "div.row.equal-height a",
        fields: &[
            (FieldKey::Name, "h1.h2"),
            (FieldKey::Description, "div.fs-14"),
            (FieldKey::OverallScore, "div.fs-60.fw-400.text-primary"),
        ],
        score_scale: Some((0.0, 5.0)),
    },
];

/// The shipped site configurations.
pub fn builtin_sites() -> &'static [SiteConfig] {
    &BUILTIN_SITES
}

/// Look up a shipped site by id.
pub fn find_site(id: &str) -> Option<&'static SiteConfig> {
    BUILTIN_SITES.iter().find(|site| site.id == id)
}

/// [`SourceAdapter`] driven by a [`SiteConfig`].
///
/// Selectors are parsed once at construction; a selector that does not
/// parse is a configuration error, not a runtime one.
#[derive(Clone)]
pub struct SiteAdapter {
    config: &'static SiteConfig,
    listing: Selector,
    fields: Arc<Vec<(FieldKey, Selector)>>,
    fetcher: ProxyFetcher,
}

impl SiteAdapter {
    pub fn new(config: &'static SiteConfig, fetcher: ProxyFetcher) -> Result<Self, AppError> {
        let listing = Selector::parse(config.listing_selector).map_err(|e| {
            AppError::Config(format!("Bad listing selector for {}: {e}", config.id))
        })?;

        let fields = config
            .fields
            .iter()
            .map(|(key, raw)| {
                Selector::parse(raw).map(|selector| (*key, selector)).map_err(|e| {
                    AppError::Config(format!("Bad selector for {}.{key}: {e}", config.id))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            listing,
            fields: Arc::new(fields),
            fetcher,
        })
    }

    /// Extract profile URLs from a listing page, resolved against `base`.
    fn parse_listing(&self, html: &str, base: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let base_url = Url::parse(base).ok();

        let mut urls = Vec::new();
        for element in document.select(&self.listing) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let absolute = base_url
                .as_ref()
                .and_then(|b| b.join(href).ok())
                .map(|u| u.to_string())
                .unwrap_or_else(|| href.to_string());
            urls.push(absolute);
        }
        urls
    }

    /// Extract a candidate record from a profile page.
    ///
    /// A field its selector cannot find is a ParseMiss: it stays sentinel
    /// and is logged, never raised.
    fn parse_profile(&self, html: &str, url: &str) -> Record {
        let document = Html::parse_document(html);
        let mut record = Record::new(self.config.id);
        record.set(FieldKey::ProfileUrl, url);

        for (key, selector) in self.fields.iter() {
            let Some(element) = document.select(selector).next() else {
                tracing::warn!(source = self.config.id, url, field = %key, "Could not find field");
                continue;
            };
            let text = element.text().collect::<String>().trim().to_string();
            if text.is_empty() {
                tracing::warn!(source = self.config.id, url, field = %key, "Field matched but empty");
                continue;
            }

            let value = if *key == FieldKey::OverallScore
                && let Some(native) = self.config.score_scale
            {
                convert_scale(&text, native, TARGET_SCORE_SCALE, true, NOT_AVAILABLE)
            } else {
                text
            };
            record.set(*key, value);
        }

        record
    }
}

impl SourceAdapter for SiteAdapter {
    fn source_id(&self) -> &str {
        self.config.id
    }

    async fn list_pages(&self, proxy: &ProxyEndpoint) -> Result<Vec<String>, AppError> {
        let mut urls = Vec::new();
        for seed in self.config.seeds {
            let html = self.fetcher.get(seed, proxy).await?;
            urls.extend(self.parse_listing(&html, seed));
        }

        let mut seen = HashSet::new();
        urls.retain(|url| seen.insert(url.clone()));
        Ok(urls)
    }

    async fn fetch_profile(&self, url: &str, proxy: &ProxyEndpoint) -> Result<Record, AppError> {
        let html = self.fetcher.get(url, proxy).await?;
        Ok(self.parse_profile(&html, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(id: &str) -> SiteAdapter {
        SiteAdapter::new(find_site(id).unwrap(), ProxyFetcher::new()).unwrap()
    }

    #[test]
    fn every_builtin_site_constructs() {
        for site in builtin_sites() {
            SiteAdapter::new(site, ProxyFetcher::new()).unwrap();
        }
    }

    #[test]
    fn find_site_by_id() {
        assert!(find_site("icodrops").is_some());
        assert!(find_site("nonexistent").is_none());
    }

    #[test]
    fn listing_resolves_relative_links() {
        let html = r##"
            <html><body>
                <a id="ccc" href="/foo-campaign/">Foo</a>
                <a id="ccc" href="https://other.example/bar/">Bar</a>
                <a href="/not-a-listing/">skip</a>
            </body></html>"##;

        let urls = adapter("icodrops").parse_listing(html, "https://icodrops.com/ico-stats/");
        assert_eq!(
            urls,
            vec![
                "https://icodrops.com/foo-campaign/".to_string(),
                "https://other.example/bar/".to_string(),
            ]
        );
    }

    #[test]
    fn profile_extracts_configured_fields() {
        let html = r#"
            <html><body>
                <div class="ico-main-info"><h3>Foo Campaign</h3></div>
                <div class="ico-description">A decentralized foo.</div>
            </body></html>"#;

        let record = adapter("icodrops").parse_profile(html, "https://icodrops.com/foo/");
        assert_eq!(record.source, "icodrops");
        assert_eq!(record.get(FieldKey::Name), "Foo Campaign");
        assert_eq!(record.get(FieldKey::Description), "A decentralized foo.");
        assert_eq!(record.get(FieldKey::ProfileUrl), "https://icodrops.com/foo/");
        // ParseMiss: configured but absent fields stay sentinel
        assert_eq!(record.get(FieldKey::Ticker), NOT_AVAILABLE);
    }

    #[test]
    fn profile_scales_native_scores() {
        let html = r#"
            <html><body>
                <h1 class="h2">Bar Campaign</h1>
                <div class="fs-60 fw-400 text-primary">4.2</div>
            </body></html>"#;

        let record = adapter("trackico").parse_profile(html, "https://www.trackico.io/bar/");
        // native 0-5 mapped onto 0-10
        assert_eq!(record.get(FieldKey::OverallScore), "8.4");
    }

    #[test]
    fn unparsable_score_stays_sentinel() {
        let html = r#"
            <html><body>
                <h1 class="h2">Bar Campaign</h1>
                <div class="fs-60 fw-400 text-primary">coming soon</div>
            </body></html>"#;

        let record = adapter("trackico").parse_profile(html, "https://www.trackico.io/bar/");
        assert_eq!(record.get(FieldKey::OverallScore), NOT_AVAILABLE);
    }
}

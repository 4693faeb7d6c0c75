// src/fetch/mod.rs
//! Sheet Loader: share URL → CSV export → cached body → resolved table.

pub mod cache;
pub mod urls;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::{info, instrument, warn};

pub use self::cache::SheetCache;
pub use self::urls::sheet_csv_url;
pub use crate::error::{LoadError, LoadResult};

use crate::schema::{Resolution, RoleSpec};
use crate::table::{parse_csv, SheetTable};

/// Anything that can hand back the raw CSV text behind an export URL.
#[async_trait]
pub trait SheetSource: Send + Sync {
    async fn fetch(&self, url: &str) -> LoadResult<String>;
}

/// Fetches over HTTPS with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> LoadResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| LoadError::Http {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SheetSource for HttpSource {
    async fn fetch(&self, url: &str) -> LoadResult<String> {
        let http = |source| LoadError::Http {
            url: url.to_string(),
            source,
        };

        let resp = self.client.get(url).send().await.map_err(http)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let is_html = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("text/html"));
        if is_html {
            return Err(LoadError::NotCsv {
                url: url.to_string(),
            });
        }

        resp.text().await.map_err(http)
    }
}

/// Serves fixed bodies from memory; used by tests and offline demos.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    bodies: HashMap<String, String>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `body` under the export URL that `share_url` rewrites to.
    pub fn with_sheet(mut self, share_url: &str, body: impl Into<String>) -> LoadResult<Self> {
        self.bodies.insert(sheet_csv_url(share_url)?, body.into());
        Ok(self)
    }
}

#[async_trait]
impl SheetSource for StaticSource {
    async fn fetch(&self, url: &str) -> LoadResult<String> {
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| LoadError::Source(format!("no sheet registered for {url}")))
    }
}

/// One successful load: the table under normalized names and how its roles resolved.
#[derive(Debug, Clone)]
pub struct LoadedSheet {
    pub url: String,
    pub table: SheetTable,
    pub resolution: Resolution,
}

/// Source plus cache. Cheap to clone; share one per process.
#[derive(Clone)]
pub struct SheetLoader {
    source: Arc<dyn SheetSource>,
    cache: Arc<SheetCache>,
}

impl SheetLoader {
    pub fn new(source: Arc<dyn SheetSource>, cache: Arc<SheetCache>) -> Self {
        Self { source, cache }
    }

    /// HTTP-backed loader with the given timeout and cache window.
    pub fn http(timeout: Duration, ttl: Duration) -> LoadResult<Self> {
        Ok(Self::new(
            Arc::new(HttpSource::new(timeout)?),
            Arc::new(SheetCache::new(ttl)),
        ))
    }

    pub fn cache(&self) -> &SheetCache {
        &self.cache
    }

    /// Fetch (through the cache), parse and resolve a sheet.
    #[instrument(skip(self, specs), fields(roles = specs.len()))]
    pub async fn load(&self, share_url: &str, specs: &[RoleSpec]) -> LoadResult<LoadedSheet> {
        let url = sheet_csv_url(share_url)?;
        let source = Arc::clone(&self.source);
        let fetch_url = url.clone();
        let body = self
            .cache
            .get_or_fetch(&url, || async move { source.fetch(&fetch_url).await })
            .await
            .inspect_err(|e| warn!(error = %e, "sheet fetch failed"))?;

        let raw = parse_csv(&body).map_err(|e| match e {
            LoadError::NotCsv { .. } => LoadError::NotCsv { url: url.clone() },
            other => other,
        })?;
        let (table, resolution) = SheetTable::from_raw(&raw, specs)?;

        info!(
            url = %url,
            rows = table.num_rows(),
            columns = resolution.headers.len(),
            resolved = resolution.columns.len(),
            collisions = resolution.collisions.len(),
            "sheet loaded"
        );
        Ok(LoadedSheet {
            url,
            table,
            resolution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Role;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SHARE: &str = "https://docs.google.com/spreadsheets/d/abc123/edit?usp=sharing";

    struct Counting {
        inner: StaticSource,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SheetSource for Counting {
        async fn fetch(&self, url: &str) -> LoadResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(url).await
        }
    }

    fn loader(source: Arc<dyn SheetSource>) -> SheetLoader {
        SheetLoader::new(source, Arc::new(SheetCache::new(Duration::from_secs(600))))
    }

    #[tokio::test]
    async fn loads_and_resolves() -> anyhow::Result<()> {
        let src = StaticSource::new().with_sheet(SHARE, "Bairro,Sexo\nCentro,F\nCamela,M\n")?;
        let sheet = loader(Arc::new(src))
            .load(SHARE, &[RoleSpec::exact(Role::Sex, &["SEXO"])])
            .await?;
        assert_eq!(sheet.table.num_rows(), 2);
        assert_eq!(sheet.resolution.columns.get(Role::Sex), Some("SEXO"));
        assert!(sheet.url.ends_with("/abc123/export?format=csv"));
        Ok(())
    }

    #[tokio::test]
    async fn second_load_hits_cache() -> anyhow::Result<()> {
        let counting = Arc::new(Counting {
            inner: StaticSource::new().with_sheet(SHARE, "A\n1\n")?,
            calls: AtomicUsize::new(0),
        });
        let loader = loader(counting.clone());
        loader.load(SHARE, &[]).await?;
        loader.load(SHARE, &[]).await?;
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn load_errors_are_typed() -> anyhow::Result<()> {
        let src = StaticSource::new().with_sheet(SHARE, "<html>sign in</html>")?;
        let loader = loader(Arc::new(src));

        let err = loader.load("not a sheet", &[]).await;
        assert!(matches!(err, Err(LoadError::InvalidUrl(_))));

        let err = loader.load(SHARE, &[]).await;
        assert!(matches!(err, Err(LoadError::NotCsv { url }) if url.contains("abc123")));

        let err = loader
            .load("https://docs.google.com/spreadsheets/d/other/edit", &[])
            .await;
        assert!(matches!(err, Err(LoadError::Source(_))));
        Ok(())
    }
}

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};

use crate::domain;
use crate::error::{PipelineError, Result};

/// Status, lowercased content type and (for full fetches) the body bytes.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Page {
    pub fn content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or("")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_html(&self) -> bool {
        self.content_type().contains("html")
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type().contains("pdf")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Outbound page retrieval used by the crawling stages.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Existence check; the returned page has no body.
    async fn probe(&self, url: &str) -> Result<Page>;

    /// Full GET with redirects followed.
    async fn get(&self, url: &str) -> Result<Page>;
}

pub struct FetchOptions {
    pub user_agent: String,
    pub probe_timeout: Duration,
    pub fetch_timeout: Duration,
    /// Minimum spacing between two requests to the same host.
    pub per_host_delay: Duration,
}

/// reqwest-backed [`Fetch`] with a per-host politeness limiter.
pub struct HttpFetcher {
    client: Client,
    politeness: Option<DefaultKeyedRateLimiter<String>>,
    probe_timeout: Duration,
    fetch_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(opts: FetchOptions) -> Result<Self> {
        let client = Client::builder().user_agent(opts.user_agent).build()?;
        let politeness = Quota::with_period(opts.per_host_delay)
            .map(|q| RateLimiter::keyed(q.allow_burst(NonZeroU32::MIN)));
        Ok(Self {
            client,
            politeness,
            probe_timeout: opts.probe_timeout,
            fetch_timeout: opts.fetch_timeout,
        })
    }

    async fn wait_turn(&self, url: &str) -> Result<()> {
        let host = domain::host_of(url).ok_or_else(|| PipelineError::InvalidUrl(url.to_string()))?;
        if let Some(limiter) = &self.politeness {
            limiter.until_key_ready(&host).await;
        }
        Ok(())
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn probe(&self, url: &str) -> Result<Page> {
        self.wait_turn(url).await?;
        let head = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map(|r| headers_only(&r))
            .map_err(PipelineError::from);

        if !needs_get_fallback(&head) {
            return head;
        }
        self.wait_turn(url).await?;
        let resp = self
            .client
            .get(url)
            .timeout(self.probe_timeout + Duration::from_secs(5))
            .send()
            .await?;
        Ok(headers_only(&resp))
    }

    async fn get(&self, url: &str) -> Result<Page> {
        self.wait_turn(url).await?;
        let resp = self
            .client
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await?;
        let mut page = headers_only(&resp);
        page.body = resp.bytes().await?.to_vec();
        Ok(page)
    }
}

/// Some servers refuse HEAD or omit the content type on it; those probes are
/// retried as a GET.
fn needs_get_fallback(head: &Result<Page>) -> bool {
    match head {
        Ok(page) => page.status >= 400 || page.content_type.is_none(),
        Err(_) => true,
    }
}

fn headers_only(resp: &Response) -> Page {
    Page {
        status: resp.status().as_u16(),
        content_type: resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase),
        body: Vec::new(),
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory [`Fetch`] that records every URL it is asked for.
    #[derive(Default)]
    pub struct FakeFetcher {
        pages: HashMap<String, Page>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn with(mut self, url: &str, status: u16, content_type: &str, body: &str) -> Self {
            self.pages.insert(
                url.to_string(),
                Page {
                    status,
                    content_type: Some(content_type.to_string()).filter(|c| !c.is_empty()),
                    body: body.as_bytes().to_vec(),
                },
            );
            self
        }

        pub fn called(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn lookup(&self, url: &str) -> Result<Page> {
            self.calls.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| PipelineError::InvalidUrl(format!("unreachable: {}", url)))
        }
    }

    #[async_trait]
    impl Fetch for FakeFetcher {
        async fn probe(&self, url: &str) -> Result<Page> {
            let mut page = self.lookup(url)?;
            page.body.clear();
            Ok(page)
        }

        async fn get(&self, url: &str) -> Result<Page> {
            self.lookup(url)
        }
    }
}

use std::io::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use flate2::read::GzDecoder;
use futures::future::BoxFuture;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};

use crate::config::CrawlerConfig;
use crate::error::FetchError;
use crate::selector::Selector;

/// Turns a URL into a raw HTML or XML document.
///
/// `selectors` are those of the running task, a fetcher is free to ignore them.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        selectors: &'a [Selector],
    ) -> BoxFuture<'a, Result<String, FetchError>>;
}

impl<T> Fetcher for Arc<T>
where
    T: Fetcher + ?Sized,
{
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        selectors: &'a [Selector],
    ) -> BoxFuture<'a, Result<String, FetchError>> {
        (**self).fetch(url, selectors)
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::ClientBuilder::new().gzip(true).deflate(true);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            user_agent: config.user_agent.clone(),
        })
    }

    async fn download(&self, url: &str) -> Result<String, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(transport)?;

        if !resp.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let page = match resp.headers().get(CONTENT_TYPE) {
            Some(c) if c == "application/x-gzip" || c == "application/gzip" => {
                let compressed = resp.bytes().await.map_err(transport)?;
                let mut gz = GzDecoder::new(&compressed[..]);
                let mut page = String::new();
                gz.read_to_string(&mut page)
                    .map_err(|source| FetchError::Decompress {
                        url: url.to_string(),
                        source,
                    })?;
                page
            }
            _ => resp.text().await.map_err(transport)?,
        };

        Ok(page)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        _selectors: &'a [Selector],
    ) -> BoxFuture<'a, Result<String, FetchError>> {
        Box::pin(self.download(url))
    }
}

use async_trait::async_trait;
use mapwatch_common::{MapwatchError, Result};
use mapwatch_http::{HttpClient, RequestOpts};

/// Where listing pages come from.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the full HTML of one server page.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// [`PageSource`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpPageSource {
    client: HttpClient,
}

impl HttpPageSource {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.client
            .get_text(url, RequestOpts::default())
            .await
            .map_err(|e| MapwatchError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

//! HTTP-backed [`WebSurface`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use courseware_shared::{CoursewareError, Result};

use crate::helper::{AuthChallengeDisposition, ChallengeHandler, LoadedPage, WebSurface};

/// User-Agent string for page requests.
const USER_AGENT: &str = concat!("Courseware/", env!("CARGO_PKG_VERSION"));

/// Loads pages over HTTP and answers `401` challenges with basic auth.
pub struct HttpSurface {
    client: Client,
}

impl HttpSurface {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CoursewareError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn send(&self, url: &Url, credential: Option<(&str, &str)>) -> Result<Response> {
        let mut request = self.client.get(url.as_str());
        if let Some((username, password)) = credential {
            request = request.basic_auth(username, Some(password));
        }
        request
            .send()
            .await
            .map_err(|e| CoursewareError::Network(format!("{url}: {e}")))
    }
}

#[async_trait]
impl WebSurface for HttpSurface {
    #[instrument(skip_all, fields(%url))]
    async fn load(&self, url: &Url, challenges: Arc<dyn ChallengeHandler>) -> Result<LoadedPage> {
        let mut response = self.send(url, None).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let host = url.host_str().unwrap_or_default().to_string();
            match challenges.respond(&host) {
                AuthChallengeDisposition::UseCredential(credential) => {
                    debug!(host, "retrying with credential");
                    response = self
                        .send(url, Some((&credential.username, &credential.password)))
                        .await?;
                    if response.status() == StatusCode::UNAUTHORIZED {
                        warn!(host, "credential rejected");
                        return Err(CoursewareError::Credential { host });
                    }
                }
                AuthChallengeDisposition::PerformDefaultHandling => {
                    debug!(host, "no credential for challenge");
                }
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(CoursewareError::Network(format!("{url}: HTTP {status}")));
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| CoursewareError::Network(format!("{url}: body read failed: {e}")))?;

        Ok(LoadedPage {
            url: final_url,
            status: status.as_u16(),
            title: extract_title(&body),
            body_len: body.len(),
        })
    }
}

fn extract_title(body: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    let selector = Selector::parse("title").ok()?;
    doc.select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

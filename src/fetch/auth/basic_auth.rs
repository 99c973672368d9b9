use crate::fetch::basic::BasicClient;
use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::RequestBuilder;

/// An [`HttpClient`] wrapper that adds an HTTP Basic `Authorization` header.
///
/// WiGLE issues an API name / API token pair which is sent as the Basic
/// username and password on every request.
pub struct BasicAuth<C> {
    pub inner: C,
    pub username: String,
    pub password: String,
    builder: reqwest::Client,
}

impl BasicAuth<BasicClient> {
    pub fn wrap(inner: BasicClient, username: String, password: String) -> Self {
        let builder = inner.inner().clone();
        Self {
            inner,
            username,
            password,
            builder,
        }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for BasicAuth<C> {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let req = RequestBuilder::from_parts(self.builder.clone(), req)
            .basic_auth(&self.username, Some(&self.password))
            .build()?;
        self.inner.execute(req).await
    }
}

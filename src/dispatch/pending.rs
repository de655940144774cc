use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;

use crate::errors::Error;

/// A request kept in replayable form so it can be sent again with a new token.
#[derive(Clone, Debug)]
pub struct PendingRequest {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    retried: bool,
}

impl PendingRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, Error> {
        self.body = Some(serde_json::to_vec(body)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether this request has already used its single replay.
    pub fn retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// Headers to send, with `Authorization: Bearer <token>` when a token is present.
    pub fn authorized_headers(&self, access_token: Option<&str>) -> Result<HeaderMap, Error> {
        let mut headers = self.headers.clone();
        if let Some(token) = access_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                Error::InvalidHeader("stored access token cannot be sent as a bearer token".into())
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    pub(crate) fn decorate(
        &self,
        client: &Client,
        access_token: Option<&str>,
    ) -> Result<RequestBuilder, Error> {
        let mut builder = client
            .request(self.method.clone(), &self.url)
            .headers(self.authorized_headers(access_token)?);
        if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }
        Ok(builder)
    }
}

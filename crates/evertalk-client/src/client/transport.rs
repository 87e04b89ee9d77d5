use super::config::Config;
use crate::error::TransportError;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use std::sync::Arc;

/// Which of the two configured clients carries a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// No credentials attached.
    Public,
    /// Session cookies attached and stored.
    Private,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<FormField>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Body,
}

impl ApiRequest {
    fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            body: Body::Empty,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: &str) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn with_json<T: serde::Serialize>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = Body::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn with_form(mut self, fields: Vec<FormField>) -> Self {
        self.body = Body::Multipart(fields);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Moves one request to the backend and returns whatever status came back.
/// Status handling lives in [`crate::ApiClient`], so this is the seam tests
/// replace.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        audience: Audience,
        request: ApiRequest,
    ) -> Result<ApiResponse, TransportError>;
}

pub struct ReqwestTransport {
    base_url: String,
    public: reqwest::Client,
    private: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let jar = Arc::new(reqwest::cookie::Jar::default());
        let public = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        let private = reqwest::Client::builder()
            .timeout(config.timeout())
            .cookie_provider(jar)
            .build()?;
        Ok(Self {
            base_url: config.base_url().to_string(),
            public,
            private,
        })
    }
}

fn build_form(fields: Vec<FormField>) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for field in fields {
        form = match field {
            FormField::Text { name, value } => form.text(name, value),
            FormField::File {
                name,
                file_name,
                mime_type,
                bytes,
            } => {
                let part = Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&mime_type)
                    .map_err(|e| {
                        TransportError::InvalidRequest(format!("bad mime type {mime_type}: {e}"))
                    })?;
                form.part(name, part)
            }
        };
    }
    Ok(form)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        audience: Audience,
        request: ApiRequest,
    ) -> Result<ApiResponse, TransportError> {
        let client = match audience {
            Audience::Public => &self.public,
            Audience::Private => &self.private,
        };
        let url = format!("{}{}", self.base_url, request.path);
        tracing::debug!("{} {} ({:?})", request.method, url, audience);

        let builder = client.request(request.method, &url);
        let builder = match request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::Multipart(fields) => builder.multipart(build_form(fields)?),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        tracing::debug!("{} -> {}", url, status);
        Ok(ApiResponse { status, body })
    }
}

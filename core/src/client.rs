//! Stateless HTTP request builder and response parser for the estimator API.
//!
//! # Design
//! `ApiClient` holds only the base URL and the session key, and carries no
//! mutable state between calls. Each operation is split into a `build_*`
//! method that produces an `HttpRequest` and a `parse_*` method that consumes
//! an `HttpResponse`. The resource operations are generic over [`Resource`],
//! so building types, materials and projects share one mapping from call to
//! verb + path.
//!
//! The bearer token is not baked in at build time. [`ApiClient::authorize`]
//! stamps it onto a request just before the request leaves the app.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::resource::{CacheKey, Resource};
use crate::session::SessionStore;
use crate::types::{AuthResponse, Credentials, Id, Project, Registration};

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    session_key: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session_key: config.session_key.clone(),
        }
    }

    /// Build a request for `path` (relative to the base URL, leading slash).
    pub fn request(&self, method: HttpMethod, path: &str, body: Option<String>) -> HttpRequest {
        let mut headers = Vec::new();
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        debug!(method = method.as_str(), path, "building request");
        HttpRequest {
            method,
            path: format!("{}{path}", self.base_url),
            headers,
            body,
        }
    }

    /// Build a request with `body` serialized as JSON.
    pub fn json_request<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &B,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(body).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(self.request(method, path, Some(body)))
    }

    /// Attach `authorization: Bearer <token>` when the session holds a token.
    /// Any authorization header already on the request is replaced.
    pub fn authorize<S: SessionStore + ?Sized>(&self, request: &mut HttpRequest, session: &S) {
        request
            .headers
            .retain(|(k, _)| !k.eq_ignore_ascii_case("authorization"));
        if let Some(token) = session.load(&self.session_key).filter(|t| !t.is_empty()) {
            request
                .headers
                .push(("authorization".to_string(), format!("Bearer {token}")));
        }
    }

    // -- resource requests --------------------------------------------------

    pub fn build_list_key(&self, key: CacheKey) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/{}", key.path()), None)
    }

    pub fn build_list<R: Resource>(&self) -> HttpRequest {
        self.build_list_key(R::KEY)
    }

    pub fn build_get<R: Resource>(&self, id: &Id) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/{}/{id}", R::KEY.path()), None)
    }

    pub fn build_create<R: Resource>(&self, draft: &R::Draft) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, &format!("/{}", R::KEY.path()), draft)
    }

    pub fn build_update<R: Resource>(&self, id: &Id, draft: &R::Draft) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Put, &format!("/{}/{id}", R::KEY.path()), draft)
    }

    pub fn build_delete<R: Resource>(&self, id: &Id) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("/{}/{id}", R::KEY.path()), None)
    }

    /// `POST /projects/{id}/estimate` with an empty body.
    pub fn build_estimate(&self, id: &Id) -> HttpRequest {
        self.request(HttpMethod::Post, &format!("/projects/{id}/estimate"), None)
    }

    pub fn build_login(&self, credentials: &Credentials) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/auth/login", credentials)
    }

    pub fn build_register(&self, registration: &Registration) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/auth/register", registration)
    }

    // -- response parsing ---------------------------------------------------

    pub fn parse_list<R: Resource>(&self, response: HttpResponse) -> Result<Vec<R>, ApiError> {
        parse_json(response)
    }

    /// Parses the record returned by get, create and update.
    pub fn parse_record<R: Resource>(&self, response: HttpResponse) -> Result<R, ApiError> {
        parse_json(response)
    }

    pub fn parse_delete(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_estimate(&self, response: HttpResponse) -> Result<Project, ApiError> {
        parse_json(response)
    }

    pub fn parse_auth(&self, response: HttpResponse) -> Result<AuthResponse, ApiError> {
        parse_json(response)
    }
}

/// Map non-2xx status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}

fn parse_json<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    check_status(&response)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/*
 * Responsibility
 * - Per-request state handed to endpoint handlers (one instance per inbound call)
 * - Resolved identity (set by the pipeline once authenticated)
 * - Queued response effects / headers, applied by the pipeline after the handler returns
 *
 * Notes
 * - Handlers never touch the response object directly; they queue operations here.
 * - Dropping the context (error, client gone) drops the queue: nothing is half-applied.
 */
use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::services::auth::{AuthError, Identity};

/// Response operation queued by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyEffect {
    /// Replace the response status (default 200).
    Status(StatusCode),
    /// Append a header value, keeping earlier values of the same header (e.g. `Set-Cookie`).
    AppendHeader(HeaderName, HeaderValue),
}

/// Cookie to set on the response. Always `HttpOnly; Secure; SameSite=Strict`.
#[derive(Debug, Clone)]
pub struct ReplyCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub max_age_seconds: Option<u64>,
}

impl ReplyCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            max_age_seconds: None,
        }
    }

    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age_seconds = Some(seconds);
        self
    }

    fn header_value(&self) -> Result<HeaderValue, AppError> {
        if self.name.is_empty() || !self.name.bytes().all(is_token_char) {
            tracing::error!(name = %self.name, "refusing cookie with invalid name");
            return Err(AppError::Internal);
        }
        if !self.value.bytes().all(is_cookie_octet) {
            tracing::error!(name = %self.name, "refusing cookie with invalid value");
            return Err(AppError::Internal);
        }
        if self.path.bytes().any(|b| b == b';' || b.is_ascii_control() || !b.is_ascii()) {
            tracing::error!(name = %self.name, "refusing cookie with invalid path");
            return Err(AppError::Internal);
        }

        let mut cookie = format!(
            "{}={}; Path={}; HttpOnly; Secure; SameSite=Strict",
            self.name, self.value, self.path
        );
        if let Some(max_age) = self.max_age_seconds {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }

        HeaderValue::from_str(&cookie).map_err(|_| AppError::Internal)
    }
}

// RFC 6265 cookie-name (an RFC 2616 token).
fn is_token_char(b: u8) -> bool {
    b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
}

// RFC 6265 cookie-octet: visible ASCII minus DQUOTE, comma, semicolon and backslash.
fn is_cookie_octet(b: u8) -> bool {
    b.is_ascii_graphic() && !matches!(b, b'"' | b',' | b';' | b'\\')
}

#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    path_params: HashMap<String, String>,
    body: Bytes,

    identity: Option<Identity>,

    effects: Vec<ReplyEffect>,
    reply_headers: Vec<(HeaderName, HeaderValue)>,
}

impl RequestContext {
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        path_params: HashMap<String, String>,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            path_params,
            body,
            identity: None,
            effects: Vec::new(),
            reply_headers: Vec::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decode the buffered body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| AppError::InvalidRequest(format!("invalid json body: {e}")))
    }

    // --- identity -------------------------------------------------------

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    pub fn require_identity(&self) -> Result<&Identity, AuthError> {
        self.identity.as_ref().ok_or(AuthError::Unauthenticated)
    }

    // --- deferred response operations -----------------------------------

    pub fn push_effect(&mut self, effect: ReplyEffect) {
        self.effects.push(effect);
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.push_effect(ReplyEffect::Status(status));
    }

    pub fn set_cookie(&mut self, cookie: ReplyCookie) -> Result<(), AppError> {
        let value = cookie.header_value()?;
        self.push_effect(ReplyEffect::AppendHeader(header::SET_COOKIE, value));
        Ok(())
    }

    pub fn remove_cookie(&mut self, name: &str) -> Result<(), AppError> {
        self.set_cookie(ReplyCookie::new(name, "").max_age(0))
    }

    /// Queue a response header. A later header with the same name replaces an earlier one.
    pub fn reply_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.reply_headers.push((name, value));
    }

    pub fn effects(&self) -> &[ReplyEffect] {
        &self.effects
    }

    pub fn reply_headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.reply_headers
    }

    /// Serialize `body`, then apply queued effects, then queued headers, each in queue order.
    pub fn into_response(self, body: serde_json::Value) -> Response {
        let mut res = (StatusCode::OK, Json(body)).into_response();

        for effect in self.effects {
            match effect {
                ReplyEffect::Status(status) => *res.status_mut() = status,
                ReplyEffect::AppendHeader(name, value) => {
                    res.headers_mut().append(name, value);
                }
            }
        }

        for (name, value) in self.reply_headers {
            res.headers_mut().insert(name, value);
        }

        res
    }
}

//! Request field extraction shared by the form-style endpoints.
//!
//! Fields come from a urlencoded or multipart body, on top of the query
//! string. Any other body is kept as text so callers that want "the message"
//! can fall back to it, which makes `curl --data-binary @template.txt` work.

use std::collections::HashMap;

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequest, Multipart, Query, Request},
    http::header::CONTENT_TYPE,
    Form,
};
use tracing::debug;

use crate::errors::AppError;

pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct FormFields {
    fields: HashMap<String, String>,
    /// Only kept for non-form bodies; form bytes are never a message.
    raw_body: String,
}

impl FormFields {
    #[cfg(test)]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            raw_body: String::new(),
        }
    }

    /// Non-empty value of a field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// The `message` field, or the raw body when the field is absent.
    pub fn message(&self) -> Option<String> {
        match self.get("message") {
            Some(message) => Some(message.to_string()),
            None if !self.raw_body.is_empty() => Some(self.raw_body.clone()),
            None => None,
        }
    }
}

#[async_trait]
impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| AppError::Validation(format!("failed to read request body: {e}")))?;

        let mut fields = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(query)| query)
            .unwrap_or_default();

        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let request = Request::from_parts(parts, Body::from(bytes));
            let mut multipart = Multipart::from_request(request, state)
                .await
                .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?;

            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
            {
                let Some(name) = field.name().map(str::to_owned) else {
                    continue;
                };
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("invalid multipart field '{name}': {e}")))?;
                fields.insert(name, value);
            }

            return Ok(Self {
                fields,
                raw_body: String::new(),
            });
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let request = Request::from_parts(parts, Body::from(bytes));
            match Form::<HashMap<String, String>>::from_request(request, state).await {
                Ok(Form(form)) => fields.extend(form),
                Err(e) => debug!("ignoring undecodable form body: {e}"),
            }
            return Ok(Self {
                fields,
                raw_body: String::new(),
            });
        }

        Ok(Self {
            fields,
            raw_body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

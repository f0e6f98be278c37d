use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, Method, Uri};

use crate::error::IssueError;

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormEncoding {
    UrlEncoded,
    Multipart,
}

/// Classify the request's content type. Parameters (charset, boundary) are ignored.
pub fn form_encoding(headers: &HeaderMap) -> Option<FormEncoding> {
    let value = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let media_type = value.split(';').next().unwrap_or_default().trim();
    if media_type.eq_ignore_ascii_case(FORM_URLENCODED) {
        Some(FormEncoding::UrlEncoded)
    } else if media_type.eq_ignore_ascii_case(MULTIPART_FORM_DATA) {
        Some(FormEncoding::Multipart)
    } else {
        None
    }
}

/// Submitted form fields in the order they were received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    fields: Vec<(String, String)>,
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value submitted for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// The inbound request as seen by claims providers and augmenters.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    form: FormFields,
}

impl TokenRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, form: FormFields) -> Self {
        Self {
            method,
            uri,
            headers,
            form,
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

    pub fn form(&self) -> &FormFields {
        &self.form
    }

    /// Buffer the body (bounded by `limit`) and decode it as a form.
    pub(crate) async fn read(
        request: Request,
        encoding: FormEncoding,
        limit: usize,
    ) -> Result<Self, IssueError> {
        let (parts, body) = request.into_parts();
        let bytes = to_bytes(body, limit)
            .await
            .map_err(|err| IssueError::InvalidForm(format!("Unable to read form body: {err}")))?;

        let form = match encoding {
            FormEncoding::UrlEncoded => parse_urlencoded(&bytes)?,
            FormEncoding::Multipart => {
                parse_multipart(parts.headers.get(CONTENT_TYPE).cloned(), bytes).await?
            }
        };

        Ok(Self::new(parts.method, parts.uri, parts.headers, form))
    }
}

fn parse_urlencoded(bytes: &[u8]) -> Result<FormFields, IssueError> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(bytes)
        .map(|fields| FormFields { fields })
        .map_err(|err| IssueError::InvalidForm(format!("Invalid form body: {err}")))
}

async fn parse_multipart(
    content_type: Option<HeaderValue>,
    bytes: Bytes,
) -> Result<FormFields, IssueError> {
    let mut builder = Request::builder().method(Method::POST);
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    let request = builder
        .body(Body::from(bytes))
        .map_err(|err| IssueError::InvalidForm(format!("Invalid multipart body: {err}")))?;

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| IssueError::InvalidForm(format!("Invalid multipart body: {rejection}")))?;

    let mut fields = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| IssueError::InvalidForm(format!("Invalid multipart body: {err}")))?
    {
        // File uploads are not form values.
        if field.file_name().is_some() {
            continue;
        }
        let name = field.name().unwrap_or_default().to_string();
        let value = field
            .text()
            .await
            .map_err(|err| IssueError::InvalidForm(format!("Invalid multipart field '{name}': {err}")))?;
        fields.push((name, value));
    }

    Ok(FormFields { fields })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(content_type: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers
    }

    #[test]
    fn form_encoding_ignores_case_and_parameters() {
        assert_eq!(
            form_encoding(&headers_with("application/x-www-form-urlencoded; charset=UTF-8")),
            Some(FormEncoding::UrlEncoded)
        );
        assert_eq!(
            form_encoding(&headers_with("Multipart/Form-Data; boundary=abc")),
            Some(FormEncoding::Multipart)
        );
        assert_eq!(form_encoding(&headers_with("application/json")), None);
        assert_eq!(form_encoding(&HeaderMap::new()), None);
    }

    #[test]
    fn form_fields_lookup_preserves_order() {
        let form: FormFields = vec![("scope", "a"), ("username", "test"), ("scope", "b")]
            .into_iter()
            .collect();
        assert_eq!(form.get("username"), Some("test"));
        assert_eq!(form.get_all("scope").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(form.get("password"), None);
        assert_eq!(form.len(), 3);
    }

    #[tokio::test]
    async fn read_parses_urlencoded_body() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/token")
            .header(CONTENT_TYPE, FORM_URLENCODED)
            .body(Body::from("username=te%20st&password=p%26w"))
            .unwrap();
        let parsed = TokenRequest::read(request, FormEncoding::UrlEncoded, 1024)
            .await
            .expect("form parsed");
        assert_eq!(parsed.form().get("username"), Some("te st"));
        assert_eq!(parsed.form().get("password"), Some("p&w"));
        assert_eq!(parsed.uri().path(), "/token");
    }

    #[tokio::test]
    async fn read_parses_multipart_text_fields_and_skips_files() {
        let body = "--XyZ\r\n\
                    Content-Disposition: form-data; name=\"username\"\r\n\r\n\
                    test\r\n\
                    --XyZ\r\n\
                    Content-Disposition: form-data; name=\"avatar\"; filename=\"a.png\"\r\n\
                    Content-Type: image/png\r\n\r\n\
                    PNG\r\n\
                    --XyZ\r\n\
                    Content-Disposition: form-data; name=\"password\"\r\n\r\n\
                    secret\r\n\
                    --XyZ--\r\n";
        let request = Request::builder()
            .method(Method::POST)
            .uri("/token")
            .header(CONTENT_TYPE, "multipart/form-data; boundary=XyZ")
            .body(Body::from(body))
            .unwrap();
        let parsed = TokenRequest::read(request, FormEncoding::Multipart, 4096)
            .await
            .expect("multipart parsed");
        assert_eq!(parsed.form().len(), 2);
        assert_eq!(parsed.form().get("username"), Some("test"));
        assert_eq!(parsed.form().get("password"), Some("secret"));
    }

    #[tokio::test]
    async fn read_rejects_oversized_body() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/token")
            .header(CONTENT_TYPE, FORM_URLENCODED)
            .body(Body::from("username=".to_string() + &"x".repeat(64)))
            .unwrap();
        let err = TokenRequest::read(request, FormEncoding::UrlEncoded, 16)
            .await
            .expect_err("limit enforced");
        assert!(matches!(err, IssueError::InvalidForm(_)));
    }
}

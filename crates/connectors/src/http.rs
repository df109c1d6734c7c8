//! Shared request plumbing.

use std::time::Duration;

use reqwest::{Client, Response, Url};

use crate::error::{ConnectorError, Result};

/// Builds a client whose every request is bounded by `timeout`.
pub(crate) fn client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Parses a base URL that path segments can be appended to.
pub(crate) fn base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| ConnectorError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConnectorError::InvalidUrl {
            url: raw.to_string(),
            reason: "cannot be a base".to_string(),
        });
    }
    Ok(url)
}

/// Appends percent-encoded path segments to `base`.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Reads an error response into `(status, body excerpt)` for logs and errors.
pub(crate) async fn failure(response: Response) -> (u16, String) {
    let status = response.status().as_u16();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > 500 {
        let mut cut = 500;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    (status, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let base = base_url("https://sheets.example.com/").unwrap();
        let url = endpoint(&base, &["v4", "spreadsheets", "sheet 1", "values", "注文一覧!A:O"]);
        assert_eq!(
            url.as_str(),
            "https://sheets.example.com/v4/spreadsheets/sheet%201/values/%E6%B3%A8%E6%96%87%E4%B8%80%E8%A6%A7!A:O"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let base = base_url("http://127.0.0.1:9000/proxy").unwrap();
        let url = endpoint(&base, &["v1", "products", "a/b"]);
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/proxy/v1/products/a%2Fb");
    }

    #[test]
    fn test_rejects_bad_base() {
        assert!(base_url("not a url").is_err());
        assert!(base_url("mailto:ops@example.com").is_err());
    }
}

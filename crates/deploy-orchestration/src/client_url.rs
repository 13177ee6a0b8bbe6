//! Client URL composition.

use crate::{Error, Result};
use url::Url;

/// Combine a server base URL, a module path and an optional extra part.
///
/// `module_path` may itself be an absolute URL, in which case it replaces
/// `base`. Path pieces are joined with single slashes; a query string on
/// `client_url_part` is kept.
pub fn client_url(
    base: &str,
    module_path: Option<&str>,
    client_url_part: Option<&str>,
) -> Result<String> {
    let absolute_module = module_path.and_then(|path| {
        Url::parse(path)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
    });

    let mut url = match absolute_module {
        Some(url) => url,
        None => {
            let mut url = Url::parse(base)
                .map_err(|e| Error::Config(format!("Invalid server base URL '{}': {}", base, e)))?;
            if let Some(path) = module_path {
                append_path(&mut url, path)?;
            }
            url
        }
    };

    if let Some(part) = client_url_part {
        let (path, query) = match part.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (part, None),
        };
        append_path(&mut url, path)?;
        if let Some(query) = query {
            url.set_query(Some(query));
        }
    }

    Ok(url.to_string())
}

fn append_path(url: &mut Url, path: &str) -> Result<()> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Ok(());
    }

    let display = url.to_string();
    let mut existing = url
        .path_segments_mut()
        .map_err(|_| Error::Config(format!("URL cannot take a path: {}", display)))?;
    existing.pop_if_empty().extend(segments);
    if path.ends_with('/') {
        existing.push("");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_only() {
        assert_eq!(
            client_url("http://localhost:8080", None, None).unwrap(),
            "http://localhost:8080/"
        );
    }

    #[test]
    fn test_context_root_and_part_join_with_single_slashes() {
        assert_eq!(
            client_url("http://localhost:8080/", Some("/shop/"), Some("/cart/view.jsp")).unwrap(),
            "http://localhost:8080/shop/cart/view.jsp"
        );
        assert_eq!(
            client_url("http://example.com:8181", Some("shop"), None).unwrap(),
            "http://example.com:8181/shop"
        );
    }

    #[test]
    fn test_trailing_slash_kept() {
        assert_eq!(
            client_url("http://localhost:8080", Some("shop"), Some("admin/")).unwrap(),
            "http://localhost:8080/shop/admin/"
        );
    }

    #[test]
    fn test_query_preserved() {
        assert_eq!(
            client_url("http://localhost:8080", Some("/shop"), Some("item.jsp?id=3")).unwrap(),
            "http://localhost:8080/shop/item.jsp?id=3"
        );
    }

    #[test]
    fn test_absolute_module_url_replaces_base() {
        assert_eq!(
            client_url(
                "http://localhost:8080",
                Some("http://other:9090/app"),
                Some("index.html")
            )
            .unwrap(),
            "http://other:9090/app/index.html"
        );
    }

    #[test]
    fn test_invalid_base_is_config_error() {
        let err = client_url("not a url", Some("/shop"), None).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Config);
    }
}

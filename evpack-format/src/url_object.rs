//! URL normalization into [`UrlObject`]

use crate::error::{EvpackError, Result};
use crate::record::UrlObject;
use std::collections::BTreeMap;
use url::Url;

/// Parse an absolute URL into its domain, path, query and fragment parts.
///
/// Follows WHATWG URL semantics: the domain keeps an explicit non-default
/// port, a bare domain has path `/`, repeated query keys keep their last
/// value, and the fragment keeps its `#` marker unless it is empty.
pub fn parse_url(input: &str) -> Result<UrlObject> {
    let url = Url::parse(input).map_err(|source| EvpackError::MalformedUrl {
        url: input.to_string(),
        source,
    })?;

    let host = url.host_str().unwrap_or_default();
    let domain = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let mut query_params = BTreeMap::new();
    for (key, value) in url.query_pairs() {
        query_params.insert(key.into_owned(), value.into_owned());
    }

    let hash = match url.fragment() {
        Some(fragment) if !fragment.is_empty() => format!("#{}", fragment),
        _ => String::new(),
    };

    Ok(UrlObject {
        domain,
        path: url.path().to_string(),
        query_params,
        hash,
    })
}

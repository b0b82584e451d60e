use http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// JSON description of one inbound request
///
/// Header names are rendered in canonical form (`x-test` becomes `X-Test`)
/// and sorted, so the same request always serializes to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDetails {
    pub method: String,
    pub path: String,
    pub header: BTreeMap<String, Vec<String>>,
    pub body: String,
}

/// Groups header values by canonical name, keeping arrival order per name
pub fn header_values(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers.iter() {
        grouped
            .entry(canonical_header_name(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    grouped
}

/// Upper-cases the first letter and every letter following a hyphen
pub fn canonical_header_name(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let mapped = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            mapped
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_canonical_header_name() {
        assert_eq!(canonical_header_name("x-test"), "X-Test");
        assert_eq!(canonical_header_name("content-type"), "Content-Type");
        assert_eq!(canonical_header_name("ETAG"), "Etag");
        assert_eq!(canonical_header_name("x--double"), "X--Double");
        assert_eq!(canonical_header_name("x_under"), "X_under");
    }

    #[test]
    fn test_header_values_keep_order_per_name() {
        let mut headers = HeaderMap::new();
        headers.append("x-test", HeaderValue::from_static("a"));
        headers.append("accept", HeaderValue::from_static("*/*"));
        headers.append("x-test", HeaderValue::from_static("b"));

        let grouped = header_values(&headers);
        assert_eq!(grouped["X-Test"], vec!["a", "b"]);
        assert_eq!(grouped["Accept"], vec!["*/*"]);
        assert_eq!(grouped.keys().collect::<Vec<_>>(), vec!["Accept", "X-Test"]);
    }

    #[test]
    fn test_serialized_key_order() {
        let details = RequestDetails {
            method: "GET".to_string(),
            path: "/foo?status=201".to_string(),
            header: BTreeMap::new(),
            body: String::new(),
        };
        assert_eq!(
            serde_json::to_string(&details).unwrap(),
            r#"{"method":"GET","path":"/foo?status=201","header":{},"body":""}"#
        );
    }
}

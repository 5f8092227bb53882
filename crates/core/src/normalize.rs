//! Path normalization: replace high-cardinality path segments with
//! placeholders so semantically identical endpoints group together.

use regex::Regex;

/// Normalizes URL paths with a fixed-order regex cascade.
///
/// The cascade order is a functional requirement, not an implementation
/// detail: the semver rule must run before the numeric-id rule so a version
/// like `4.3.8` is not torn apart into numeric captures.
pub struct PathNormalizer {
    uuid: Regex,
    rule_id: Regex,
    encoded_id: Regex,
    version: Regex,
    numeric_id: Regex,
}

impl Default for PathNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PathNormalizer {
    pub fn new() -> Self {
        Self {
            uuid: Regex::new(
                r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
            )
            .expect("uuid regex"),
            rule_id: Regex::new(r"^[A-Z][A-Za-z0-9-]*__[A-Za-z0-9_]+$").expect("rule id regex"),
            encoded_id: Regex::new(r"^[A-Za-z0-9_-]{30,}$").expect("encoded id regex"),
            version: Regex::new(r"^\d+\.\d+\.\d+(?:\.\d+)?$").expect("version regex"),
            numeric_id: Regex::new(r"^\d+$").expect("numeric id regex"),
        }
    }

    /// Normalize a raw path (or full URL) into a template plus the captured
    /// parameter values.
    ///
    /// Captures come out in rule-major order (rule ids, then encoded ids,
    /// then versions, then numeric ids), deduplicated, regardless of where
    /// the segments sit in the path. UUID segments are normalized but never
    /// captured; their values are high-cardinality noise.
    pub fn normalize_path(&self, raw: &str, strip_query: bool) -> (String, Vec<String>) {
        if raw.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut path = path_component(raw);
        if strip_query
            && let Some(idx) = path.find('?')
        {
            path = &path[..idx];
        }

        // One bucket per capturing rule, concatenated below.
        let mut rule_ids: Vec<String> = Vec::new();
        let mut encoded_ids: Vec<String> = Vec::new();
        let mut versions: Vec<String> = Vec::new();
        let mut numeric_ids: Vec<String> = Vec::new();

        let template = path
            .split('/')
            .map(|segment| {
                if segment.is_empty() {
                    return segment.to_string();
                }
                if self.uuid.is_match(segment) {
                    // Substring UUIDs (e.g. "doc-<uuid>") normalize too.
                    return self.uuid.replace_all(segment, "{uuid}").into_owned();
                }
                if self.rule_id.is_match(segment) {
                    rule_ids.push(segment.to_string());
                    return "{rule_id}".to_string();
                }
                if self.encoded_id.is_match(segment) {
                    encoded_ids.push(segment.to_string());
                    return "{encoded_id}".to_string();
                }
                if self.version.is_match(segment) {
                    versions.push(segment.to_string());
                    return "{version}".to_string();
                }
                if self.numeric_id.is_match(segment) {
                    numeric_ids.push(segment.to_string());
                    return "{id}".to_string();
                }
                segment.to_string()
            })
            .collect::<Vec<_>>()
            .join("/");

        let mut params: Vec<String> = Vec::new();
        for value in rule_ids
            .into_iter()
            .chain(encoded_ids)
            .chain(versions)
            .chain(numeric_ids)
        {
            if !params.contains(&value) {
                params.push(value);
            }
        }

        (template, params)
    }
}

/// Reduce a full URL to its path; relative paths pass through.
fn path_component(raw: &str) -> &str {
    if let Some(scheme_end) = raw.find("://") {
        let rest = &raw[scheme_end + 3..];
        match rest.find('/') {
            Some(pos) => &rest[pos..],
            None => "/",
        }
    } else {
        raw
    }
}

/// Whether a template segment is a placeholder like `{id}` or `{bundleID}`.
pub fn is_placeholder(segment: &str) -> bool {
    segment.starts_with('{') && segment.ends_with('}') && segment.len() > 2
}

pub fn placeholder_count(template: &str) -> usize {
    template.split('/').filter(|s| is_placeholder(s)).count()
}

/// Fuzzy template equality: segment by segment, a placeholder on either side
/// matches any single segment of the other. Templates of different lengths
/// never match.
pub fn templates_match_fuzzy(a: &str, b: &str) -> bool {
    let seg_a: Vec<&str> = a.split('/').collect();
    let seg_b: Vec<&str> = b.split('/').collect();
    if seg_a.len() != seg_b.len() {
        return false;
    }
    seg_a
        .iter()
        .zip(&seg_b)
        .all(|(x, y)| x == y || is_placeholder(x) || is_placeholder(y))
}

/// Of two fuzzily-equal templates, the more parameterized one is canonical.
pub fn pick_canonical<'a>(a: &'a str, b: &'a str) -> &'a str {
    if placeholder_count(b) > placeholder_count(a) {
        b
    } else {
        a
    }
}

/// Concrete segments of `other` that align with a placeholder in `canonical`;
/// these are absorbed into the aggregate's captured parameters.
pub fn absorbed_segments(canonical: &str, other: &str) -> Vec<String> {
    canonical
        .split('/')
        .zip(other.split('/'))
        .filter(|(c, o)| is_placeholder(c) && !is_placeholder(o) && !o.is_empty())
        .map(|(_, o)| o.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(path: &str) -> (String, Vec<String>) {
        PathNormalizer::new().normalize_path(path, true)
    }

    #[test]
    fn uuid_normalized_but_not_captured() {
        let (template, params) =
            norm("/v1/0c38aef5-9212-4e2b-aaaa-bbbbcccc0123/things/123");
        assert_eq!(template, "/v1/{uuid}/things/{id}");
        assert_eq!(params, vec!["123"]);
    }

    #[test]
    fn uuid_substring_inside_a_segment_is_normalized() {
        let (template, params) =
            norm("/docs/doc-0c38aef5-9212-4e2b-aaaa-bbbbcccc0123");
        assert_eq!(template, "/docs/doc-{uuid}");
        assert!(params.is_empty());
    }

    #[test]
    fn rule_id_and_encoded_id_captured() {
        let (template, params) = norm("/rules/DataPortal__ViewLookup/resolve");
        assert_eq!(template, "/rules/{rule_id}/resolve");
        assert_eq!(params, vec!["DataPortal__ViewLookup"]);

        let token = "a".repeat(30);
        let (template, params) = norm(&format!("/blobs/{token}"));
        assert_eq!(template, "/blobs/{encoded_id}");
        assert_eq!(params, vec![token]);
    }

    #[test]
    fn short_opaque_token_stays_concrete() {
        let (template, params) = norm("/blobs/abc123XYZ");
        assert_eq!(template, "/blobs/abc123XYZ");
        assert!(params.is_empty());
    }

    #[test]
    fn version_wins_over_numeric_id() {
        let (template, params) = norm("/bundles/data-model/versions/4.3.8");
        assert_eq!(template, "/bundles/data-model/versions/{version}");
        assert_eq!(params, vec!["4.3.8"]);

        let (template, params) = norm("/bundles/7/versions/1.0.0.1");
        assert_eq!(template, "/bundles/{id}/versions/{version}");
        assert_eq!(params, vec!["1.0.0.1", "7"]);
    }

    #[test]
    fn captures_come_out_rule_major_not_path_order() {
        let (template, params) = norm("/tenants/7/rules/DataPortal__ViewLookup/at/4.3.8");
        assert_eq!(template, "/tenants/{id}/rules/{rule_id}/at/{version}");
        assert_eq!(params, vec!["DataPortal__ViewLookup", "4.3.8", "7"]);
    }

    #[test]
    fn query_string_is_stripped_by_default() {
        let (template, params) = norm("/search/42?q=abc&page=2");
        assert_eq!(template, "/search/{id}");
        assert_eq!(params, vec!["42"]);

        let (kept, _) = PathNormalizer::new().normalize_path("/search?q=abc", false);
        assert_eq!(kept, "/search?q=abc");
    }

    #[test]
    fn full_urls_reduce_to_their_path() {
        let (template, params) =
            norm("http://data-service.svc.cluster.local/items/99?verbose=1");
        assert_eq!(template, "/items/{id}");
        assert_eq!(params, vec!["99"]);
    }

    #[test]
    fn captured_params_are_deduplicated_in_order() {
        let (template, params) = norm("/a/5/b/5/c/6");
        assert_eq!(template, "/a/{id}/b/{id}/c/{id}");
        assert_eq!(params, vec!["5", "6"]);
    }

    #[test]
    fn fuzzy_matching_aligns_placeholders_with_concrete_segments() {
        assert!(templates_match_fuzzy(
            "/bundles/{bundleID}/versions/{versionID}",
            "/bundles/data-model/versions/{version}"
        ));
        assert!(!templates_match_fuzzy(
            "/v1/{id}/bundles/{id}",
            "/v1/{id}/rules/{id}"
        ));
        assert!(!templates_match_fuzzy("/v1/{id}/data", "/v1/{id}/data/extra"));
        assert!(!templates_match_fuzzy("/api/users/active", "/api/users/inactive"));
    }

    #[test]
    fn canonical_is_the_more_parameterized_template() {
        let more = "/bundles/{bundleID}/versions/{versionID}";
        let less = "/bundles/data-model/versions/{versionID}";
        assert_eq!(pick_canonical(more, less), more);
        assert_eq!(pick_canonical(less, more), more);
        assert_eq!(
            absorbed_segments(more, less),
            vec!["data-model".to_string()]
        );
    }
}

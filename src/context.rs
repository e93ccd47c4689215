//! Request metadata and the canonical tenant key derived from it.

/// Read-only multimap carried on an inbound request, analogous to a gRPC
/// metadata / HTTP header map. Key comparisons the router performs against
/// it are case-insensitive; the map itself preserves whatever casing the
/// caller used.
#[derive(Clone, Debug, Default)]
pub struct RequestMetadata {
    entries: Vec<(String, Vec<String>)>,
}

impl RequestMetadata {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Add a value under `key`. Multiple calls with the same key (by any
    /// casing) append to that key's value list.
    pub fn insert(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        if let Some((_, values)) = self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            values.push(value);
        } else {
            self.entries.push((key, vec![value]));
        }
        self
    }

    /// Values for `key`, compared case-insensitively. Empty if absent.
    pub fn get(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }
}

/// The tenant-scoped metadata map a worker's export context carries:
/// exactly the configured `metadata_keys`, projected from a request's
/// `RequestMetadata`, in the stage's canonical (lowercased, sorted) key
/// order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TenantMetadata {
    entries: Vec<(String, Vec<String>)>,
}

impl TenantMetadata {
    pub fn entries(&self) -> &[(String, Vec<String>)] {
        &self.entries
    }
}

/// Stable, key-order-independent, duplicate-free identity for a tenant.
///
/// Built by sorting attributes by key and encoding each key/value(s) pair
/// length-prefixed, so `{k: ["a","b"]}` and `{k: ["ab"]}` never collide -
/// per the spec's canonicalization guidance for runtimes without a
/// first-class structured-set hash key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CanonicalTenantKey(String);

impl CanonicalTenantKey {
    fn encode_str(buf: &mut String, s: &str) {
        buf.push_str(&s.len().to_string());
        buf.push(':');
        buf.push_str(s);
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Projects a request's metadata onto the configured (already normalized)
/// `metadata_keys`, producing both the tenant's canonical key and the
/// tenant-scoped metadata map carried by its `ExportContext`.
///
/// `metadata_keys` must already be lowercased, sorted, and deduplicated -
/// `BatchConfig::metadata_keys` guarantees this at construction time so
/// this is not repeated on every call.
pub fn project(metadata_keys: &[String], request: &RequestMetadata) -> (CanonicalTenantKey, TenantMetadata) {
    let mut entries = Vec::with_capacity(metadata_keys.len());
    for key in metadata_keys {
        let values: Vec<String> = request.get(key).to_vec();
        entries.push((key.clone(), values));
    }

    let mut encoded = String::new();
    for (key, values) in &entries {
        CanonicalTenantKey::encode_str(&mut encoded, key);
        encoded.push('=');
        encoded.push_str(&values.len().to_string());
        encoded.push(':');
        for value in values {
            CanonicalTenantKey::encode_str(&mut encoded, value);
        }
        encoded.push(';');
    }

    (CanonicalTenantKey(encoded), TenantMetadata { entries })
}

/// Immutable per-tenant context a worker carries for the lifetime of its
/// task: the tenant-scoped metadata, handed to the downstream sink on every
/// `export` call so it can tag the release with tenant identity.
#[derive(Clone, Debug, Default)]
pub struct ExportContext {
    metadata: TenantMetadata,
}

impl ExportContext {
    pub fn new(metadata: TenantMetadata) -> Self {
        Self { metadata }
    }

    pub fn singleton() -> Self {
        Self::default()
    }

    pub fn metadata(&self) -> &TenantMetadata {
        &self.metadata
    }

    /// A short, loggable identity for this tenant (used in `tracing`
    /// spans/fields; not part of the canonical key computation).
    pub fn tenant_id(&self) -> String {
        if self.metadata.entries.is_empty() {
            return "singleton".to_string();
        }
        self.metadata
            .entries
            .iter()
            .map(|(k, v)| format!("{k}={}", v.join(",")))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Normalizes a configured key list: lowercase, sort, dedup.
pub fn normalize_metadata_keys(keys: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = keys.iter().map(|k| k.to_lowercase()).collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_is_case_insensitive() {
        let meta = RequestMetadata::new().insert("X-Tenant", "acme");
        assert_eq!(meta.get("x-tenant"), &["acme".to_string()]);
        assert_eq!(meta.get("X-TENANT"), &["acme".to_string()]);
    }

    #[test]
    fn missing_key_projects_to_empty_value_list() {
        let keys = normalize_metadata_keys(&["tenant".to_string()]);
        let meta = RequestMetadata::new();
        let (_, tenant_meta) = project(&keys, &meta);
        assert_eq!(tenant_meta.entries(), &[("tenant".to_string(), vec![])]);
    }

    #[test]
    fn same_projection_yields_equal_canonical_keys() {
        let keys = normalize_metadata_keys(&["X-Tenant".to_string()]);
        let a = RequestMetadata::new().insert("X-Tenant", "acme");
        let b = RequestMetadata::new().insert("x-tenant", "acme");

        let (key_a, _) = project(&keys, &a);
        let (key_b, _) = project(&keys, &b);
        assert_eq!(key_a, key_b);
    }

    #[test]
    fn value_lists_are_length_prefixed_to_avoid_ambiguity() {
        let keys = normalize_metadata_keys(&["k".to_string()]);
        let split = RequestMetadata::new().insert("k", "a").insert("k", "b");
        let joined = RequestMetadata::new().insert("k", "ab");

        let (key_split, _) = project(&keys, &split);
        let (key_joined, _) = project(&keys, &joined);
        assert_ne!(key_split, key_joined);
    }

    #[test]
    fn multiple_keys_are_order_independent_in_config_not_request() {
        let keys = normalize_metadata_keys(&["b".to_string(), "a".to_string()]);
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

        let meta = RequestMetadata::new().insert("a", "1").insert("b", "2");
        let (key1, _) = project(&keys, &meta);
        let (key2, _) = project(&normalize_metadata_keys(&["a".to_string(), "b".to_string()]), &meta);
        assert_eq!(key1, key2);
    }
}

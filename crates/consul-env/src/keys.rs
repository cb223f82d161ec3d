//! Namespace and key transforms shared by the store backends.

/// Normalize a namespace so it always ends in exactly one `/`.
///
/// Trailing separators collapse first, so `"services"`, `"services/"` and
/// `"services//"` all normalize to `"services/"`. The empty namespace
/// normalizes to `"/"`.
pub fn normalize_namespace(namespace: &str) -> String {
    format!("{}/", namespace.trim_end_matches('/'))
}

/// Rewrite a namespaced KV path into a name safe to store as a process
/// environment variable.
///
/// The namespace prefix is dropped, separators at either edge are trimmed
/// and each remaining `/` becomes `___`, which keeps distinct paths
/// distinct while staying inside the portable environment character set.
pub fn fallback_key(namespace: &str, key: &str) -> String {
    let stripped = key.strip_prefix(namespace).unwrap_or(key);
    stripped.trim_matches('/').replace('/', "___")
}

/// Map a KV path onto a local environment variable name by replacing the
/// separator with `.`.
pub fn local_key(key: &str) -> String {
    key.replace('/', ".")
}

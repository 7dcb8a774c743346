//! Host identifier helpers.
//!
//! Backends report themselves as `host@backend#pool`. Both the backend and
//! the pool segment are optional.

/// Pool name used when an identifier carries no `#pool` segment.
pub const DEFAULT_POOL_NAME: &str = "_pool0";

/// Which part of a host identifier to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostLevel {
    /// `host`
    Host,
    /// `host@backend`
    Backend,
    /// `backend` without the host prefix
    BackendName,
    /// `pool`
    Pool,
}

/// Extract one level from a `host@backend#pool` identifier.
///
/// `default_pool` only applies to [`HostLevel::Pool`]: when the identifier has
/// no pool segment, [`DEFAULT_POOL_NAME`] is returned instead of `None`.
///
/// # Examples
///
/// ```
/// use berth::host::{extract_host, HostLevel};
///
/// let id = "node1@lvm#fast";
/// assert_eq!(extract_host(id, HostLevel::Host, false).as_deref(), Some("node1"));
/// assert_eq!(extract_host(id, HostLevel::Backend, false).as_deref(), Some("node1@lvm"));
/// assert_eq!(extract_host(id, HostLevel::BackendName, false).as_deref(), Some("lvm"));
/// assert_eq!(extract_host(id, HostLevel::Pool, false).as_deref(), Some("fast"));
/// ```
pub fn extract_host(id: &str, level: HostLevel, default_pool: bool) -> Option<String> {
    let (backend, pool) = match id.split_once('#') {
        Some((backend, pool)) => (backend, Some(pool)),
        None => (id, None),
    };

    match level {
        HostLevel::Host => Some(backend.split('@').next().unwrap_or(backend).to_string()),
        HostLevel::Backend => Some(backend.to_string()),
        HostLevel::BackendName => backend
            .split_once('@')
            .map(|(_, name)| name.to_string()),
        HostLevel::Pool => match pool {
            Some(pool) => Some(pool.to_string()),
            None if default_pool => Some(DEFAULT_POOL_NAME.to_string()),
            None => None,
        },
    }
}

/// Append a pool segment to a host identifier.
pub fn append_pool(host: Option<&str>, pool: Option<&str>) -> Option<String> {
    match (host, pool) {
        (Some(host), Some(pool)) => Some(format!("{}#{}", host, pool)),
        (Some(host), None) => Some(host.to_string()),
        (None, _) => None,
    }
}

/// True when both identifiers name the same `host@backend`.
pub fn same_backend(a: &str, b: &str) -> bool {
    extract_host(a, HostLevel::Backend, false) == extract_host(b, HostLevel::Backend, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_without_pool() {
        assert_eq!(
            extract_host("Host@Backend", HostLevel::Backend, false).as_deref(),
            Some("Host@Backend")
        );
        assert_eq!(
            extract_host("Host@Backend", HostLevel::Host, false).as_deref(),
            Some("Host")
        );
        assert_eq!(extract_host("Host@Backend", HostLevel::Pool, false), None);
        assert_eq!(
            extract_host("Host@Backend", HostLevel::Pool, true).as_deref(),
            Some(DEFAULT_POOL_NAME)
        );
    }

    #[test]
    fn test_extract_missing_backend() {
        let id = "Host#Pool";
        assert_eq!(extract_host(id, HostLevel::Host, false).as_deref(), Some("Host"));
        assert_eq!(
            extract_host(id, HostLevel::Backend, false).as_deref(),
            Some("Host")
        );
        assert_eq!(extract_host(id, HostLevel::Pool, false).as_deref(), Some("Pool"));
        assert_eq!(extract_host(id, HostLevel::BackendName, false), None);
    }

    #[test]
    fn test_extract_bare_host_ignores_default_pool_for_other_levels() {
        assert_eq!(extract_host("Host", HostLevel::Host, true).as_deref(), Some("Host"));
        assert_eq!(
            extract_host("Host", HostLevel::Backend, true).as_deref(),
            Some("Host")
        );
    }

    #[test]
    fn test_append_pool() {
        assert_eq!(append_pool(Some("Host"), Some("Pool")).as_deref(), Some("Host#Pool"));
        assert_eq!(append_pool(Some("Host"), None).as_deref(), Some("Host"));
        assert_eq!(append_pool(None, Some("Pool")), None);
        assert_eq!(append_pool(None, None), None);
    }

    #[test]
    fn test_same_backend_ignores_pool() {
        assert!(same_backend("h1@lvm#a", "h1@lvm#b"));
        assert!(same_backend("h1@lvm", "h1@lvm#b"));
        assert!(!same_backend("h1@lvm#a", "h1@zfs#a"));
    }
}

//! Static routing table mapping inbound path prefixes to downstreams.
//!
//! The table is fixed at startup: topology changes rarely, and a static
//! table keeps circuit-breaker identity stable across a process's lifetime.

/// One routing rule.
#[derive(Debug, Clone)]
pub struct Route {
    /// Inbound path prefix, e.g. `/api/v1/search`.
    pub prefix: String,
    /// Downstream service name, the key into the proxy registry.
    pub service_name: String,
}

/// A match produced by [`RouteTable::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub service_name: &'a str,
    /// The part of the path below the prefix (leading slash preserved),
    /// forwarded verbatim to the downstream.
    pub rest: &'a str,
}

/// Longest-prefix-match route table.
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Builds a table; rules are kept sorted longest-prefix-first so the
    /// first hit wins.
    pub fn new(mut routes: Vec<Route>) -> Self {
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { routes }
    }

    /// Resolves a path to a downstream, or `None` (a 404 at the edge).
    pub fn resolve<'a>(&'a self, path: &'a str) -> Option<RouteMatch<'a>> {
        self.routes.iter().find_map(|route| {
            let rest = path.strip_prefix(route.prefix.as_str())?;
            if rest.is_empty() || rest.starts_with('/') {
                Some(RouteMatch {
                    service_name: &route.service_name,
                    rest,
                })
            } else {
                None
            }
        })
    }

    /// All configured routes.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

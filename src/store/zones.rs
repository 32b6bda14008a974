//! Hostname normalization and authoritative zone matching.

/// Lower-case a hostname and make it fully qualified.
pub fn normalize_name(name: &str) -> String {
    let mut name = name.trim().to_lowercase();
    if !name.ends_with('.') {
        name.push('.');
    }
    name
}

/// The set of zones this instance answers for.
///
/// An empty set matches every name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zones(Vec<String>);

impl Zones {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            origins
                .into_iter()
                .map(|o| normalize_name(o.as_ref()))
                .collect(),
        )
    }

    /// Returns the longest configured zone containing `name`.
    pub fn matches(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .filter(|zone| is_subdomain(zone, name))
            .max_by_key(|zone| zone.len())
            .map(String::as_str)
    }

    /// True if `name` should be served.
    pub fn contains(&self, name: &str) -> bool {
        self.0.is_empty() || self.matches(name).is_some()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Label-aligned suffix test on normalized names.
fn is_subdomain(zone: &str, name: &str) -> bool {
    if zone == "." || zone == name {
        return true;
    }
    name.len() > zone.len()
        && name.ends_with(zone)
        && name.as_bytes()[name.len() - zone.len() - 1] == b'.'
}

//! Image reference deny-list
//!
//! Community catalogs must not republish images under reserved namespaces.
//! References are checked as written and, when unqualified, again after
//! qualification with the manifest's registry so `chrome:latest` published
//! against a reserved registry is caught too.

/// Default reserved registry/namespace prefixes
pub const IMAGE_NAME_PREFIX_FILTERS: &[&str] = &["kasmweb/"];

/// Strip schemes and trailing slashes from a registry value (`https://r.io/` -> `r.io`)
///
/// Repeated schemes (`https://http://r.io`) are all removed.
pub fn normalize_registry(registry: &str) -> String {
    let mut rest = registry.trim();
    while let Some(stripped) = rest
        .strip_prefix("https://")
        .or_else(|| rest.strip_prefix("http://"))
    {
        rest = stripped;
    }
    rest.trim_end_matches('/').to_string()
}

/// Deny-list of image reference prefixes
#[derive(Debug, Clone)]
pub struct ImageFilter {
    prefixes: Vec<String>,
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self::new(IMAGE_NAME_PREFIX_FILTERS.iter().map(|p| p.to_string()))
    }
}

impl ImageFilter {
    pub fn new(prefixes: impl IntoIterator<Item = String>) -> Self {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    fn matches(&self, reference: &str) -> bool {
        self.prefixes.iter().any(|p| reference.starts_with(p.as_str()))
    }

    /// Whether `image` must be skipped instead of verified
    pub fn should_skip(&self, image: Option<&str>, registry: Option<&str>) -> bool {
        let image = match image.map(str::trim) {
            Some(image) if !image.is_empty() => image,
            _ => return false,
        };

        if self.matches(image) {
            return true;
        }

        let registry = match registry.map(normalize_registry) {
            Some(registry) if !registry.is_empty() => registry,
            _ => return false,
        };

        // Already qualified with this registry: nothing new to learn
        if image.starts_with(&format!("{registry}/")) {
            return false;
        }

        self.matches(&format!("{registry}/{image}"))
    }
}

/// Check `image` against the default deny-list
pub fn should_skip_image(image: Option<&str>, registry: Option<&str>) -> bool {
    ImageFilter::default().should_skip(image, registry)
}

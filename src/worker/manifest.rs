//! Precache manifest and scope resolution

use crate::config::schema::WorkerConfig;
use crate::error::{PrecacheError, PrecacheResult};
use url::{Origin, Url};

/// Ordered list of asset paths relative to the worker scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetManifest {
    paths: Vec<String>,
}

impl AssetManifest {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Resolve every path against the scope, keeping manifest order
    ///
    /// Duplicates after resolution collapse to their first occurrence.
    pub fn resolve(&self, scope: &Url) -> PrecacheResult<Vec<Url>> {
        let mut resolved: Vec<Url> = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let url = resolve_asset(scope, path)?;
            if !resolved.contains(&url) {
                resolved.push(url);
            }
        }
        Ok(resolved)
    }
}

/// Parse a scope URL, normalizing it to end in `/`
///
/// `https://host/repo` and `https://host/repo/` name the same scope; without
/// the trailing slash URL joining would resolve assets next to `repo`
/// instead of inside it.
pub fn parse_scope(scope: &str) -> PrecacheResult<Url> {
    let mut url = Url::parse(scope).map_err(|e| PrecacheError::InvalidUrl {
        url: scope.to_string(),
        reason: e.to_string(),
    })?;

    if url.cannot_be_a_base() {
        return Err(PrecacheError::InvalidUrl {
            url: scope.to_string(),
            reason: "scope must be a hierarchical URL".to_string(),
        });
    }

    url.set_query(None);
    url.set_fragment(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Resolve one relative asset path under the scope
pub fn resolve_asset(scope: &Url, path: &str) -> PrecacheResult<Url> {
    let invalid = |reason: &str| PrecacheError::InvalidAsset {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(invalid("path is empty"));
    }
    if Url::parse(trimmed).is_ok() || trimmed.starts_with("//") {
        return Err(invalid("must be relative to the worker scope"));
    }

    let url = scope
        .join(trimmed)
        .map_err(|e| invalid(&e.to_string()))?;

    if !url.as_str().starts_with(scope.as_str()) {
        return Err(invalid("resolves outside the worker scope"));
    }
    Ok(url)
}

/// Worker settings resolved from configuration
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Name of the current cache generation
    pub generation: String,
    /// Normalized scope URL
    pub scope: Url,
    /// Origin of the pages the worker controls
    pub origin: Origin,
    /// Resolved precache URLs, in manifest order
    pub assets: Vec<Url>,
    /// Page served to navigations that fail at the network step
    pub offline_page: Url,
}

impl WorkerSettings {
    pub fn new(
        generation: impl Into<String>,
        scope: &str,
        manifest: &AssetManifest,
        offline_page: &str,
    ) -> PrecacheResult<Self> {
        let generation = generation.into();
        if generation.trim().is_empty() {
            return Err(PrecacheError::User(
                "worker.generation must not be empty".to_string(),
            ));
        }

        let scope = parse_scope(scope)?;
        let assets = manifest.resolve(&scope)?;
        let offline_page = resolve_asset(&scope, offline_page)?;

        Ok(Self {
            generation,
            origin: scope.origin(),
            scope,
            assets,
            offline_page,
        })
    }

    pub fn from_config(config: &WorkerConfig) -> PrecacheResult<Self> {
        Self::new(
            config.generation.clone(),
            &config.scope,
            &AssetManifest::new(config.assets.iter().cloned()),
            &config.offline_page,
        )
    }

    /// Whether a URL belongs to the controlled pages' origin
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_gets_trailing_slash() {
        let scope = parse_scope("https://user.github.io/simple-hours").unwrap();
        assert_eq!(scope.as_str(), "https://user.github.io/simple-hours/");

        let scope = parse_scope("https://user.github.io/simple-hours/?x=1#top").unwrap();
        assert_eq!(scope.as_str(), "https://user.github.io/simple-hours/");
    }

    #[test]
    fn scope_rejects_garbage() {
        assert!(parse_scope("not a url").is_err());
        assert!(parse_scope("mailto:someone@example.com").is_err());
    }

    #[test]
    fn resolves_under_sub_path() {
        let scope = parse_scope("https://user.github.io/repo/").unwrap();
        let manifest = AssetManifest::new(["index.html", "icons/icon-192.png", "./sw.js"]);
        let urls: Vec<String> = manifest
            .resolve(&scope)
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(
            urls,
            vec![
                "https://user.github.io/repo/index.html",
                "https://user.github.io/repo/icons/icon-192.png",
                "https://user.github.io/repo/sw.js",
            ]
        );
    }

    #[test]
    fn duplicates_collapse_in_order() {
        let scope = parse_scope("https://example.com/").unwrap();
        let manifest = AssetManifest::new(["app.js", "index.html", "./app.js"]);
        let urls = manifest.resolve(&scope).unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].path(), "/app.js");
        assert_eq!(urls[1].path(), "/index.html");
    }

    #[test]
    fn rejects_paths_outside_scope() {
        let scope = parse_scope("https://example.com/app/").unwrap();
        for path in [
            "",
            "   ",
            "https://cdn.example.com/lib.js",
            "//cdn.example.com/lib.js",
            "../secret.txt",
            "/root.html",
        ] {
            let err = resolve_asset(&scope, path).unwrap_err();
            assert!(
                matches!(err, PrecacheError::InvalidAsset { .. }),
                "expected InvalidAsset for {path:?}"
            );
        }
    }

    #[test]
    fn settings_from_default_config() {
        let settings = WorkerSettings::from_config(&WorkerConfig::default()).unwrap();
        assert_eq!(settings.generation, "precache-v1");
        assert_eq!(settings.offline_page.as_str(), "http://localhost:8080/index.html");
        assert!(settings.is_same_origin(&Url::parse("http://localhost:8080/api").unwrap()));
        assert!(!settings.is_same_origin(&Url::parse("http://localhost:9090/api").unwrap()));
        assert!(!settings.is_same_origin(&Url::parse("https://localhost:8080/").unwrap()));
    }

    #[test]
    fn settings_reject_empty_generation() {
        let config = WorkerConfig {
            generation: " ".to_string(),
            ..WorkerConfig::default()
        };
        assert!(WorkerSettings::from_config(&config).is_err());
    }
}

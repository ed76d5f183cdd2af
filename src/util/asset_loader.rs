use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use minijinja::{Environment, Error, State};
use sha2::{Digest, Sha256};

/// Cache-busting `asset("app.css")` template function.
#[derive(Debug, Clone)]
pub struct AssetLoader {
    root: PathBuf,
    cache: Arc<RwLock<HashMap<String, String>>>,
}

impl AssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Arc::default(),
        }
    }

    pub fn asset_path(&self, path: &str) -> String {
        if let Some(hashed_path) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            return hashed_path.clone();
        }

        let Ok(contents) = fs::read(self.root.join(path)) else {
            return format!("/static/{}", path);
        };
        let hash = Sha256::digest(contents);
        let hashed_path = format!("/static/{}?v={:x}", path, hash);
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), hashed_path.clone());
        hashed_path
    }

    pub fn register(&self, env: &mut Environment<'_>) {
        let loader = self.clone();
        env.add_function("asset", move |_state: &State, path: String| -> Result<String, Error> {
            Ok(loader.asset_path(&path))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_existing_files_and_passes_through_missing_ones() {
        let dir = std::env::temp_dir().join(format!("clubsphere-assets-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("app.css"), "body {}").unwrap();

        let loader = AssetLoader::new(&dir);
        let hashed = loader.asset_path("app.css");
        assert!(hashed.starts_with("/static/app.css?v="));
        assert_eq!(loader.asset_path("app.css"), hashed);
        assert_eq!(loader.asset_path("missing.js"), "/static/missing.js");

        fs::remove_dir_all(&dir).unwrap();
    }
}

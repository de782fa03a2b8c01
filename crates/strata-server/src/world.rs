//! World directory layout.

use std::path::{Path, PathBuf};

use strata_voxel::ContentRegistry;
use tracing::info;

use crate::error::ServerError;

const APP_NAME: &str = "strata";

/// Optional content definitions inside a world directory.
pub const CONTENT_FILE_NAME: &str = "content.ron";

/// The world directory: `explicit` if given, otherwise `worlds/world` under
/// the platform data directory.
pub fn resolve_world_dir(explicit: Option<&Path>) -> Result<PathBuf, ServerError> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    let data_dir = dirs::data_dir().ok_or(ServerError::NoWorldDir)?;
    Ok(data_dir.join(APP_NAME).join("worlds").join("world"))
}

/// Content of the world: `content.ron` when present, the bundled content
/// otherwise.
pub fn load_registry(world_dir: &Path) -> Result<ContentRegistry, ServerError> {
    let path = world_dir.join(CONTENT_FILE_NAME);
    if !path.exists() {
        return Ok(ContentRegistry::with_basic_content());
    }
    let text = std::fs::read_to_string(&path).map_err(|source| ServerError::Read {
        path: path.clone(),
        source,
    })?;
    let registry = ContentRegistry::from_ron_str(&text)?;
    info!(path = %path.display(), definitions = registry.len(), "loaded content definitions");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_world_dir_wins() {
        let dir = resolve_world_dir(Some(Path::new("/tmp/somewhere"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/somewhere"));
    }

    #[test]
    fn test_default_world_dir_is_under_data_dir() {
        if let Ok(dir) = resolve_world_dir(None) {
            assert!(dir.ends_with("strata/worlds/world"));
        }
    }

    #[test]
    fn test_missing_content_file_uses_bundled_content() {
        let dir = tempfile::tempdir().unwrap();
        let registry = load_registry(dir.path()).unwrap();
        assert!(registry.id_of("water_source").is_some());
    }

    #[test]
    fn test_content_file_replaces_bundled_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONTENT_FILE_NAME),
            r#"[(name: "stone"), (name: "dirt"), (name: "grass"), (name: "sand")]"#,
        )
        .unwrap();
        let registry = load_registry(dir.path()).unwrap();
        assert!(registry.id_of("grass").is_some());
        assert!(registry.id_of("torch").is_none());
    }

    #[test]
    fn test_broken_content_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONTENT_FILE_NAME), "[(name: ").unwrap();
        assert!(matches!(
            load_registry(dir.path()),
            Err(ServerError::Content(_))
        ));
    }
}

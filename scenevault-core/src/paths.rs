use scenevault_model::SceneId;

/// Derives the four artifact paths for a scene id under a storage base
/// directory. Sources stay at their registered path and are never copied —
/// only the derived artifacts live under this layout.
#[derive(Clone, Debug)]
pub struct ArtifactPaths {
    pub thumbnail: String,
    pub sprite_sheet: String,
    pub sprite_cue: String,
    pub preview: String,
}

impl ArtifactPaths {
    pub fn for_scene(base_dir: &str, scene_id: SceneId) -> Self {
        let base = base_dir.trim_end_matches('/');
        Self {
            thumbnail: format!("{base}/thumbnails/{scene_id}.jpg"),
            sprite_sheet: format!("{base}/sprites/{scene_id}.jpg"),
            sprite_cue: format!("{base}/sprites/{scene_id}.vtt"),
            preview: format!("{base}/previews/{scene_id}.mp4"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_layout_per_scene_id() {
        let paths = ArtifactPaths::for_scene("/data", SceneId(42));
        assert_eq!(paths.thumbnail, "/data/thumbnails/42.jpg");
        assert_eq!(paths.sprite_sheet, "/data/sprites/42.jpg");
        assert_eq!(paths.sprite_cue, "/data/sprites/42.vtt");
        assert_eq!(paths.preview, "/data/previews/42.mp4");
    }
}

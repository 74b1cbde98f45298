pub mod schema;

use anyhow::{Context, Result};
use log::debug;
use schema::OutlineConfig;

pub fn load_from_yaml_str(s: &str) -> Result<OutlineConfig> {
    let mut cfg: OutlineConfig = serde_yaml::from_str(s).context("invalid outline config")?;
    cfg.post = cfg.post.clamped();
    Ok(cfg)
}

pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<OutlineConfig> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    debug!("loading outline config from {}", path.display());
    load_from_yaml_str(&data)
}

pub fn to_yaml_string(cfg: &OutlineConfig) -> Result<String> {
    Ok(serde_yaml::to_string(cfg)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::outline::OutlineMode;
    use glam::Vec4;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = load_from_yaml_str("{}").unwrap();
        assert_eq!(cfg, OutlineConfig::default());
        assert_eq!(cfg.outline.width, 10.0);
        assert!(!cfg.post.is_active());
    }

    #[test]
    fn parses_full_document() {
        let yaml = r#"
outline:
  color: [1.0, 0.5, 0.0, 1.0]
  width: 4
  tangent_space: true
  layer: 2
  mode: x_ray
post:
  width: 12
  normal_threshold_scale: 3
  only_outline: true
"#;
        let cfg = load_from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.outline.color, Vec4::new(1.0, 0.5, 0.0, 1.0));
        assert_eq!(cfg.outline.mode, OutlineMode::XRay);
        assert_eq!(cfg.outline.layer, 2);
        assert!(cfg.outline.tangent_space);
        // clamped on load
        assert_eq!(cfg.post.width, 5.0);
        assert_eq!(cfg.post.normal_threshold_scale, 3.0);
        assert_eq!(cfg.post.distance_threshold, 1.0);
    }

    #[test]
    fn modes_accept_indices_and_unknown_names() {
        let cfg = load_from_yaml_str("outline: { mode: 1 }").unwrap();
        assert_eq!(cfg.outline.mode, OutlineMode::XRayOnly);
        let cfg = load_from_yaml_str("outline: { mode: 42 }").unwrap();
        assert_eq!(cfg.outline.mode, OutlineMode::Normal);
        let cfg = load_from_yaml_str("outline: { mode: sideways }").unwrap();
        assert_eq!(cfg.outline.mode, OutlineMode::Normal);
    }

    #[test]
    fn yaml_round_trips_modes() {
        let mut cfg = OutlineConfig::default();
        cfg.outline.mode = OutlineMode::XRayFill;
        let text = to_yaml_string(&cfg).unwrap();
        assert!(text.contains("x_ray_fill"));
        assert_eq!(load_from_yaml_str(&text).unwrap().outline.mode, OutlineMode::XRayFill);
    }

    #[test]
    fn bad_types_are_reported() {
        assert!(load_from_yaml_str("outline: { width: wide }").is_err());
    }
}

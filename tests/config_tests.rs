use quilt_viewer::config::Configuration;
use std::net::SocketAddr;

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
listen-addr: "0.0.0.0:9000"
viewer-id: "3"
api-url: "http://127.0.0.1:8188"
defaults:
  depth-strength: 1.0
  quilts-num: 8
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(
        cfg.listen_addr,
        "0.0.0.0:9000".parse::<SocketAddr>().unwrap()
    );
    assert_eq!(cfg.viewer_id, "3");
    assert_eq!(cfg.api_url.as_deref(), Some("http://127.0.0.1:8188"));
    assert_eq!(cfg.defaults.depth_strength, 1.0);
    assert_eq!(cfg.defaults.quilts_num, 8);
    // Unspecified defaults fall back to the host panel values.
    assert_eq!(cfg.defaults.camera_fov, 7.0);
    assert_eq!(cfg.defaults.screenshot_size, 1024);
}

#[test]
fn load_from_file_and_validate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("viewer.yaml");
    std::fs::write(
        &path,
        "viewer-id: \"12\"\ndefaults:\n  quilts-angle-range: 35.0\n",
    )
    .unwrap();

    let cfg = Configuration::from_yaml_file(&path)
        .unwrap()
        .validated()
        .unwrap();
    assert_eq!(cfg.viewer_id, "12");
    assert_eq!(cfg.defaults.quilts_angle_range, 35.0);
}

#[test]
fn validation_rejects_out_of_range_fov() {
    let cfg: Configuration = serde_yaml::from_str("defaults:\n  camera-fov: 170.0\n").unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn validation_rejects_empty_viewer_id() {
    let cfg: Configuration = serde_yaml::from_str("viewer-id: \"\"\n").unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn defaults_round_trip_into_render_params() {
    let cfg = Configuration::default();
    let params = cfg.defaults.to_params();
    assert_eq!(params.depth_strength, 1.5);
    assert_eq!(params.dof_strength, 0.5);
    assert_eq!(params.focus_distance, 0.95);
    assert_eq!(params.z_offset, 0.0);
    assert_eq!(params.quilts_num, 4);
}

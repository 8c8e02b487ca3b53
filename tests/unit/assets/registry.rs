use super::*;
use base64::Engine as _;

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "overlay_gfx_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn bundle_asset(id: &str, mime: &str, bytes: &[u8]) -> BundleAsset {
    BundleAsset {
        asset_id: id.to_string(),
        name: format!("{id}.bin"),
        mime: mime.to_string(),
        data_base64: Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
    }
}

#[test]
fn store_and_get_round_trip() {
    let dir = temp_dir("registry_round_trip");
    let mut registry = AssetRegistry::new(&dir);
    registry.initialize().unwrap();

    let asset = bundle_asset("logo_1", "image/png", b"fake-png-bytes");
    let record = registry.store_asset(&asset).unwrap();
    assert_eq!(record.size, b"fake-png-bytes".len() as u64);
    assert!(record.file_path.to_string_lossy().ends_with(".png"));

    let fetched = registry.get_asset("logo_1").unwrap();
    assert_eq!(fetched.asset_id, "logo_1");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_manifest_resets_to_empty_without_error() {
    let dir = temp_dir("registry_missing_manifest");
    let mut registry = AssetRegistry::new(&dir);
    assert!(registry.initialize().is_ok());
    assert!(registry.get_asset("nope").is_none());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn corrupt_manifest_resets_to_empty_without_error() {
    let dir = temp_dir("registry_corrupt_manifest");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("assets.json"), b"{ not json").unwrap();

    let mut registry = AssetRegistry::new(&dir);
    assert!(registry.initialize().is_ok());
    assert!(registry.get_asset("nope").is_none());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn store_asset_without_payload_and_no_existing_record_fails() {
    let dir = temp_dir("registry_no_payload");
    let mut registry = AssetRegistry::new(&dir);
    registry.initialize().unwrap();

    let asset = BundleAsset {
        asset_id: "missing".to_string(),
        name: "missing.bin".to_string(),
        mime: "application/octet-stream".to_string(),
        data_base64: None,
    };
    let err = registry.store_asset(&asset).unwrap_err();
    assert!(matches!(err, GraphicsError::AssetNotFound(_)));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn store_asset_without_payload_but_existing_record_returns_it() {
    let dir = temp_dir("registry_reuse_existing");
    let mut registry = AssetRegistry::new(&dir);
    registry.initialize().unwrap();
    registry
        .store_asset(&bundle_asset("logo_1", "image/png", b"bytes"))
        .unwrap();

    let asset = BundleAsset {
        asset_id: "logo_1".to_string(),
        name: "logo_1".to_string(),
        mime: "image/png".to_string(),
        data_base64: None,
    };
    let record = registry.store_asset(&asset).unwrap();
    assert_eq!(record.asset_id, "logo_1");
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn s5_single_asset_over_cap_is_too_large() {
    let dir = temp_dir("registry_too_large");
    let mut registry = AssetRegistry::new(&dir);
    registry.initialize().unwrap();

    let big = vec![0u8; (MAX_ASSET_BYTES + 1) as usize];
    let err = registry
        .store_asset(&bundle_asset("huge", "application/octet-stream", &big))
        .unwrap_err();
    assert!(matches!(err, GraphicsError::AssetTooLarge(_)));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn s5_total_cap_rejects_before_disk_write() {
    let dir = temp_dir("registry_total_cap");
    let mut registry = AssetRegistry::new(&dir);
    registry.initialize().unwrap();

    // Fill most of the cap with assets just under the per-item cap.
    let chunk = vec![0u8; 9 * 1024 * 1024];
    let mut stored = 0u64;
    let mut i = 0;
    while stored + chunk.len() as u64 <= MAX_REGISTRY_BYTES {
        let id = format!("chunk_{i}");
        registry
            .store_asset(&bundle_asset(&id, "application/octet-stream", &chunk))
            .unwrap();
        stored += chunk.len() as u64;
        i += 1;
    }

    let remaining = MAX_REGISTRY_BYTES - stored;
    let overflow = vec![0u8; remaining as usize + 1];
    let before = dir.join("overflow.bin");
    let err = registry
        .store_asset(&bundle_asset("overflow", "application/octet-stream", &overflow))
        .unwrap_err();
    assert!(matches!(err, GraphicsError::RegistryFull));
    assert!(!before.exists());

    std::fs::remove_dir_all(&dir).ok();
}

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::foundation::atomic_write::write_json_atomic;
use crate::foundation::error::{GraphicsError, GraphicsResult};
use crate::model::BundleAsset;

/// Per-asset size cap: 10 MiB (`spec.md` §3).
pub const MAX_ASSET_BYTES: u64 = 10 * 1024 * 1024;
/// Total registry size cap: 100 MiB (`spec.md` §3).
pub const MAX_REGISTRY_BYTES: u64 = 100 * 1024 * 1024;

const MANIFEST_FILE: &str = "assets.json";

/// A stored asset's durable record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetRecord {
    pub asset_id: String,
    pub name: String,
    pub mime: String,
    pub size: u64,
    pub file_path: PathBuf,
    pub created_at: u64,
}

#[derive(Default, Serialize, Deserialize)]
struct Manifest {
    #[serde(default)]
    assets: BTreeMap<String, AssetRecord>,
}

/// Content-addressed-by-id store of referenced media on disk, with a durable JSON manifest.
///
/// Grounded on the teacher's `assets::store` module shape (prepared-asset cache owned by the
/// session); the manifest persistence and size-cap enforcement are new plumbing this spec
/// requires that the teacher's in-memory asset cache never needed.
pub struct AssetRegistry {
    dir: PathBuf,
    assets: BTreeMap<String, AssetRecord>,
}

impl AssetRegistry {
    /// Construct a registry rooted at `dir` without touching disk yet; call [`Self::initialize`]
    /// before use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            assets: BTreeMap::new(),
        }
    }

    /// Create the asset directory and load the manifest.
    ///
    /// A missing or corrupt manifest resets in-memory state to empty rather than propagating an
    /// error, per `spec.md` §4.3.
    pub fn initialize(&mut self) -> GraphicsResult<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| anyhow::anyhow!("create asset dir {}: {e}", self.dir.display()))?;

        match std::fs::read(self.manifest_path()) {
            Ok(bytes) => match serde_json::from_slice::<Manifest>(&bytes) {
                Ok(manifest) => self.assets = manifest.assets,
                Err(_) => self.assets = BTreeMap::new(),
            },
            Err(_) => self.assets = BTreeMap::new(),
        }
        Ok(())
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Current total size across all stored assets.
    pub fn total_size(&self) -> u64 {
        self.assets.values().map(|a| a.size).sum()
    }

    /// Look up a stored record by id.
    pub fn get_asset(&self, id: &str) -> Option<&AssetRecord> {
        self.assets.get(id)
    }

    /// Snapshot of `id -> {filePath, mime}` for pushing to the renderer (`spec.md` §4.6).
    pub fn asset_map(&self) -> BTreeMap<String, (PathBuf, String)> {
        self.assets
            .iter()
            .map(|(id, record)| (id.clone(), (record.file_path.clone(), record.mime.clone())))
            .collect()
    }

    /// Store (or overwrite) an asset.
    ///
    /// Fails with [`GraphicsError::AssetNotFound`] if no payload is supplied and no record already
    /// exists for `asset.asset_id`. Enforces the per-item and total size caps before any disk
    /// write, then rewrites the manifest atomically.
    pub fn store_asset(&mut self, asset: &BundleAsset) -> GraphicsResult<AssetRecord> {
        let Some(data_base64) = asset.data_base64.as_deref() else {
            return self
                .assets
                .get(&asset.asset_id)
                .cloned()
                .ok_or_else(|| GraphicsError::AssetNotFound(asset.asset_id.clone()));
        };

        let bytes = decode_base64_payload(data_base64)
            .map_err(|e| GraphicsError::invalid_payload(format!("asset payload: {e}")))?;
        let size = bytes.len() as u64;

        if size > MAX_ASSET_BYTES {
            return Err(GraphicsError::AssetTooLarge(format!(
                "{size} bytes (cap {MAX_ASSET_BYTES} bytes)"
            )));
        }

        let previous_size = self.assets.get(&asset.asset_id).map(|a| a.size).unwrap_or(0);
        let total_after = self.total_size().saturating_sub(previous_size) + size;
        if total_after > MAX_REGISTRY_BYTES {
            return Err(GraphicsError::RegistryFull);
        }

        let ext = extension_for_mime(&asset.mime);
        let file_name = format!("{}{ext}", asset.asset_id);
        let file_path = self.dir.join(&file_name);
        std::fs::write(&file_path, &bytes)
            .map_err(|e| anyhow::anyhow!("write asset {}: {e}", file_path.display()))?;

        let record = AssetRecord {
            asset_id: asset.asset_id.clone(),
            name: asset.name.clone(),
            mime: asset.mime.clone(),
            size,
            file_path,
            created_at: now_ms(),
        };
        self.assets.insert(asset.asset_id.clone(), record.clone());
        self.persist_manifest()?;

        Ok(record)
    }

    fn persist_manifest(&self) -> GraphicsResult<()> {
        write_json_atomic(
            &self.manifest_path(),
            &Manifest {
                assets: self.assets.clone(),
            },
        )
    }
}

/// Decode a base64 asset payload, tolerating a `base64,` data-URL preamble.
fn decode_base64_payload(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match data.rfind("base64,") {
        Some(idx) => &data[idx + "base64,".len()..],
        None => data,
    };
    base64::engine::general_purpose::STANDARD.decode(payload)
}

/// Deterministic MIME-to-extension mapping with a `.bin` fallback.
fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/png" => ".png",
        "image/jpeg" => ".jpg",
        "image/webp" => ".webp",
        "image/gif" => ".gif",
        "image/svg+xml" => ".svg",
        "video/mp4" => ".mp4",
        "font/woff2" => ".woff2",
        "font/woff" => ".woff",
        "font/ttf" => ".ttf",
        _ => ".bin",
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "../../tests/unit/assets/registry.rs"]
mod tests;

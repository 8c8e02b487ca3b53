use std::path::Path;

use crate::foundation::error::GraphicsResult;

/// Serialize `value` to JSON and durably replace `path`'s contents.
///
/// Writes to `<path>.tmp` first, then `fs::rename`s over the destination. On POSIX filesystems a
/// rename onto an existing path is atomic, so a reader never observes a partially written
/// manifest. This is the "durable truth, rewritten atomically" contract `spec.md` §4.3 and §4.4
/// both require of the asset manifest and the output config file.
pub(crate) fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> GraphicsResult<()> {
    let tmp_path = tmp_path_for(path);
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| anyhow::anyhow!("serialize {}: {e}", path.display()))?;
    std::fs::write(&tmp_path, &bytes)
        .map_err(|e| anyhow::anyhow!("write {}: {e}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| anyhow::anyhow!("rename {} -> {}: {e}", tmp_path.display(), path.display()))?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/atomic_write.rs"]
mod tests;

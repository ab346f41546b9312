use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{Result, StripError};
use crate::types::CheckpointArtifact;

/// Extension of the model files produced by the trainer.
pub const CHECKPOINT_EXTENSION: &str = ".safetensors";

/// Pull `N` out of `checkpoint-<N>.safetensors`.
///
/// The first `-`-separated token of the stem made only of ASCII digits wins,
/// so `checkpoint-100.safetensors` and `sd3-checkpoint-100.safetensors`
/// both yield 100. Signed tokens such as `+100` do not count. Returns `None`
/// for names without the extension or without a numeric token.
pub fn parse_checkpoint_index(file_name: &str) -> Option<u64> {
    let stem = file_name.strip_suffix(CHECKPOINT_EXTENSION)?;
    stem.split('-')
        .skip(1)
        .filter(|token| !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()))
        .find_map(|token| token.parse::<u64>().ok())
}

fn is_canonical(artifact: &CheckpointArtifact) -> bool {
    artifact.file_name == format!("checkpoint-{}{}", artifact.index, CHECKPOINT_EXTENSION)
}

/// List the checkpoints directly inside `dir`, ascending by index.
///
/// Files without the checkpoint extension are ignored silently; files with
/// the extension but no parsable index are logged and left out. When several
/// files share an index (`checkpoint-100` and `checkpoint-0100`), only one is
/// kept: the `checkpoint-<N>.safetensors` name if present, otherwise the
/// first by name. Failure to list the directory is returned as is, with no
/// partial result.
pub fn scan_checkpoints(dir: &Path) -> Result<Vec<CheckpointArtifact>> {
    info!(dir = %dir.display(), "Scanning checkpoint directory");

    let entries = std::fs::read_dir(dir).map_err(|e| {
        StripError::io(format!("Cannot list checkpoint directory {}", dir.display()), e)
    })?;

    let mut artifacts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            StripError::io(format!("Cannot read entry in {}", dir.display()), e)
        })?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !file_name.ends_with(CHECKPOINT_EXTENSION) {
            continue;
        }
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            debug!(name = %file_name, "Skipping directory with checkpoint extension");
            continue;
        }
        match parse_checkpoint_index(&file_name) {
            Some(index) => artifacts.push(CheckpointArtifact {
                path: entry.path(),
                file_name,
                index,
            }),
            None => warn!(name = %file_name, "No checkpoint index in file name, skipping"),
        }
    }

    artifacts.sort_by(|a, b| {
        a.index
            .cmp(&b.index)
            .then_with(|| is_canonical(b).cmp(&is_canonical(a)))
            .then_with(|| a.file_name.cmp(&b.file_name))
    });
    artifacts.dedup_by(|dropped, kept| {
        let duplicate = dropped.index == kept.index;
        if duplicate {
            warn!(
                name = %dropped.file_name,
                kept = %kept.file_name,
                index = kept.index,
                "Duplicate checkpoint index, skipping"
            );
        }
        duplicate
    });

    info!(
        found = ?artifacts.iter().map(|a| a.file_name.as_str()).collect::<Vec<_>>(),
        "Found checkpoints"
    );
    Ok(artifacts)
}

/// Name of the directory the checkpoints live in, used in model references.
pub fn folder_name(dir: &Path) -> String {
    dir.components()
        .next_back()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_checkpoint_index("checkpoint-100.safetensors"), Some(100));
        assert_eq!(parse_checkpoint_index("checkpoint-0.safetensors"), Some(0));
        assert_eq!(parse_checkpoint_index("sd3-checkpoint-42.safetensors"), Some(42));
    }

    #[test]
    fn test_parse_index_rejects() {
        assert_eq!(parse_checkpoint_index("checkpoint-final.safetensors"), None);
        assert_eq!(parse_checkpoint_index("model.safetensors"), None);
        assert_eq!(parse_checkpoint_index("checkpoint-100.ckpt"), None);
        assert_eq!(parse_checkpoint_index("checkpoint-.safetensors"), None);
        assert_eq!(parse_checkpoint_index("checkpoint-+5.safetensors"), None);
        assert_eq!(parse_checkpoint_index("checkpoint- 5.safetensors"), None);
    }

    #[test]
    fn test_parse_index_leading_zero() {
        assert_eq!(parse_checkpoint_index("checkpoint-0100.safetensors"), Some(100));
    }

    #[test]
    fn test_scan_drops_duplicate_indices() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "checkpoint-0100.safetensors",
            "checkpoint-100.safetensors",
            "checkpoint-+100.safetensors",
            "checkpoint-00200.safetensors",
            "checkpoint-0200.safetensors",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let found = scan_checkpoints(dir.path()).unwrap();
        let names: Vec<&str> = found.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["checkpoint-100.safetensors", "checkpoint-00200.safetensors"]
        );
    }

    #[test]
    fn test_scan_sorts_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "checkpoint-1000.safetensors",
            "checkpoint-20.safetensors",
            "checkpoint-300.safetensors",
            "checkpoint-3.safetensors",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let found = scan_checkpoints(dir.path()).unwrap();
        let indices: Vec<u64> = found.iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![3, 20, 300, 1000]);
        assert_eq!(found[0].file_name, "checkpoint-3.safetensors");
        assert_eq!(found[0].path, dir.path().join("checkpoint-3.safetensors"));
    }

    #[test]
    fn test_scan_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("checkpoint-5.safetensors"), b"").unwrap();
        fs::write(dir.path().join("README.md"), b"").unwrap();
        fs::write(dir.path().join("optimizer.pt"), b"").unwrap();
        fs::write(dir.path().join("checkpoint-latest.safetensors"), b"").unwrap();
        fs::create_dir(dir.path().join("checkpoint-9.safetensors")).unwrap();

        let found = scan_checkpoints(dir.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 5);
    }

    #[test]
    fn test_scan_missing_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            scan_checkpoints(&missing),
            Err(StripError::Io { .. })
        ));
    }

    #[test]
    fn test_folder_name() {
        assert_eq!(folder_name(Path::new("/train/sd3-run")), "sd3-run");
        assert_eq!(folder_name(Path::new("/train/sd3-run/")), "sd3-run");
        assert_eq!(folder_name(&PathBuf::from("relative")), "relative");
    }
}

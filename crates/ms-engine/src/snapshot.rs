//! Project snapshot: one markdown bundle of the source tree that can be
//! uploaded to a language model. Memory logs and build output are left out.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use crate::error::Result;

const SNAPSHOT_PREFIX: &str = "morningstar_snapshot_";

const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "target",
    "venv",
    ".venv",
    "__pycache__",
    "logs",
    "node_modules",
];

const INCLUDED_EXTENSIONS: &[&str] = &["rs", "md", "txt", "json", "toml", "yaml", "yml"];

pub struct Snapshot {
    pub path: PathBuf,
    /// Included files, relative to the project root, in bundle order.
    pub files: Vec<PathBuf>,
}

/// Write a snapshot bundle into `root` and return where it went.
pub fn create_snapshot(root: &Path) -> Result<Snapshot> {
    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S");
    let path = root.join(format!("{SNAPSHOT_PREFIX}{timestamp}.md"));
    info!("Creating snapshot of {} at {}", root.display(), path.display());

    let mut candidates = Vec::new();
    collect_files(root, root, &mut candidates)?;
    candidates.sort();

    let mut bundle = format!(
        "# Morningstar snapshot\n\nRoot: `{}`\nCreated: {}\n",
        root.display(),
        Utc::now().to_rfc3339()
    );
    let mut files = Vec::with_capacity(candidates.len());

    for relative in candidates {
        let contents = match std::fs::read_to_string(root.join(&relative)) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                debug!("Skipping non-UTF-8 file {}", relative.display());
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let fence = fence_for(&contents);
        let language = relative
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        bundle.push_str(&format!(
            "\n## {}\n\n{fence}{language}\n{}{}{fence}\n",
            relative.display(),
            contents,
            if contents.ends_with('\n') { "" } else { "\n" },
        ));
        files.push(relative);
    }

    std::fs::write(&path, bundle)?;
    info!("Snapshot written with {} files", files.len());
    Ok(Snapshot { path, files })
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if file_type.is_dir() {
            if !EXCLUDED_DIRS.contains(&name.as_str()) {
                collect_files(root, &path, out)?;
            }
        } else if file_type.is_file() && should_include(&path) {
            if let Ok(relative) = path.strip_prefix(root) {
                out.push(relative.to_path_buf());
            }
        }
    }
    Ok(())
}

fn should_include(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    if name.starts_with(SNAPSHOT_PREFIX) {
        return false;
    }
    if name == ".gitignore" {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| INCLUDED_EXTENSIONS.contains(&ext))
}

/// A backtick fence longer than any backtick run inside `contents`.
fn fence_for(contents: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in contents.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat(longest.max(2) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn includes_sources_and_skips_private_and_build_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "Cargo.toml", b"[workspace]\n");
        write(root, "crates/app/src/main.rs", b"fn main() {}\n");
        write(root, "config/mind_seed.json", b"{}");
        write(root, ".gitignore", b"target\n");
        write(root, "memory/episodes.jsonl", b"{\"id\":\"ep1\"}\n");
        write(root, "target/debug/build.rs", b"// generated\n");
        write(root, ".git/HEAD.txt", b"ref\n");
        write(root, "logo.png", &[0x89, 0x50, 0x4e, 0x47]);
        write(root, "morningstar_snapshot_old.md", b"# old\n");

        let snapshot = create_snapshot(root).unwrap();

        let files: Vec<String> = snapshot
            .files
            .iter()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(
            files,
            vec![
                ".gitignore",
                "Cargo.toml",
                "config/mind_seed.json",
                "crates/app/src/main.rs",
            ]
        );

        let bundle = std::fs::read_to_string(&snapshot.path).unwrap();
        assert!(bundle.contains("fn main() {}"));
        assert!(!bundle.contains("ep1"));
        assert!(!bundle.contains("generated"));
        assert!(snapshot
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(SNAPSHOT_PREFIX));
    }

    #[test]
    fn skips_non_utf8_text_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "notes.txt", &[0xff, 0xfe, 0x00]);
        write(dir.path(), "README.md", b"hello\n");

        let snapshot = create_snapshot(dir.path()).unwrap();
        assert_eq!(snapshot.files, vec![PathBuf::from("README.md")]);
    }

    #[test]
    fn fence_outgrows_embedded_fences() {
        assert_eq!(fence_for("plain"), "```");
        assert_eq!(fence_for("```rust\n```"), "````");
        assert_eq!(fence_for("`````"), "``````");
    }
}

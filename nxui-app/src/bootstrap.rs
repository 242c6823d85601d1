use anyhow::{Context, Result};
use std::path::Path;

/// Demo widgets compiled into the binary, as (relative path, contents).
pub const BUNDLED_WIDGETS: &[(&str, &str)] = &[
    ("clock/widget.rhai", include_str!("../widgets/clock/widget.rhai")),
    ("clock/template.html", include_str!("../widgets/clock/template.html")),
    ("clock/styles.css", include_str!("../widgets/clock/styles.css")),
    ("greeting/widget.rhai", include_str!("../widgets/greeting/widget.rhai")),
    ("notes/widget.rhai", include_str!("../widgets/notes/widget.rhai")),
    ("notes/template.html", include_str!("../widgets/notes/template.html")),
    ("notes/styles.css", include_str!("../widgets/notes/styles.css")),
    (
        "system-monitor/widget.rhai",
        include_str!("../widgets/system-monitor/widget.rhai"),
    ),
    (
        "system-monitor/styles.css",
        include_str!("../widgets/system-monitor/styles.css"),
    ),
];

fn has_visible_entries(dir: &Path) -> Result<bool> {
    for entry in std::fs::read_dir(dir)? {
        if !entry?.file_name().to_string_lossy().starts_with('.') {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Make sure the widgets directory exists and seed it with the demo widgets
/// if it is empty. Returns how many files were written.
pub fn prepare_widgets_dir(dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create widgets directory {}", dir.display()))?;
    if has_visible_entries(dir)? {
        return Ok(0);
    }

    // Companions first so a watcher never sees an entry without them.
    let mut files: Vec<&(&str, &str)> = BUNDLED_WIDGETS.iter().collect();
    files.sort_by_key(|(path, _)| path.ends_with(".rhai"));

    for (relative, contents) in &files {
        let target = dir.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, contents)
            .with_context(|| format!("Failed to write {}", target.display()))?;
    }
    tracing::info!("Seeded {} with {} bundled files", dir.display(), files.len());
    Ok(files.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_seeds_empty_directory_once() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("widgets");

        assert_eq!(prepare_widgets_dir(&dir).unwrap(), BUNDLED_WIDGETS.len());
        assert!(dir.join("clock").join("widget.rhai").is_file());
        assert!(dir.join("system-monitor").join("styles.css").is_file());
        assert_eq!(prepare_widgets_dir(&dir).unwrap(), 0);
    }

    #[test]
    fn test_leaves_user_widgets_alone() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("mine.widget.rhai"), "").unwrap();
        assert_eq!(prepare_widgets_dir(temp.path()).unwrap(), 0);
        assert!(!temp.path().join("clock").exists());
    }

    #[test]
    fn test_hidden_files_do_not_count() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".DS_Store"), "").unwrap();
        assert!(prepare_widgets_dir(temp.path()).unwrap() > 0);
    }
}

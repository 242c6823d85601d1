use nxui_core::{WidgetError, WidgetResult};
use std::fs;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use zip::ZipArchive;

fn install_error(context: &str, e: impl std::fmt::Display) -> WidgetError {
    WidgetError::Install(format!("{context}: {e}"))
}

/// Top-level directory shared by every entry, if the archive wraps its content in one.
fn shared_prefix(names: &[(PathBuf, bool)]) -> Option<PathBuf> {
    let mut prefix: Option<&std::ffi::OsStr> = None;
    let mut nested = false;
    for (name, is_dir) in names {
        let mut components = name.components();
        let first = match components.next() {
            Some(Component::Normal(first)) => first,
            _ => return None,
        };
        let has_rest = components.next().is_some();
        if !has_rest && !is_dir {
            return None;
        }
        nested |= has_rest;
        match prefix {
            None => prefix = Some(first),
            Some(existing) if existing == first => {}
            Some(_) => return None,
        }
    }
    prefix.filter(|_| nested).map(PathBuf::from)
}

/// Extract a widget zip into `target`. Returns the number of files written.
///
/// Entries with unsafe names are skipped. A single wrapping directory is
/// stripped so `clock/widget.rhai` and `widget.rhai` install the same way.
pub fn extract_widget_archive(bytes: &[u8], target: &Path) -> WidgetResult<usize> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| install_error("invalid archive", e))?;

    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive
            .by_index(i)
            .map_err(|e| install_error("unreadable archive entry", e))?;
        match file.enclosed_name() {
            Some(path) => names.push((Some(path.to_path_buf()), file.is_dir())),
            None => {
                tracing::warn!("Skipping unsafe archive entry '{}'", file.name());
                names.push((None, false));
            }
        }
    }
    let safe: Vec<(PathBuf, bool)> = names
        .iter()
        .filter_map(|(name, is_dir)| name.clone().map(|n| (n, *is_dir)))
        .collect();
    let prefix = shared_prefix(&safe);

    fs::create_dir_all(target).map_err(|e| install_error("cannot create widget directory", e))?;

    let mut written = 0;
    for (i, (name, is_dir)) in names.into_iter().enumerate() {
        let Some(name) = name else { continue };
        let relative = match &prefix {
            Some(prefix) => name.strip_prefix(prefix).unwrap_or(&name).to_path_buf(),
            None => name,
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let out = target.join(&relative);
        if is_dir {
            fs::create_dir_all(&out).map_err(|e| install_error("cannot create directory", e))?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(|e| install_error("cannot create directory", e))?;
        }

        let mut file = archive
            .by_index(i)
            .map_err(|e| install_error("unreadable archive entry", e))?;
        let mut outfile =
            fs::File::create(&out).map_err(|e| install_error("cannot create file", e))?;
        std::io::copy(&mut file, &mut outfile).map_err(|e| install_error("cannot write file", e))?;
        written += 1;
    }

    Ok(written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_wrapping_directory_is_stripped() {
        let temp = TempDir::new().unwrap();
        let bytes = build_zip(&[
            ("weather-main/widget.rhai", "entry"),
            ("weather-main/styles.css", "css"),
        ]);
        let target = temp.path().join("weather");

        assert_eq!(extract_widget_archive(&bytes, &target).unwrap(), 2);
        assert_eq!(fs::read_to_string(target.join("widget.rhai")).unwrap(), "entry");
        assert!(target.join("styles.css").is_file());
    }

    #[test]
    fn test_flat_archive_is_kept_as_is() {
        let temp = TempDir::new().unwrap();
        let bytes = build_zip(&[("widget.rhai", "entry"), ("assets/icon.svg", "<svg/>")]);
        let target = temp.path().join("flat");

        extract_widget_archive(&bytes, &target).unwrap();
        assert!(target.join("widget.rhai").is_file());
        assert!(target.join("assets").join("icon.svg").is_file());
    }

    #[test]
    fn test_escaping_entries_are_skipped() {
        let temp = TempDir::new().unwrap();
        let bytes = build_zip(&[("../evil.txt", "x"), ("widget.rhai", "entry")]);
        let target = temp.path().join("w");

        assert_eq!(extract_widget_archive(&bytes, &target).unwrap(), 1);
        assert!(!temp.path().join("evil.txt").exists());
    }

    #[test]
    fn test_garbage_is_install_error() {
        let temp = TempDir::new().unwrap();
        let err = extract_widget_archive(b"not a zip", &temp.path().join("w")).unwrap_err();
        assert!(err.to_string().starts_with("Installation failed"));
    }
}

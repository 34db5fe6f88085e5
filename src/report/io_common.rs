use std::io::Write;

use tempfile::NamedTempFile;

use crate::report::*;

/// Replaces the content of `path` in one step: the data goes to a temporary
/// file of the same directory, which is then renamed. Readers never see a
/// partially written file, and a failure leaves the previous file in place.
pub fn write_atomic(path: &str, contents: &[u8]) -> ReportResult<()> {
    let target = Path::new(path);
    let dir = match target.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).context(WritingOutputSnafu { path })?;
    tmp.write_all(contents)
        .context(WritingOutputSnafu { path })?;
    tmp.as_file()
        .sync_all()
        .context(WritingOutputSnafu { path })?;
    tmp.persist(target)
        .context(PersistingOutputSnafu { path })?;
    debug!("write_atomic: {} bytes to {:?}", contents.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_the_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("counts.json");
        let path = p.to_str().unwrap();
        fs::write(&p, "old").unwrap();
        write_atomic(path, b"{\"date\":\"new\"}").unwrap();
        assert_eq!(fs::read_to_string(&p).unwrap(), "{\"date\":\"new\"}");
        // No temporary file left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("missing").join("counts.json");
        let res = write_atomic(p.to_str().unwrap(), b"{}");
        assert!(matches!(res, Err(ReportError::WritingOutput { .. })));
        assert!(!p.exists());
    }
}

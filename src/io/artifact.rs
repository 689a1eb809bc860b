//! The single durable output of a run.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Write the artifact file: final code block, then final test block, each
/// followed by a newline. Overwrites any previous run's artifact.
///
/// Written best-effort: either block may be absent when a phase exhausted its
/// budget without extracting code.
pub fn write_artifact(path: &Path, code: Option<&str>, test_code: Option<&str>) -> Result<()> {
    let mut payload = String::new();
    payload.push_str(code.unwrap_or_default());
    payload.push('\n');
    payload.push_str(test_code.unwrap_or_default());
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write artifact {}", path.display()))?;
    debug!(path = %path.display(), "artifact written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_code_then_test_with_newlines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("generated.py");
        write_artifact(&path, Some("def f():\n    return 1"), Some("def test_f():\n    assert f() == 1"))
            .expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(
            contents,
            "def f():\n    return 1\ndef test_f():\n    assert f() == 1\n"
        );
    }

    #[test]
    fn overwrites_previous_artifact() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("generated.py");
        write_artifact(&path, Some("old"), Some("old_test")).expect("write");
        write_artifact(&path, Some("new"), None).expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "new\n\n");
    }
}

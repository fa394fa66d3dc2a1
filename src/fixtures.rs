//! Loading of bundled HTML fixtures.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;
use url::Url;

use crate::error::{Error, Result};

/// A fixture read from disk together with the base URI used to resolve relative references.
#[derive(Clone, Debug)]
pub struct Fixture {
    name: String,
    html: String,
    base_uri: String,
}

impl Fixture {
    /// Creates a fixture from in-memory HTML.
    pub fn new(name: impl Into<String>, html: impl Into<String>, base_uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            html: html.into(),
            base_uri: base_uri.into(),
        }
    }

    /// Identifier of the fixture, without the `.html` suffix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// HTML source.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// `file://` URL of the directory the fixture was loaded from.
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }
}

/// Path of the fixture `name` inside `dir`.
pub fn fixture_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.html"))
}

/// Returns the `file://` URL of `dir`, with a trailing slash so relative joins stay inside it.
pub fn base_uri_for(dir: &Path) -> String {
    let absolute = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
    Url::from_directory_path(&absolute)
        .map(String::from)
        .unwrap_or_else(|()| format!("file://{}/", absolute.display()))
}

/// Reads `<dir>/<name>.html`.
///
/// Invalid UTF-8 is replaced and reported as a warning.
pub fn load(dir: &Path, name: &str) -> Result<Fixture> {
    let path = fixture_path(dir, name);
    let bytes = fs::read(&path).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            Error::FixtureNotFound {
                name: name.to_owned(),
                path: path.clone(),
            }
        } else {
            Error::io(format!("Failed to read test case {}", path.display()), err)
        }
    })?;

    let html = match String::from_utf8(bytes) {
        Ok(html) => html,
        Err(err) => {
            warn!(
                "Test case {} is not valid UTF-8; invalid sequences were replaced",
                path.display()
            );
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    };

    Ok(Fixture::new(name, html, base_uri_for(dir)))
}

/// Lists the fixture names available in `dir`, sorted alphabetically.
pub fn available(dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir)
        .map_err(|err| Error::io(format!("Failed to list test cases in {}", dir.display()), err))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|err| Error::io(format!("Failed to list {}", dir.display()), err))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("html") {
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_owned());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_bundled_fixture() {
        let dir = crate::config::bundled_fixtures_dir();
        let fixture = load(&dir, "color").expect("color fixture is bundled");
        assert_eq!(fixture.name(), "color");
        assert!(fixture.html().contains("<html"));
        assert!(fixture.base_uri().starts_with("file://"));
        assert!(fixture.base_uri().ends_with('/'));
    }

    #[test]
    fn missing_fixture_is_reported_by_name() {
        let dir = crate::config::bundled_fixtures_dir();
        match load(&dir, "does-not-exist") {
            Err(Error::FixtureNotFound { name, path }) => {
                assert_eq!(name, "does-not-exist");
                assert!(path.ends_with("does-not-exist.html"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn lists_bundled_fixtures() {
        let names = available(&crate::config::bundled_fixtures_dir()).expect("list fixtures");
        assert!(names.contains(&"custom-objects".to_string()));
        assert!(names.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}

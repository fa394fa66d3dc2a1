//! Font discovery shared by the PDF builder and the rasterizer.
//!
//! Both back ends use the same family so that the PDF and the PNG of a fixture wrap text the same
//! way.  Roboto is preferred and DejaVu Sans, which ships in `assets/fonts`, is used when Roboto is
//! absent.  Directories are searched in `TESTCASES_FONTS_DIR`, next to the executable and in the
//! crate's `assets/fonts` directory, in that order.  When none of them holds either family, the
//! Windows Arial family is used instead and a warning is logged.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::error::{Error, ErrorKind};
use genpdf::fonts::{self, FontData, FontFamily};
use log::warn;

/// Name of the preferred font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

/// Environment variable pointing at a directory with the font files.
pub const FONTS_DIR_VAR: &str = "TESTCASES_FONTS_DIR";

/// Environment variable overriding the Windows font directory used for the fallback family.
pub const WINDOWS_FONTS_DIR_VAR: &str = "TESTCASES_WINDOWS_FONTS_DIR";

const FONT_FILES: [&str; 4] = [
    "Roboto-Regular.ttf",
    "Roboto-Bold.ttf",
    "Roboto-Italic.ttf",
    "Roboto-BoldItalic.ttf",
];

const DEJAVU_FONT_FILES: [&str; 4] = [
    "DejaVuSans.ttf",
    "DejaVuSans-Bold.ttf",
    "DejaVuSans-Oblique.ttf",
    "DejaVuSans-BoldOblique.ttf",
];

/// Families looked up in every font directory, in order of preference.
const BUNDLED_FAMILIES: [[&str; 4]; 2] = [FONT_FILES, DEJAVU_FONT_FILES];

const WINDOWS_FALLBACK_FAMILY_NAME: &str = "Arial";

const WINDOWS_FONT_FILES: [&str; 4] = ["arial.ttf", "arialbd.ttf", "ariali.ttf", "arialbi.ttf"];

/// Paths of the four faces of a family, in regular, bold, italic, bold italic order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontFiles {
    /// Regular face.
    pub regular: PathBuf,
    /// Bold face.
    pub bold: PathBuf,
    /// Italic face.
    pub italic: PathBuf,
    /// Bold italic face.
    pub bold_italic: PathBuf,
}

impl FontFiles {
    fn in_directory(directory: &Path, names: [&str; 4]) -> Self {
        Self {
            regular: directory.join(names[0]),
            bold: directory.join(names[1]),
            italic: directory.join(names[2]),
            bold_italic: directory.join(names[3]),
        }
    }

    /// Reads all four faces into memory.
    pub fn read(&self) -> Result<FontBytes, Error> {
        let read = |path: &Path| {
            fs::read(path).map_err(|err| {
                Error::new(format!("Failed to read font file {}", path.display()), err)
            })
        };
        Ok(FontBytes {
            regular: read(&self.regular)?,
            bold: read(&self.bold)?,
            italic: read(&self.italic)?,
            bold_italic: read(&self.bold_italic)?,
        })
    }
}

/// Raw TrueType data of a family, used by the rasterizer.
#[derive(Clone, Debug)]
pub struct FontBytes {
    /// Regular face.
    pub regular: Vec<u8>,
    /// Bold face.
    pub bold: Vec<u8>,
    /// Italic face.
    pub italic: Vec<u8>,
    /// Bold italic face.
    pub bold_italic: Vec<u8>,
}

/// Directory of the fonts shipped next to the crate manifest.
pub fn bundled_fonts_source_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts")
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var).and_then(|value| {
        let path = PathBuf::from(value);
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    })
}

fn font_directory_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = env_path(FONTS_DIR_VAR) {
        candidates.push(path);
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            let candidate = bin_dir.join("assets/fonts");
            if !candidates.iter().any(|existing| existing == &candidate) {
                candidates.push(candidate);
            }
        }
    }

    let manifest_candidate = bundled_fonts_source_dir();
    if !candidates
        .iter()
        .any(|existing| existing == &manifest_candidate)
    {
        candidates.push(manifest_candidate);
    }

    candidates
}

fn missing_font_files(path: &Path, names: [&str; 4]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| path.join(name))
        .filter(|candidate| !candidate.is_file())
        .collect()
}

fn resolve_bundled_files() -> Result<FontFiles, Error> {
    let mut attempts = Vec::new();

    for candidate in font_directory_candidates() {
        let exists = candidate.is_dir();
        if exists {
            if let Some(names) = BUNDLED_FAMILIES
                .into_iter()
                .find(|names| missing_font_files(&candidate, *names).is_empty())
            {
                return Ok(FontFiles::in_directory(&candidate, names));
            }
        }
        let missing = missing_font_files(&candidate, FONT_FILES);

        let reason = if !exists {
            format!("directory missing at {}", candidate.display())
        } else {
            let missing_list = missing
                .iter()
                .map(|path| path.file_name().unwrap_or_default().to_string_lossy())
                .collect::<Vec<_>>()
                .join(", ");
            format!("missing files [{}]", missing_list)
        };

        attempts.push(format!("{} ({})", candidate.display(), reason));
    }

    let summary = if attempts.is_empty() {
        "no search paths were available".to_owned()
    } else {
        attempts.join(", ")
    };

    Err(Error::new(
        format!(
            "Unable to locate bundled font directory. Checked: {}. See assets/fonts/README.md or set {}.",
            summary, FONTS_DIR_VAR
        ),
        io::Error::new(io::ErrorKind::NotFound, "bundled fonts directory not found"),
    ))
}

fn windows_font_directory() -> Option<PathBuf> {
    if let Some(path) = env_path(WINDOWS_FONTS_DIR_VAR) {
        return Some(path);
    }

    #[cfg(windows)]
    {
        for var in ["WINDIR", "SystemRoot"] {
            if let Some(root) = env_path(var) {
                let candidate = root.join("Fonts");
                if candidate.is_dir() {
                    return Some(candidate);
                }
            }
        }
    }

    None
}

fn windows_fallback_files() -> Result<FontFiles, Error> {
    let directory = windows_font_directory().ok_or_else(|| {
        Error::new(
            "Windows font directory not found for fallback",
            io::Error::new(io::ErrorKind::NotFound, "windows fonts directory not found"),
        )
    })?;

    let files = FontFiles::in_directory(&directory, WINDOWS_FONT_FILES);
    for path in [&files.regular, &files.bold, &files.italic, &files.bold_italic] {
        if !path.is_file() {
            return Err(Error::new(
                format!("Windows fallback font missing at {}", path.display()),
                io::Error::new(io::ErrorKind::NotFound, "windows font file not found"),
            ));
        }
    }
    Ok(files)
}

fn fonts_missing(err: &Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::IoError(io_err)
            if io_err.kind() == io::ErrorKind::NotFound
                || io_err.kind() == io::ErrorKind::PermissionDenied
    )
}

/// Returns the paths of the Roboto or DejaVu Sans faces, falling back to the Windows Arial family
/// when neither is found.
pub fn default_font_files() -> Result<FontFiles, Error> {
    match resolve_bundled_files() {
        Ok(files) => Ok(files),
        Err(err) if fonts_missing(&err) => match windows_fallback_files() {
            Ok(fallback) => {
                warn!(
                    "Bundled fonts unavailable ({}); falling back to Windows '{}' family.",
                    err, WINDOWS_FALLBACK_FAMILY_NAME
                );
                Ok(fallback)
            }
            Err(fallback_err) => Err(Error::new(
                format!(
                    "Bundled fonts unavailable ({}) and Windows fallback failed: {}",
                    err, fallback_err
                ),
                io::Error::new(io::ErrorKind::NotFound, "default fonts are not available"),
            )),
        },
        Err(err) => Err(err),
    }
}

fn load_face(path: &Path, style: &str) -> Result<FontData, Error> {
    FontData::load(path, None).map_err(|err| {
        let io_kind = if path.is_file() {
            io::ErrorKind::Other
        } else {
            io::ErrorKind::NotFound
        };
        Error::new(
            format!("Failed to load {} font at {}: {}", style, path.display(), err),
            io::Error::new(io_kind, err.to_string()),
        )
    })
}

/// Returns the default family as a `genpdf` font family definition.
pub fn default_font_family() -> Result<FontFamily<FontData>, Error> {
    let files = default_font_files()?;
    if files.regular.file_name().and_then(|name| name.to_str()) == Some(FONT_FILES[0]) {
        if let Some(directory) = files.regular.parent() {
            return fonts::from_files(directory, DEFAULT_FONT_FAMILY_NAME, None).map_err(|err| {
                Error::new(
                    format!(
                        "Failed to load default font family '{}' from {}: {}",
                        DEFAULT_FONT_FAMILY_NAME,
                        directory.display(),
                        err
                    ),
                    io::Error::new(io::ErrorKind::Other, err.to_string()),
                )
            });
        }
    }

    Ok(FontFamily {
        regular: load_face(&files.regular, "regular")?,
        bold: load_face(&files.bold, "bold")?,
        italic: load_face(&files.italic, "italic")?,
        bold_italic: load_face(&files.bold_italic, "bold italic")?,
    })
}

/// Reads the default family into memory for glyph rasterization.
pub fn default_font_bytes() -> Result<FontBytes, Error> {
    default_font_files()?.read()
}

/// Indicates whether a bundled font family can be loaded without the Windows fallback.
pub fn default_fonts_available() -> bool {
    resolve_bundled_files().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_include_the_manifest_directory_once() {
        let candidates = font_directory_candidates();
        let manifest = bundled_fonts_source_dir();
        assert_eq!(candidates.iter().filter(|dir| **dir == manifest).count(), 1);
    }

    #[test]
    fn files_follow_the_face_order() {
        let files = FontFiles::in_directory(Path::new("/fonts"), WINDOWS_FONT_FILES);
        assert_eq!(files.regular, Path::new("/fonts/arial.ttf"));
        assert_eq!(files.bold_italic, Path::new("/fonts/arialbi.ttf"));
    }

    #[test]
    fn missing_directory_lists_every_file() {
        let missing = missing_font_files(Path::new("/__testcases_no_fonts__"), FONT_FILES);
        assert_eq!(missing.len(), FONT_FILES.len());
    }

    #[test]
    fn shipped_dejavu_family_is_found() {
        for name in DEJAVU_FONT_FILES {
            assert!(bundled_fonts_source_dir().join(name).is_file(), "{name} is not shipped");
        }
        assert!(default_fonts_available());
        let files = default_font_files().expect("bundled family");
        assert!(files.regular.is_file());
        assert!(files.bold_italic.is_file());
    }

    #[test]
    fn shipped_family_loads_for_both_back_ends() {
        let family = default_font_family();
        assert!(family.is_ok(), "{:?}", family.err());
        let bytes = default_font_bytes().expect("font bytes");
        assert!(ttf_parser::Face::parse(&bytes.regular, 0).is_ok());
    }
}

//! Error type shared by the fixture runner and both renderer builders.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::logging::CapturedWarning;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, rendering or writing a test case.
#[derive(Debug)]
pub enum Error {
    /// The requested fixture file does not exist.
    FixtureNotFound {
        /// Name of the fixture without the `.html` suffix.
        name: String,
        /// Path that was probed.
        path: PathBuf,
    },
    /// An I/O operation failed.
    Io {
        /// What the runner was doing when the error occurred.
        context: String,
        /// The underlying error.
        source: io::Error,
    },
    /// `genpdf` failed to lay out or serialize the document.
    Pdf(genpdf::error::Error),
    /// Image decoding or PNG encoding failed.
    Image(image::ImageError),
    /// The rasterizer could not produce a page.
    Raster(String),
    /// A builder was run without a required input.
    MissingInput(&'static str),
    /// The process logger could not be installed.
    Logger(log::SetLoggerError),
    /// The PDF outline could not be written.
    #[cfg(feature = "bookmarks")]
    Bookmarks(crate::bookmarks::BookmarkError),
    /// A warning or error was logged while rendering and warnings were not allowed.
    Warning(CapturedWarning),
}

impl Error {
    /// Wraps an I/O error together with a description of the failed operation.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixtureNotFound { name, path } => {
                write!(f, "Test case '{}' not found at {}", name, path.display())
            }
            Self::Io { context, .. } => write!(f, "{context}"),
            Self::Pdf(err) => write!(f, "PDF rendering failed: {err}"),
            Self::Image(err) => write!(f, "Image processing failed: {err}"),
            Self::Raster(message) => write!(f, "Rasterization failed: {message}"),
            Self::MissingInput(what) => write!(f, "Renderer builder is missing {what}"),
            Self::Logger(err) => write!(f, "Unable to install the warning logger: {err}"),
            #[cfg(feature = "bookmarks")]
            Self::Bookmarks(err) => write!(f, "Failed to add heading bookmarks: {err}"),
            Self::Warning(warning) => write!(f, "{warning}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Pdf(err) => Some(err),
            Self::Image(err) => Some(err),
            Self::Logger(err) => Some(err),
            #[cfg(feature = "bookmarks")]
            Self::Bookmarks(err) => Some(err),
            Self::FixtureNotFound { .. }
            | Self::Raster(_)
            | Self::MissingInput(_)
            | Self::Warning(_) => None,
        }
    }
}

impl From<genpdf::error::Error> for Error {
    fn from(err: genpdf::error::Error) -> Self {
        Self::Pdf(err)
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err)
    }
}

impl From<log::SetLoggerError> for Error {
    fn from(err: log::SetLoggerError) -> Self {
        Self::Logger(err)
    }
}

#[cfg(feature = "bookmarks")]
impl From<crate::bookmarks::BookmarkError> for Error {
    fn from(err: crate::bookmarks::BookmarkError) -> Self {
        Self::Bookmarks(err)
    }
}

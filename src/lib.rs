//! Renders HTML test case fixtures to PDF and PNG and fails a run when the renderer logs a
//! warning.
//!
//! The entry point is [`TestcaseRunner`]: it loads `resources/testcases/<name>.html`, renders the
//! document through [`PdfRendererBuilder`] and [`ImageRendererBuilder`], and turns warnings logged
//! during a render into [`Error::Warning`].  Custom `<object>` elements are painted by
//! [`ObjectDrawer`](drawing::ObjectDrawer)s; [`BinaryTreeDrawer`] is registered for
//! `custom/binary-tree`.

pub mod bidi;
pub mod builder;
pub mod config;
pub mod css;
pub mod drawing;
pub mod elements;
pub mod error;
pub mod fixtures;
pub mod fonts;
pub mod html;
pub mod logging;
pub mod model;
pub mod raster;
pub mod resources;
pub mod richtext;
pub mod runner;
pub mod svg;
pub mod tree;

#[cfg(feature = "bookmarks")]
pub mod bookmarks;

pub use builder::{PdfRendererBuilder, RenderSummary};
pub use config::RunnerConfig;
pub use error::{Error, Result};
pub use raster::{ImageRendererBuilder, ImageType};
pub use runner::{TestCaseOutput, TestcaseRunner, DEFAULT_TEST_CASES};
pub use tree::BinaryTreeDrawer;

//! Test case runner: loads a fixture, renders it and checks the log for warnings.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use log::{info, warn};

use crate::bidi::{TextDirection, UnicodeBidiReorderer, UnicodeBidiSplitter};
use crate::builder::{PdfRendererBuilder, RenderSummary};
use crate::config::{RunnerConfig, LOG_LEVEL_VAR};
use crate::drawing::DefaultObjectDrawerFactory;
use crate::error::{Error, Result};
use crate::fixtures::{self, Fixture};
use crate::logging::{self, CapturedWarning};
use crate::raster::{self, ImageRendererBuilder};
use crate::svg::ResvgDrawer;
use crate::tree::{BinaryTreeDrawer, BINARY_TREE_TYPE};

/// Test cases rendered by [`TestcaseRunner::run_all`], in order.
pub const DEFAULT_TEST_CASES: &[&str] = &[
    "RepeatedTableSample",
    "FSPageBreakMinHeightSample",
    "color",
    "background-color",
    "background-image",
    "invalid-url-background-image",
    "text-align",
    "font-family-built-in",
    "form-controls",
    "svg-inline",
    "moonbase",
    "custom-objects",
];

/// Files written by [`TestcaseRunner::run_test_case`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCaseOutput {
    /// Name of the fixture.
    pub name: String,
    /// Path of the rendered PDF.
    pub pdf: PathBuf,
    /// Path of the rendered first-page PNG.
    pub png: PathBuf,
    /// Number of pages in the PDF.
    pub pages: usize,
}

/// Object drawers available to every test case.
pub fn default_drawer_factory() -> DefaultObjectDrawerFactory {
    let mut factory = DefaultObjectDrawerFactory::new();
    factory.register_drawer(BINARY_TREE_TYPE, BinaryTreeDrawer);
    factory
}

/// Renders fixtures with the configured drawers.
pub struct TestcaseRunner {
    config: RunnerConfig,
    drawers: Arc<DefaultObjectDrawerFactory>,
    svg_drawer: Arc<ResvgDrawer>,
    config_reported: Once,
}

impl TestcaseRunner {
    /// Creates a runner with the default drawers.
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            drawers: Arc::new(default_drawer_factory()),
            svg_drawer: Arc::new(ResvgDrawer::new()),
            config_reported: Once::new(),
        }
    }

    /// Creates a runner configured from the environment, see [`RunnerConfig::from_env`].
    pub fn from_env() -> Self {
        Self::new(RunnerConfig::from_env())
    }

    /// The runner configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn install_logger(&self) -> Result<()> {
        logging::install(self.config.echo_level())?;
        self.config_reported.call_once(|| {
            if let Some(value) = self.config.ignored_log_level() {
                warn!(
                    "Ignoring unknown {} value '{}'; expected off, error, warn, info, debug or trace",
                    LOG_LEVEL_VAR, value
                );
            }
        });
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Fixture> {
        fixtures::load(self.config.fixtures_dir(), name)
    }

    /// Renders `<name>.pdf` and `<name>.png` into the output directory.
    ///
    /// Warnings are echoed but do not fail the run.
    pub fn run_test_case(&self, name: &str) -> Result<TestCaseOutput> {
        self.install_logger()?;
        info!("Trying to run: {}", name);
        let fixture = self.load(name)?;

        let out_dir = self.config.out_dir();
        fs::create_dir_all(out_dir).map_err(|err| {
            Error::io(format!("Failed to create output directory {}", out_dir.display()), err)
        })?;

        let pdf = out_dir.join(format!("{name}.pdf"));
        let file = File::create(&pdf)
            .map_err(|err| Error::io(format!("Failed to create {}", pdf.display()), err))?;
        let summary = self.render_pdf(&fixture, BufWriter::new(file))?;
        info!("Wrote {} ({} pages)", pdf.display(), summary.pages);

        let png = out_dir.join(format!("{name}.png"));
        self.render_png(&fixture, &png)?;
        info!("Wrote {}", png.display());

        Ok(TestCaseOutput {
            name: name.to_owned(),
            pdf,
            png,
            pages: summary.pages,
        })
    }

    /// Renders the PDF into memory and fails with the first warning or error logged meanwhile.
    pub fn run_test_without_output(&self, name: &str) -> Result<()> {
        let warnings = self.run_test_without_output_and_allow_warnings(name)?;
        match warnings.into_iter().next() {
            Some(first) => Err(Error::Warning(first)),
            None => Ok(()),
        }
    }

    /// Renders the PDF into memory and returns the warnings and errors logged meanwhile.
    pub fn run_test_without_output_and_allow_warnings(
        &self,
        name: &str,
    ) -> Result<Vec<CapturedWarning>> {
        self.install_logger()?;
        info!("Trying to run: {}", name);
        let (rendered, warnings) = logging::capture_warnings(|| {
            let fixture = self.load(name)?;
            self.render_pdf(&fixture, std::io::sink())
        });
        rendered?;
        Ok(warnings)
    }

    /// Runs [`run_test_case`](Self::run_test_case) for every entry of [`DEFAULT_TEST_CASES`].
    ///
    /// Stops at the first failure.
    pub fn run_all(&self) -> Result<Vec<TestCaseOutput>> {
        DEFAULT_TEST_CASES
            .iter()
            .map(|name| self.run_test_case(name))
            .collect()
    }

    /// Renders `fixture` as a PDF into `out`.
    pub fn render_pdf(&self, fixture: &Fixture, out: impl Write) -> Result<RenderSummary> {
        PdfRendererBuilder::new()
            .use_unicode_bidi_splitter(Arc::new(UnicodeBidiSplitter))
            .use_unicode_bidi_reorderer(Arc::new(UnicodeBidiReorderer))
            .default_text_direction(TextDirection::Ltr)
            .use_svg_drawer(self.svg_drawer.clone())
            .use_object_drawer_factory(self.drawers.clone())
            .with_html_content(fixture.html(), fixture.base_uri())
            .to_stream(out)
            .run()
    }

    /// Renders the first page of `fixture` as a PNG file at `path`.
    pub fn render_png(&self, fixture: &Fixture, path: &Path) -> Result<()> {
        let image = ImageRendererBuilder::new()
            .use_svg_drawer(self.svg_drawer.clone())
            .use_object_drawer_factory(self.drawers.clone())
            .with_html_content(fixture.html(), fixture.base_uri())
            .build()?
            .render_to_image(self.config.png_width(), self.config.image_type())?;
        raster::write_png(&image, path)
    }
}

/// [`TestcaseRunner::run_test_case`] with the environment configuration.
pub fn run_test_case(name: &str) -> Result<TestCaseOutput> {
    TestcaseRunner::from_env().run_test_case(name)
}

/// [`TestcaseRunner::run_test_without_output`] with the environment configuration.
pub fn run_test_without_output(name: &str) -> Result<()> {
    TestcaseRunner::from_env().run_test_without_output(name)
}

/// [`TestcaseRunner::run_test_without_output_and_allow_warnings`] with the environment
/// configuration.
pub fn run_test_without_output_and_allow_warnings(name: &str) -> Result<Vec<CapturedWarning>> {
    TestcaseRunner::from_env().run_test_without_output_and_allow_warnings(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::LevelFilter;

    #[test]
    fn every_default_case_is_bundled() {
        let names = fixtures::available(&crate::config::bundled_fixtures_dir()).expect("list");
        for case in DEFAULT_TEST_CASES {
            assert!(names.iter().any(|name| name == case), "missing fixture {case}");
        }
    }

    #[test]
    fn the_tree_drawer_is_registered() {
        assert_eq!(default_drawer_factory().registered_types(), vec![BINARY_TREE_TYPE]);
    }

    #[test]
    fn missing_fixtures_fail_before_rendering() {
        let runner = TestcaseRunner::new(RunnerConfig::new().with_echo_level(LevelFilter::Off));
        if logging::install(LevelFilter::Off).is_err() {
            return;
        }
        let err = runner.run_test_without_output("no-such-case").unwrap_err();
        assert!(matches!(err, Error::FixtureNotFound { .. }));
    }

    #[test]
    fn unknown_log_level_is_reported_once_the_logger_is_installed() {
        let config = RunnerConfig::new()
            .with_echo_level(LevelFilter::Off)
            .with_echo_level_name("chatty");
        let runner = TestcaseRunner::new(config);
        let (installed, warnings) = logging::capture_warnings(|| runner.install_logger());
        if installed.is_err() {
            return;
        }
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message().contains("TESTCASES_LOG"));
        assert!(warnings[0].message().contains("chatty"));

        let ((), again) = logging::capture_warnings(|| {
            let _ = runner.install_logger();
        });
        assert!(again.is_empty());
    }
}

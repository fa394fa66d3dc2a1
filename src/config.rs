//! Runner configuration sourced from environment variables.

use std::env;
use std::path::PathBuf;

use log::LevelFilter;

use crate::logging;
use crate::raster::ImageType;

/// Environment variable selecting the output directory.
pub const OUT_DIRECTORY_VAR: &str = "OUT_DIRECTORY";
/// Environment variable overriding the fixture directory.
pub const FIXTURES_DIR_VAR: &str = "TESTCASES_DIR";
/// Environment variable selecting which log records are echoed to stderr.
pub const LOG_LEVEL_VAR: &str = "TESTCASES_LOG";

/// Width in pixels of the rendered PNG page.
pub const DEFAULT_PNG_WIDTH: u32 = 512;

/// Settings shared by every test case run.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    out_dir: PathBuf,
    fixtures_dir: PathBuf,
    png_width: u32,
    image_type: ImageType,
    echo_level: LevelFilter,
    ignored_log_level: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            fixtures_dir: bundled_fixtures_dir(),
            png_width: DEFAULT_PNG_WIDTH,
            image_type: ImageType::Rgb8,
            echo_level: LevelFilter::Info,
            ignored_log_level: None,
        }
    }
}

/// Directory holding the fixtures shipped with the crate.
pub fn bundled_fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("resources/testcases")
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

impl RunnerConfig {
    /// Creates the default configuration: current directory output, bundled fixtures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `OUT_DIRECTORY`, `TESTCASES_DIR` and `TESTCASES_LOG`, falling back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(out_dir) = env_path(OUT_DIRECTORY_VAR) {
            config.out_dir = out_dir;
        }

        if let Some(fixtures_dir) = env_path(FIXTURES_DIR_VAR) {
            config.fixtures_dir = fixtures_dir;
        }

        if let Ok(level) = env::var(LOG_LEVEL_VAR) {
            config = config.with_echo_level_name(&level);
        }

        config
    }

    /// Directory that receives the rendered `.pdf` and `.png` files.
    pub fn out_dir(&self) -> &PathBuf {
        &self.out_dir
    }

    /// Directory containing the `<name>.html` fixtures.
    pub fn fixtures_dir(&self) -> &PathBuf {
        &self.fixtures_dir
    }

    /// Width of the rasterized page.
    pub fn png_width(&self) -> u32 {
        self.png_width
    }

    /// Pixel format of the rasterized page.
    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    /// Minimum level of log records echoed to stderr.
    pub fn echo_level(&self) -> LevelFilter {
        self.echo_level
    }

    /// Sets the output directory and returns the updated configuration.
    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = out_dir.into();
        self
    }

    /// Sets the fixture directory and returns the updated configuration.
    pub fn with_fixtures_dir(mut self, fixtures_dir: impl Into<PathBuf>) -> Self {
        self.fixtures_dir = fixtures_dir.into();
        self
    }

    /// Value of `TESTCASES_LOG` that did not name a level.
    ///
    /// The runner reports it once its logger is installed.
    pub fn ignored_log_level(&self) -> Option<&str> {
        self.ignored_log_level.as_deref()
    }

    /// Sets the echo level from a name such as `warn` or `debug`.
    ///
    /// An unknown name keeps the current level and is remembered as [`Self::ignored_log_level`].
    pub fn with_echo_level_name(mut self, name: &str) -> Self {
        match logging::parse_level(name) {
            Some(level) => {
                self.echo_level = level;
                self.ignored_log_level = None;
            }
            None => self.ignored_log_level = Some(name.to_owned()),
        }
        self
    }

    /// Sets the PNG width and returns the updated configuration.
    pub fn with_png_width(mut self, png_width: u32) -> Self {
        self.png_width = png_width;
        self
    }

    /// Sets the PNG pixel format and returns the updated configuration.
    pub fn with_image_type(mut self, image_type: ImageType) -> Self {
        self.image_type = image_type;
        self
    }

    /// Sets the echo level and returns the updated configuration.
    pub fn with_echo_level(mut self, echo_level: LevelFilter) -> Self {
        self.echo_level = echo_level;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_write_512px_rgb_pngs_to_the_working_dir() {
        let config = RunnerConfig::default();
        assert_eq!(config.out_dir(), &PathBuf::from("."));
        assert_eq!(config.png_width(), 512);
        assert_eq!(config.image_type(), ImageType::Rgb8);
        assert!(config.fixtures_dir().ends_with("resources/testcases"));
    }

    #[test]
    fn setters_override_defaults() {
        let config = RunnerConfig::new()
            .with_out_dir("target/out")
            .with_png_width(256)
            .with_echo_level(LevelFilter::Off);
        assert_eq!(config.out_dir(), &PathBuf::from("target/out"));
        assert_eq!(config.png_width(), 256);
        assert_eq!(config.echo_level(), LevelFilter::Off);
    }

    #[test]
    fn unknown_level_names_are_kept_for_reporting() {
        let config = RunnerConfig::new().with_echo_level_name("chatty");
        assert_eq!(config.echo_level(), LevelFilter::Info);
        assert_eq!(config.ignored_log_level(), Some("chatty"));

        let config = config.with_echo_level_name("debug");
        assert_eq!(config.echo_level(), LevelFilter::Debug);
        assert_eq!(config.ignored_log_level(), None);
    }
}

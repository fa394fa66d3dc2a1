use htmltopdf_testcases::{fonts, logging, Error, ImageType, RunnerConfig, TestcaseRunner};
use image::GenericImageView;
use log::{Level, LevelFilter};

fn runner(out_dir: &std::path::Path) -> Option<TestcaseRunner> {
    if !fonts::default_fonts_available() {
        eprintln!(
            "Skipping runner test: bundled fonts missing. Set TESTCASES_FONTS_DIR or copy assets/fonts next to the binary."
        );
        return None;
    }
    if logging::install(LevelFilter::Off).is_err() {
        eprintln!("Skipping runner test: another logger is installed");
        return None;
    }
    let config = RunnerConfig::new()
        .with_out_dir(out_dir)
        .with_png_width(256)
        .with_echo_level(LevelFilter::Off);
    Some(TestcaseRunner::new(config))
}

#[test]
fn clean_fixtures_pass_the_warning_check() {
    let dir = tempfile::tempdir().expect("temp dir");
    let Some(runner) = runner(dir.path()) else {
        return;
    };
    for name in ["color", "background-color", "text-align", "custom-objects", "form-controls"] {
        if let Err(err) = runner.run_test_without_output(name) {
            panic!("{name} should render without warnings: {err}");
        }
    }
}

#[test]
fn unloadable_background_image_fails_the_warning_check() {
    let dir = tempfile::tempdir().expect("temp dir");
    let Some(runner) = runner(dir.path()) else {
        return;
    };

    match runner.run_test_without_output("invalid-url-background-image") {
        Err(Error::Warning(warning)) => {
            assert_eq!(warning.level(), Level::Warn);
            assert!(warning.message().contains("does-not-exist.png"));
        }
        other => panic!("expected a warning failure, got {other:?}"),
    }

    let warnings = runner
        .run_test_without_output_and_allow_warnings("invalid-url-background-image")
        .expect("warnings are allowed");
    assert_eq!(warnings.len(), 1);
}

#[test]
fn run_test_case_writes_pdf_and_png() {
    let dir = tempfile::tempdir().expect("temp dir");
    let out_dir = dir.path().join("nested/out");
    let Some(runner) = runner(&out_dir) else {
        return;
    };

    let output = runner.run_test_case("moonbase").expect("render moonbase");
    assert_eq!(output.pdf, out_dir.join("moonbase.pdf"));
    assert_eq!(output.png, out_dir.join("moonbase.png"));
    assert!(output.pages >= 2, "the appendix starts on a new page");

    let pdf = std::fs::read(&output.pdf).expect("read pdf");
    assert!(pdf.starts_with(b"%PDF"));

    let png = image::open(&output.png).expect("decode png");
    assert_eq!(png.dimensions(), (256, 362));
    assert_eq!(runner.config().image_type(), ImageType::Rgb8);
    assert_eq!(png.color(), image::ColorType::Rgb8);
}

#[test]
fn repeated_table_spans_several_pages() {
    let dir = tempfile::tempdir().expect("temp dir");
    let Some(runner) = runner(dir.path()) else {
        return;
    };
    let output = runner
        .run_test_case("RepeatedTableSample")
        .expect("render table");
    assert!(output.pages > 1);
}

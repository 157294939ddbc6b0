//! Behaviour-driven tests for workspace configuration loading.

use std::cell::RefCell;
use std::convert::Infallible;
use std::str::FromStr;

use bootforge::BootforgeConfig;
use camino::Utf8Path;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

type LoadResult = RefCell<Option<Result<BootforgeConfig, String>>>;

#[fixture]
fn config_source() -> RefCell<Option<String>> {
    RefCell::new(None)
}

#[fixture]
fn load_result() -> LoadResult {
    RefCell::new(None)
}

#[derive(Debug)]
struct ErrorSnippet(String);

impl FromStr for ErrorSnippet {
    type Err = Infallible;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input
            .trim()
            .trim_matches(|candidate| matches!(candidate, '"' | '\''));

        Ok(Self(trimmed.to_owned()))
    }
}

impl ErrorSnippet {
    fn into_inner(self) -> String {
        self.0
    }
}

fn loaded(load_result: &LoadResult) -> BootforgeConfig {
    match load_result.borrow().as_ref() {
        Some(Ok(config)) => config.clone(),
        Some(Err(error)) => panic!("expected configuration loading to succeed: {error}"),
        None => panic!("configuration should be loaded"),
    }
}

#[given("no configuration state has been prepared")]
fn reset_state(config_source: &RefCell<Option<String>>, load_result: &LoadResult) {
    config_source.borrow_mut().take();
    load_result.borrow_mut().take();
}

#[given("no workspace configuration overrides are provided")]
fn no_overrides(config_source: &RefCell<Option<String>>) {
    config_source.borrow_mut().take();
}

#[given("the workspace config sets the acquisition attempt limit to {value}")]
fn override_attempts(config_source: &RefCell<Option<String>>, value: u32) {
    config_source
        .borrow_mut()
        .replace(format!("[pipeline]\nacquisition_attempts = {value}\n"));
}

#[given("the workspace config sets the acquisition attempt limit to an invalid value")]
fn invalid_override(config_source: &RefCell<Option<String>>) {
    config_source.borrow_mut().replace(String::from(
        "[pipeline]\nacquisition_attempts = \"many\"\n",
    ));
}

#[given("the workspace config includes unknown fields")]
fn unknown_fields(config_source: &RefCell<Option<String>>) {
    config_source.borrow_mut().replace(
        concat!(
            "unexpected = true\n",
            "[pipeline]\n",
            "acquisition_attempts = 4\n",
        )
        .to_owned(),
    );
}

#[when("the workspace configuration is loaded")]
fn load_config(config_source: &RefCell<Option<String>>, load_result: &LoadResult) {
    let outcome = match config_source.borrow().as_deref() {
        None => Ok(BootforgeConfig::default()),
        Some(source) => BootforgeConfig::from_toml_str(source, Utf8Path::new("config.toml"))
            .map_err(|error| error.to_string()),
    };
    load_result.borrow_mut().replace(outcome);
}

#[then("the acquisition attempt limit is {expected}")]
fn assert_attempts(load_result: &LoadResult, expected: u32) {
    assert_eq!(loaded(load_result).pipeline.acquisition_attempts, expected);
}

#[then("the reconfirmation limit is {expected}")]
fn assert_reconfirmations(load_result: &LoadResult, expected: u32) {
    assert_eq!(loaded(load_result).pipeline.max_reconfirmations, expected);
}

#[then("a configuration error is reported")]
fn assert_error(load_result: &LoadResult) {
    match load_result.borrow().as_ref() {
        Some(Err(_)) => {}
        Some(Ok(config)) => {
            panic!("expected configuration loading to fail but succeeded with {config:?}")
        }
        None => panic!("configuration should be loaded"),
    }
}

#[then("a configuration error mentioning {snippet} is reported")]
fn assert_error_with_snippet(load_result: &LoadResult, snippet: ErrorSnippet) {
    let snippet_value = snippet.into_inner();
    match load_result.borrow().as_ref() {
        Some(Err(error)) => {
            assert!(
                error.contains(snippet_value.as_str()),
                "expected error '{error}' to mention '{snippet_value}'",
            );
        }
        Some(Ok(config)) => {
            panic!("expected configuration loading to fail but succeeded with {config:?}")
        }
        None => panic!("configuration should be loaded"),
    }
}

#[scenario("tests/features/config_loading.feature", index = 0)]
fn scenario_defaults(config_source: RefCell<Option<String>>, load_result: LoadResult) {
    let _ = (config_source, load_result);
}

#[scenario("tests/features/config_loading.feature", index = 1)]
fn scenario_override(config_source: RefCell<Option<String>>, load_result: LoadResult) {
    let _ = (config_source, load_result);
}

#[scenario("tests/features/config_loading.feature", index = 2)]
fn scenario_out_of_range(config_source: RefCell<Option<String>>, load_result: LoadResult) {
    let _ = (config_source, load_result);
}

#[scenario("tests/features/config_loading.feature", index = 3)]
fn scenario_malformed(config_source: RefCell<Option<String>>, load_result: LoadResult) {
    let _ = (config_source, load_result);
}

#[scenario("tests/features/config_loading.feature", index = 4)]
fn scenario_unknown_fields(config_source: RefCell<Option<String>>, load_result: LoadResult) {
    let _ = (config_source, load_result);
}

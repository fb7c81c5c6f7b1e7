use super::Params;
use crate::utils::error::Result;
use crate::utils::shell::{flag, quote_arg};

pub const DEFAULT_TEST_PATH: &str = "tests/";
pub const DEFAULT_PYTHON: &str = "python";
pub const DEFAULT_REQUIREMENTS: &str = "requirements.txt";
pub const DEFAULT_JUNIT_XML: &str = "test-results.xml";
pub const DEFAULT_EXTRA_ARGS: &str = "-v";

/// 安裝依賴並執行 pytest，輸出 JUnit XML 報告
///
/// Required: `working_dir`.
pub fn test_command(params: &Params) -> Result<String> {
    let working_dir = params.require("working_dir")?;

    let test_path = params.get_or("test_path", DEFAULT_TEST_PATH);
    let python = params.get_or("python", DEFAULT_PYTHON);
    let requirements = params.get_or("requirements", DEFAULT_REQUIREMENTS);
    let junit_xml = params.get_or("junit_xml", DEFAULT_JUNIT_XML);
    let extra_args = params.get_or("extra_args", DEFAULT_EXTRA_ARGS);

    let python = quote_arg(python);
    let mut pytest = vec![
        format!("{} -m pytest", python),
        quote_arg(test_path),
    ];
    // extra_args 是原樣傳入的參數列
    pytest.push(extra_args.to_string());
    pytest.push(flag("junitxml", junit_xml));
    if let Some(module) = params.get("coverage") {
        pytest.push(flag("cov", module));
    }

    Ok(format!(
        "cd {} && {} -m pip install -r {} && {}",
        quote_arg(working_dir),
        python,
        quote_arg(requirements),
        pytest.join(" ")
    ))
}

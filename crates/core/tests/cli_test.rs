use anyhow::Result;
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("fixtures")
        .join("cpp")
}

fn fixture(name: &str) -> PathBuf {
    fixtures().join(name)
}

/// Runs the binary from `cwd` so no stray `mockgen.toml` is picked up.
fn mockgen(cwd: &Path, args: &[&str], paths: &[PathBuf]) -> Result<Output> {
    let output = Command::new(env!("CARGO_BIN_EXE_mockgen"))
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .args(args)
        .args(paths)
        .output()?;
    Ok(output)
}

fn listing(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().to_string());
    }
    names.sort();
    Ok(names)
}

const I2_MOCK: &str = r#"#ifndef I2MOCK_HPP
#define I2MOCK_HPP

#include <gmock/gmock.h>
#include "I2.hpp"

namespace n1 {

class I2Mock : public I2
{
public:
    MOCK_CONST_METHOD0(f0, void());
    MOCK_METHOD1(f1, void(int));
    MOCK_METHOD1(f2, void(double));
    MOCK_METHOD2(f3, void(int, double));
    MOCK_METHOD3(f4, void(int, double, const std::string&));
    MOCK_METHOD1(f5, int(const std::string&));
    MOCK_CONST_METHOD1(f6, boost::shared_ptr<int>(const boost::shared_ptr<int>&));
    MOCK_CONST_METHOD0(f7, const int&());
    MOCK_METHOD0(f8, boost::function<void(int)>());
    MOCK_CONST_METHOD2(f9, boost::non_type<int, 0>(const boost::non_type<int, 1>&, const boost::non_type<int, 2>&));
    MOCK_METHOD0(f10, const int* const());
    MOCK_CONST_METHOD0(f11, void());
    MOCK_CONST_METHOD0(f12, void());
    MOCK_CONST_METHOD0(f13, void());
    MOCK_CONST_METHOD0(f14, void());
    MOCK_CONST_METHOD0(f15, void());
    MOCK_CONST_METHOD0(f16, void());
    MOCK_CONST_METHOD0(f17, void());
    virtual int operator()() { return function_call_or_cast_operator(); }
    MOCK_METHOD0(function_call_or_cast_operator, int());
    virtual void operator()(int arg0, double arg1, boost::function<void(int, double)> arg2, const boost::non_type<int, 1>& arg3, const std::string& arg4) { function_call_or_cast_operator(arg0, arg1, arg2, arg3, arg4); }
    MOCK_METHOD5(function_call_or_cast_operator, void(int, double, boost::function<void(int, double)>, const boost::non_type<int, 1>&, const std::string&));
    virtual double operator[](int arg0) { return array_subscript_operator(arg0); }
    MOCK_METHOD1(array_subscript_operator, double(int));
    virtual void* operator->() const { return member_selection_operator(); }
    MOCK_CONST_METHOD0(member_selection_operator, void*());
};

} // namespace n1

#endif // I2MOCK_HPP
"#;

#[test]
fn test_one_file_with_output() -> Result<()> {
    let cwd = TempDir::new()?;
    let out = cwd.path().join("generated");
    let output = mockgen(
        cwd.path(),
        &["generate", "--dir", out.to_str().unwrap(), "--expr", "n1"],
        &[fixture("I2.hpp")],
    )?;
    assert!(output.status.success(), "generate failed: {}", String::from_utf8_lossy(&output.stderr));

    assert_eq!(listing(&out)?, vec!["I2Mock.hpp"]);
    assert_eq!(std::fs::read_to_string(out.join("I2Mock.hpp"))?, I2_MOCK);
    Ok(())
}

#[test]
fn test_expr_without_match_writes_nothing() -> Result<()> {
    let cwd = TempDir::new()?;
    let out = cwd.path().join("generated");
    let output = mockgen(
        cwd.path(),
        &["generate", "--dir", out.to_str().unwrap(), "--expr", "n1"],
        &[fixture("T.hpp")],
    )?;
    assert!(output.status.success());
    assert!(!out.exists() || listing(&out)?.is_empty());
    Ok(())
}

#[test]
fn test_many_files() -> Result<()> {
    let cwd = TempDir::new()?;
    let out = cwd.path().join("generated");
    let output = mockgen(
        cwd.path(),
        &["generate", "--dir", out.to_str().unwrap(), "--expr", "n1"],
        &[fixture("I2.hpp"), fixture("I3I4.hpp"), fixture("T.hpp")],
    )?;
    assert!(output.status.success(), "generate failed: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(listing(&out)?, vec!["I2Mock.hpp", "I3Mock.hpp", "I4Mock.hpp"]);

    let i4 = std::fs::read_to_string(out.join("I4Mock.hpp"))?;
    assert!(i4.contains("MOCK_METHOD1(f0, void(bool));"));
    assert!(i4.contains("MOCK_METHOD0(f1, void());"));
    assert!(i4.contains("MOCK_CONST_METHOD0(f2, Enum());"));

    let i3 = std::fs::read_to_string(out.join("I3Mock.hpp"))?;
    assert!(i3.contains("MOCK_METHOD0(f1, void());"));
    assert!(!i3.contains("f0"));
    Ok(())
}

#[test]
fn test_define_enables_conditional_interface() -> Result<()> {
    let cwd = TempDir::new()?;
    let out = cwd.path().join("generated");
    let output = mockgen(
        cwd.path(),
        &["generate", "-D", "CLASS_I5", "--dir", out.to_str().unwrap()],
        &[fixture("I3I4.hpp")],
    )?;
    assert!(output.status.success());
    assert_eq!(listing(&out)?, vec!["I3Mock.hpp", "I4Mock.hpp", "I5Mock.hpp"]);
    Ok(())
}

#[test]
fn test_custom_config() -> Result<()> {
    let cwd = TempDir::new()?;
    let out = cwd.path().join("generated");
    let conf = cwd.path().join("custom.toml");
    std::fs::write(
        &conf,
        r#"
mock_file_hpp = "{interface}_mock.hpp"
file_template_hpp = "// {guard}\n{namespaces_begin}\n{template}class {interface}_mock : public {template_interface} {\n{mock_methods}\n};\n{namespaces_end}\n"
"#,
    )?;
    let output = mockgen(
        cwd.path(),
        &["--config", conf.to_str().unwrap(), "generate", "--dir", out.to_str().unwrap()],
        &[fixture("T.hpp")],
    )?;
    assert!(output.status.success(), "generate failed: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(listing(&out)?, vec!["T_mock.hpp"]);

    let expected = "// T_MOCK_HPP\nnamespace n {\ntemplate<typename Elem>\nclass T_mock : public T<Elem> {\n    MOCK_CONST_METHOD0_T(GetSize, int());\n    MOCK_METHOD1_T(Push, void(const Elem&));\n};\n} // namespace n\n";
    assert_eq!(std::fs::read_to_string(out.join("T_mock.hpp"))?, expected);
    Ok(())
}

#[test]
fn test_local_config_file_is_picked_up() -> Result<()> {
    let cwd = TempDir::new()?;
    std::fs::write(cwd.path().join("mockgen.toml"), "mock_file_hpp = \"Mock{interface}.h\"\n")?;
    let output = mockgen(cwd.path(), &["generate", "--dir", "out"], &[fixture("I2.hpp")])?;
    assert!(output.status.success());
    assert_eq!(listing(&cwd.path().join("out"))?, vec!["MockI2.h"]);
    Ok(())
}

#[test]
fn test_directory_input() -> Result<()> {
    let cwd = TempDir::new()?;
    let headers = cwd.path().join("include");
    std::fs::create_dir_all(&headers)?;
    for name in ["I2.hpp", "T.hpp"] {
        std::fs::copy(fixture(name), headers.join(name))?;
    }
    std::fs::write(headers.join("notes.txt"), "class X { virtual void f() = 0; };")?;

    let output = mockgen(cwd.path(), &["generate", "--dir", "out"], &[headers])?;
    assert!(output.status.success(), "generate failed: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(listing(&cwd.path().join("out"))?, vec!["I2Mock.hpp", "TMock.hpp"]);
    Ok(())
}

#[test]
fn test_anonymous_namespace_collision_fails_the_run() -> Result<()> {
    let cwd = TempDir::new()?;
    let output = mockgen(cwd.path(), &["generate", "--dir", "out"], &[fixture("anonymous.hpp")])?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("`n1::I3` names two different classes"), "{stderr}");
    assert!(!cwd.path().join("out").exists());
    Ok(())
}

#[test]
fn test_broken_unit_fails_with_position() -> Result<()> {
    let cwd = TempDir::new()?;
    let output = mockgen(
        cwd.path(),
        &["generate", "--dir", "out"],
        &[fixture("I2.hpp"), fixture("broken.hpp")],
    )?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("broken.hpp:7:5: error: unterminated block comment"), "{stderr}");
    assert!(!cwd.path().join("out").exists());
    Ok(())
}

#[test]
fn test_missing_file_fails() -> Result<()> {
    let cwd = TempDir::new()?;
    let output = mockgen(cwd.path(), &["generate", "--dir", "out"], &[fixture("not_found.hpp")])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not_found.hpp"));
    Ok(())
}

#[test]
fn test_paths_are_required() -> Result<()> {
    let cwd = TempDir::new()?;
    let output = mockgen(cwd.path(), &["generate"], &[])?;
    assert!(!output.status.success());
    Ok(())
}

#[test]
fn test_redefinition_is_reported_as_warning() -> Result<()> {
    let cwd = TempDir::new()?;
    let output = mockgen(cwd.path(), &["generate", "--dir", "out"], &[fixture("I3.hpp")])?;
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("warning: `n1::I3` redefined"), "{stderr}");
    assert_eq!(listing(&cwd.path().join("out"))?, vec!["I3Mock.hpp"]);
    Ok(())
}

#[test]
fn test_model_json() -> Result<()> {
    let cwd = TempDir::new()?;
    let output = mockgen(
        cwd.path(),
        &["model", "--expr", "n1::"],
        &[fixture("test.hpp"), fixture("I3.hpp")],
    )?;
    assert!(output.status.success(), "model failed: {}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let names: Vec<&str> = json["interfaces"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["qualified_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["n1::T2", "n1::C2", "n1::I3"]);
    assert_eq!(json["units"], 2);
    assert_eq!(json["diagnostics"].as_array().unwrap().len(), 1);
    assert_eq!(json["diagnostics"][0]["severity"], "warning");

    let t2 = &json["interfaces"][0];
    assert_eq!(t2["methods"].as_array().unwrap().len(), 12);
    assert_eq!(t2["methods"][1]["name"], "f0");
    assert_eq!(t2["methods"][1]["qualifiers"][0], "const");
    Ok(())
}

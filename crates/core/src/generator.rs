//! gMock class generator.
//!
//! Every selected interface is rendered through the configured file
//! templates. Methods become classic `MOCK_METHODn` / `MOCK_CONST_METHODn`
//! lines; operators are mocked through a named forwarding method because
//! the macros only accept identifiers.

use crate::config::GeneratorConfig;
use anyhow::{bail, Context, Result};
use protocol::{InterfaceModel, InterfaceRecord, MethodSignature, NameKind, RefQualifier};
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const INDENT: &str = "    ";
const ARG_PREFIX: &str = "arg";

/// Mock method names for overloadable operators.
const OPERATORS: &[(&str, &str)] = &[
    ("operator,", "comma_operator"),
    ("operator!", "logical_not_operator"),
    ("operator!=", "inequality_operator"),
    ("operator%", "modulus_operator"),
    ("operator%=", "modulus_assignment_operator"),
    ("operator&", "address_of_or_bitwise_and_operator"),
    ("operator&&", "logical_and_operator"),
    ("operator&=", "bitwise_and_assignment_operator"),
    ("operator()", "function_call_or_cast_operator"),
    ("operator*", "multiplication_or_dereference_operator"),
    ("operator*=", "multiplication_assignment_operator"),
    ("operator+", "addition_or_unary_plus_operator"),
    ("operator++", "increment1_operator"),
    ("operator+=", "addition_assignment_operator"),
    ("operator-", "subtraction_or_unary_negation_operator"),
    ("operator--", "decrement1_operator"),
    ("operator-=", "subtraction_assignment_operator"),
    ("operator->", "member_selection_operator"),
    ("operator->*", "pointer_to_member_selection_operator"),
    ("operator/", "division_operator"),
    ("operator/=", "division_assignment_operator"),
    ("operator<", "less_than_operator"),
    ("operator<<", "left_shift_operator"),
    ("operator<<=", "left_shift_assignment_operator"),
    ("operator<=", "less_than_or_equal_to_operator"),
    ("operator=", "assignment_operator"),
    ("operator==", "equality_operator"),
    ("operator>", "greater_than_operator"),
    ("operator>=", "greater_than_or_equal_to_operator"),
    ("operator>>", "right_shift_operator"),
    ("operator>>=", "right_shift_assignment_operator"),
    ("operator[]", "array_subscript_operator"),
    ("operator^", "exclusive_or_operator"),
    ("operator^=", "exclusive_or_assignment_operator"),
    ("operator|", "bitwise_inclusive_or_operator"),
    ("operator|=", "bitwise_inclusive_or_assignment_operator"),
    ("operator||", "logical_or_operator"),
    ("operator~", "complement_operator"),
];

pub fn operator_alias(name: &str) -> Option<&'static str> {
    OPERATORS
        .iter()
        .find(|(operator, _)| *operator == name)
        .map(|(_, alias)| *alias)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

pub struct Generator<'a> {
    config: &'a GeneratorConfig,
    out_dir: PathBuf,
}

impl<'a> Generator<'a> {
    pub fn new(config: &'a GeneratorConfig, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            out_dir: out_dir.into(),
        }
    }

    /// Render every interface whose qualified name starts with `expr`.
    pub fn render_model(&self, model: &InterfaceModel, expr: &str) -> Result<Vec<GeneratedFile>> {
        let mut owners: FxHashMap<PathBuf, &str> = FxHashMap::default();
        let mut files = Vec::new();

        for record in model.matching(expr) {
            for file in self.render(record) {
                if let Some(owner) = owners.insert(file.path.clone(), &record.qualified_name) {
                    bail!(
                        "`{}` and `{}` would both be written to {}",
                        owner,
                        record.qualified_name,
                        file.path.display()
                    );
                }
                files.push(file);
            }
        }
        Ok(files)
    }

    /// The header and, when configured, the source file for one interface.
    pub fn render(&self, record: &InterfaceRecord) -> Vec<GeneratedFile> {
        let methods = mock_methods(record, self.config.mock_overridable);
        if methods.is_empty() {
            debug!("{} has nothing to mock", record.qualified_name);
            return Vec::new();
        }

        let interface_vars = FxHashMap::from_iter([("interface", record.name.clone())]);
        let mock_file_hpp = substitute(&self.config.mock_file_hpp, &interface_vars);
        let mock_file_cpp = substitute(&self.config.mock_file_cpp, &interface_vars);

        let unit = Path::new(&record.unit);
        let mut vars: FxHashMap<&str, String> = FxHashMap::default();
        vars.insert("mock_file_hpp", mock_file_hpp.clone());
        vars.insert("mock_file_cpp", mock_file_cpp.clone());
        vars.insert("generated_dir", self.out_dir.display().to_string());
        vars.insert(
            "dir",
            unit.parent().map(|p| p.display().to_string()).unwrap_or_default(),
        );
        vars.insert(
            "file",
            unit.file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_default(),
        );
        vars.insert("namespaces_begin", namespaces_begin(&record.namespaces));
        vars.insert("namespaces_end", namespaces_end(&record.namespaces));
        vars.insert("interface", record.name.clone());
        vars.insert("template_interface", template_interface(record));
        vars.insert("template", template_header(&record.template_params));
        vars.insert("mock_methods", methods.join("\n"));

        let mut files = Vec::new();
        for (file_name, template) in [
            (mock_file_hpp, &self.config.file_template_hpp),
            (mock_file_cpp, &self.config.file_template_cpp),
        ] {
            if template.is_empty() {
                continue;
            }
            vars.insert("guard", guard(&file_name));
            files.push(GeneratedFile {
                path: self.out_dir.join(&file_name),
                contents: substitute(template, &vars),
            });
        }
        files
    }

    /// Render and write. Nothing is written if rendering fails.
    pub fn generate(&self, model: &InterfaceModel, expr: &str) -> Result<Vec<PathBuf>> {
        let files = self.render_model(model, expr)?;
        let mut written = Vec::with_capacity(files.len());
        for file in files {
            if let Some(parent) = file.path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(&file.path, &file.contents)
                .with_context(|| format!("failed to write {}", file.path.display()))?;
            debug!("Wrote {}", file.path.display());
            written.push(file.path);
        }
        info!("Generated {} mock files in {}", written.len(), self.out_dir.display());
        Ok(written)
    }
}

/// The mock lines of one interface, in declaration order.
pub fn mock_methods(record: &InterfaceRecord, include_overridable: bool) -> Vec<String> {
    record
        .methods
        .iter()
        .filter(|m| !m.is_destructor())
        .filter(|m| m.is_unparseable() || m.is_mandatory_override() || (include_overridable && m.is_overridable()))
        .map(|m| mock_method(m, record.is_template()))
        .collect()
}

pub fn mock_method(method: &MethodSignature, is_template: bool) -> String {
    if let NameKind::Unparseable { text, .. } = &method.kind {
        return format!("{INDENT}// mockgen: could not parse: {text}");
    }

    let result_type = method
        .return_type
        .as_ref()
        .map_or_else(|| "void".to_string(), |ty| ty.spelling());
    let types: Vec<String> = method.parameters.iter().map(|p| p.ty.spelling()).collect();

    let mut out = String::new();
    let name = match forwarding_name(method) {
        Some(alias) => {
            out.push_str(&forwarding_method(method, &result_type, &types, &alias));
            out.push('\n');
            alias
        }
        None if method.kind == NameKind::Operator => {
            return format!("{INDENT}// mockgen: cannot mock {}", method.name);
        }
        None => method.name.clone(),
    };

    out.push_str(&format!(
        "{INDENT}MOCK_{}METHOD{}{}({}, {}({}));",
        if method.is_const() { "CONST_" } else { "" },
        types.len(),
        if is_template { "_T" } else { "" },
        name,
        result_type,
        types.join(", ")
    ));
    out
}

fn forwarding_name(method: &MethodSignature) -> Option<String> {
    match method.kind {
        NameKind::Operator => operator_alias(&method.name).map(str::to_string),
        NameKind::Conversion => {
            let target = method.name.trim_start_matches("operator").trim();
            let ident: String = target
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect();
            let ident: Vec<&str> = ident.split('_').filter(|s| !s.is_empty()).collect();
            Some(format!("conversion_to_{}_operator", ident.join("_")))
        }
        // The macros cannot spell ref-qualifiers or noexcept.
        NameKind::Identifier if method.ref_qualifier.is_some() || method.is_noexcept => {
            Some(format!("{}_mock", method.name))
        }
        _ => None,
    }
}

/// `const`, then the ref-qualifier, then `noexcept`, each followed by a space.
fn trailing_qualifiers(method: &MethodSignature) -> String {
    let mut out = String::new();
    if method.is_const() {
        out.push_str("const ");
    }
    match method.ref_qualifier {
        Some(RefQualifier::LValue) => out.push_str("& "),
        Some(RefQualifier::RValue) => out.push_str("&& "),
        None => {}
    }
    if method.is_noexcept {
        out.push_str("noexcept ");
    }
    out
}

/// `virtual R operator@(T0 arg0) const { return alias(arg0); }`
fn forwarding_method(method: &MethodSignature, result_type: &str, types: &[String], alias: &str) -> String {
    let typed: Vec<String> = types
        .iter()
        .enumerate()
        .map(|(i, ty)| format!("{ty} {ARG_PREFIX}{i}"))
        .collect();
    let named: Vec<String> = (0..types.len()).map(|i| format!("{ARG_PREFIX}{i}")).collect();
    let returns = method.return_type.as_ref().is_some_and(|ty| !ty.is_void());
    let signature = if method.kind == NameKind::Conversion {
        format!("virtual {}()", method.name)
    } else {
        format!("virtual {} {}({})", result_type, method.name, typed.join(", "))
    };
    format!(
        "{INDENT}{} {}{{ {}{}({}); }}",
        signature,
        trailing_qualifiers(method),
        if returns { "return " } else { "" },
        alias,
        named.join(", ")
    )
}

/// Replace `{name}` groups found in `vars`. Other brace groups are kept.
pub fn substitute(template: &str, vars: &FxHashMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let found = after
            .find('}')
            .and_then(|close| vars.get(&after[..close]).map(|value| (value, close)));
        match found {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn guard(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

fn namespaces_begin(namespaces: &[String]) -> String {
    namespaces
        .iter()
        .map(|ns| format!("namespace {ns} {{"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn namespaces_end(namespaces: &[String]) -> String {
    namespaces
        .iter()
        .rev()
        .map(|ns| format!("}} // namespace {ns}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The base class as written inside the record's namespaces.
fn template_interface(record: &InterfaceRecord) -> String {
    let mut path = record.enclosing_classes.clone();
    path.push(record.template_interface());
    path.join("::")
}

fn template_header(params: &[String]) -> String {
    if params.is_empty() {
        return String::new();
    }
    let params: Vec<String> = params.iter().map(|p| format!("typename {p}")).collect();
    format!("template<{}>\n", params.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use cpp_harness::CppHarness;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(unit: &str, source: &str, name: &str) -> Result<InterfaceRecord> {
        let model = CppHarness::default().extract(unit, source)?;
        model
            .record(name)
            .cloned()
            .with_context(|| format!("{name} not extracted"))
    }

    #[test]
    fn test_plain_and_const_methods() -> Result<()> {
        let i = record(
            "i.hpp",
            "struct I { virtual int f(int a, const std::string& s = \"x\") const = 0; virtual void g() = 0; };",
            "I",
        )?;
        let lines = mock_methods(&i, false);
        assert_eq!(
            lines,
            vec![
                "    MOCK_CONST_METHOD2(f, int(int, const std::string&));",
                "    MOCK_METHOD0(g, void());",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_operators_forward_to_named_mocks() -> Result<()> {
        let i = record(
            "ops.hpp",
            "struct Ops { virtual int operator()() = 0; virtual void* operator->() const = 0; virtual bool operator==(const Ops& o) const = 0; };",
            "Ops",
        )?;
        let lines = mock_methods(&i, false);
        assert_eq!(
            lines[0],
            "    virtual int operator()() { return function_call_or_cast_operator(); }\n    MOCK_METHOD0(function_call_or_cast_operator, int());"
        );
        assert_eq!(
            lines[1],
            "    virtual void* operator->() const { return member_selection_operator(); }\n    MOCK_CONST_METHOD0(member_selection_operator, void*());"
        );
        assert_eq!(
            lines[2],
            "    virtual bool operator==(const Ops& arg0) const { return equality_operator(arg0); }\n    MOCK_CONST_METHOD1(equality_operator, bool(const Ops&));"
        );
        Ok(())
    }

    #[test]
    fn test_void_operator_does_not_return() -> Result<()> {
        let i = record("v.hpp", "struct V { virtual void operator()(int, double d) = 0; };", "V")?;
        assert_eq!(
            mock_methods(&i, false)[0],
            "    virtual void operator()(int arg0, double arg1) { function_call_or_cast_operator(arg0, arg1); }\n    MOCK_METHOD2(function_call_or_cast_operator, void(int, double));"
        );
        Ok(())
    }

    #[test]
    fn test_ref_qualified_and_noexcept_methods_forward() -> Result<()> {
        let i = record(
            "q.hpp",
            "struct Q { virtual int& operator*() & = 0; virtual void take() && = 0; virtual std::size_t size() const noexcept = 0; };",
            "Q",
        )?;
        assert_eq!(
            mock_methods(&i, false),
            vec![
                "    virtual int& operator*() & { return multiplication_or_dereference_operator(); }\n    MOCK_METHOD0(multiplication_or_dereference_operator, int&());",
                "    virtual void take() && { take_mock(); }\n    MOCK_METHOD0(take_mock, void());",
                "    virtual std::size_t size() const noexcept { return size_mock(); }\n    MOCK_CONST_METHOD0(size_mock, std::size_t());",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_conversion_and_unknown_operators() -> Result<()> {
        let i = record(
            "c.hpp",
            "struct C { virtual operator bool() const = 0; virtual void* operator new(std::size_t) = 0; };",
            "C",
        )?;
        let lines = mock_methods(&i, false);
        assert_eq!(
            lines[0],
            "    virtual operator bool() const { return conversion_to_bool_operator(); }\n    MOCK_CONST_METHOD0(conversion_to_bool_operator, bool());"
        );
        assert_eq!(lines[1], "    // mockgen: cannot mock operator new");
        Ok(())
    }

    #[test]
    fn test_overridable_methods_are_opt_in() -> Result<()> {
        let i = record(
            "o.hpp",
            "struct O { virtual ~O() {} virtual void hook() {} virtual void f() = 0; };",
            "O",
        )?;
        assert_eq!(mock_methods(&i, false), vec!["    MOCK_METHOD0(f, void());"]);
        assert_eq!(
            mock_methods(&i, true),
            vec!["    MOCK_METHOD0(hook, void());", "    MOCK_METHOD0(f, void());"]
        );
        Ok(())
    }

    #[test]
    fn test_unparseable_method_leaves_a_comment() -> Result<()> {
        let i = record(
            "u.hpp",
            "struct U { virtual void bad(std::pair<int, int) = 0; virtual void ok() = 0; };",
            "U",
        )?;
        let lines = mock_methods(&i, false);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("    // mockgen: could not parse: "), "{}", lines[0]);
        assert!(lines[0].contains("bad"));
        Ok(())
    }

    #[test]
    fn test_template_interface_rendering() -> Result<()> {
        let t = record("src/n/T.hpp", include_str!("../../../fixtures/cpp/T.hpp"), "n::T")?;
        let config = GeneratorConfig::default();
        let files = Generator::new(&config, "out").render(&t);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, PathBuf::from("out/TMock.hpp"));

        let expected = r#"#ifndef TMOCK_HPP
#define TMOCK_HPP

#include <gmock/gmock.h>
#include "T.hpp"

namespace n {

template<typename Elem>
class TMock : public T<Elem>
{
public:
    MOCK_CONST_METHOD0_T(GetSize, int());
    MOCK_METHOD1_T(Push, void(const Elem&));
};

} // namespace n

#endif // TMOCK_HPP
"#;
        assert_eq!(files[0].contents, expected);
        Ok(())
    }

    #[test]
    fn test_source_template_and_placeholders() -> Result<()> {
        let i = record("inc/I.hpp", "namespace a { namespace b { struct I { virtual void f() = 0; }; } }", "a::b::I")?;
        let config = GeneratorConfig {
            mock_file_hpp: "{interface}_mock.hpp".to_string(),
            file_template_hpp: "{guard}|{dir}|{unknown}|{namespaces_begin}|{namespaces_end}".to_string(),
            mock_file_cpp: "{interface}_mock.cpp".to_string(),
            file_template_cpp: "#include \"{generated_dir}/{mock_file_hpp}\" // {mock_file_cpp} {guard}".to_string(),
            ..GeneratorConfig::default()
        };
        let files = Generator::new(&config, "gen").render(&i);
        assert_eq!(files.len(), 2);
        assert_eq!(
            files[0].contents,
            "I_MOCK_HPP|inc|{unknown}|namespace a {\nnamespace b {|} // namespace b\n} // namespace a"
        );
        assert_eq!(files[1].path, PathBuf::from("gen/I_mock.cpp"));
        assert_eq!(files[1].contents, "#include \"gen/I_mock.hpp\" // I_mock.cpp I_MOCK_CPP");
        Ok(())
    }

    #[test]
    fn test_empty_header_template_skips_header() -> Result<()> {
        let i = record("i.hpp", "struct I { virtual void f() = 0; };", "I")?;
        let config = GeneratorConfig {
            file_template_hpp: String::new(),
            ..GeneratorConfig::default()
        };
        assert!(Generator::new(&config, "gen").render(&i).is_empty());
        Ok(())
    }

    #[test]
    fn test_expr_filter_and_file_clash() -> Result<()> {
        let source = "namespace a { struct I { virtual void f() = 0; }; }\nnamespace b { struct I { virtual void g() = 0; }; }";
        let model = InterfaceModel::new(CppHarness::default().extract("two.hpp", source)?.records);
        let config = GeneratorConfig::default();
        let generator = Generator::new(&config, "gen");

        let only_a = generator.render_model(&model, "a::")?;
        assert_eq!(only_a.len(), 1);
        assert!(only_a[0].contents.contains("MOCK_METHOD0(f, void());"));

        let err = generator.render_model(&model, "").unwrap_err();
        assert!(err.to_string().contains("IMock.hpp"));
        Ok(())
    }

    #[test]
    fn test_generate_writes_into_nested_dirs() -> Result<()> {
        let dir = TempDir::new()?;
        let i = record("i.hpp", "struct I { virtual void f() = 0; };", "I")?;
        let config = GeneratorConfig {
            mock_file_hpp: "mocks/{interface}Mock.hpp".to_string(),
            ..GeneratorConfig::default()
        };
        let written = Generator::new(&config, dir.path()).generate(&InterfaceModel::new(vec![i]), "")?;
        assert_eq!(written, vec![dir.path().join("mocks/IMock.hpp")]);
        let contents = fs::read_to_string(&written[0])?;
        assert!(contents.starts_with("#ifndef MOCKS_IMOCK_HPP\n"));
        Ok(())
    }

    #[test]
    fn test_substitute_keeps_unknown_groups() {
        let vars = FxHashMap::from_iter([("a", "1".to_string())]);
        assert_eq!(substitute("{a}{b}{ {a} }{", &vars), "1{b}{ 1 }{");
    }

    #[test]
    fn test_operator_table_lookup() {
        assert_eq!(operator_alias("operator[]"), Some("array_subscript_operator"));
        assert_eq!(operator_alias("operator->*"), Some("pointer_to_member_selection_operator"));
        assert_eq!(operator_alias("operator new"), None);
        assert_eq!(OPERATORS.len(), 38);
    }
}

#[cfg(test)]
mod edge_case_tests {
    use crate::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use protocol::{Access, NameKind};

    #[test]
    fn test_nvi_private_pure_virtual() -> Result<()> {
        let source = r#"
class Widget {
public:
    void draw() { do_draw(); }
    virtual ~Widget() {}
private:
    virtual void do_draw() = 0;
};
"#;
        let model = CppHarness::default().extract("widget.hpp", source)?;
        let widget = model.record("Widget").unwrap();
        assert!(widget.method("draw").is_none());
        let do_draw = widget.method("do_draw").unwrap();
        assert!(do_draw.is_pure_virtual);
        assert_eq!(do_draw.access, Access::Private);
        assert_eq!(widget.mandatory_methods().count(), 1);
        Ok(())
    }

    #[test]
    fn test_class_head_specifiers() -> Result<()> {
        let source = r#"
class __declspec(dllexport) A { public: virtual void a() = 0; };
struct alignas(16) B { virtual void b() = 0; };
class __attribute__((visibility("default"))) C { public: virtual void c() = 0; };
struct [[nodiscard]] D : public Base<decltype(make(1, 2))> { virtual void d() = 0; };
"#;
        let model = CppHarness::default().extract("heads.hpp", source)?;
        let names: Vec<_> = model.records.iter().map(|r| r.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
        assert_eq!(model.record("D").unwrap().bases.len(), 1);
        assert!(model.diagnostics.is_empty());
        Ok(())
    }

    #[test]
    fn test_elaborated_return_type_is_not_a_class_head() -> Result<()> {
        let source = "struct S; struct I { virtual void f() = 0; struct S make(); };";
        let model = CppHarness::default().extract("e.hpp", source)?;
        assert_eq!(model.records.len(), 1);
        assert_eq!(model.records[0].methods.len(), 1);
        assert!(model.diagnostics.is_empty());
        Ok(())
    }

    #[test]
    fn test_comments_never_reach_the_model() -> Result<()> {
        let plain = "class I { public: virtual int f(int a) const = 0; };";
        let commented = r#"
class I { /* open */ public: // access
    virtual /* q */ int f(int /* unnamed? */ a) const = 0; // trailing
};
"#;
        let a = CppHarness::default().extract("a.hpp", plain)?;
        let b = CppHarness::default().extract("b.hpp", commented)?;
        assert_eq!(a.records[0].methods, b.records[0].methods);
        Ok(())
    }

    #[test]
    fn test_whitespace_does_not_change_signatures() -> Result<()> {
        let compact = "struct S{virtual const std::vector<int>&get(int,double d=1.5)const=0;};";
        let spaced = r#"
struct S {
    virtual const std::vector< int > &
        get( int , double d = 1.5 ) const = 0 ;
};
"#;
        let a = CppHarness::default().extract("a.hpp", compact)?;
        let b = CppHarness::default().extract("b.hpp", spaced)?;
        assert_eq!(a.records[0].methods, b.records[0].methods);
        assert_eq!(a.records[0].fingerprint, b.records[0].fingerprint);
        Ok(())
    }

    #[test]
    fn test_nested_namespace_shorthand() -> Result<()> {
        let source = r#"
namespace a::b::c {
    class Deep { public: virtual void f() = 0; };
}
inline namespace v1 { class Versioned { public: virtual void g() = 0; }; }
"#;
        let model = CppHarness::default().extract("deep.hpp", source)?;
        let deep = model.record("a::b::c::Deep").unwrap();
        assert_eq!(deep.namespaces, vec!["a", "b", "c"]);
        assert!(model.record("v1::Versioned").is_some());
        Ok(())
    }

    #[test]
    fn test_override_and_final_methods() -> Result<()> {
        let source = r#"
struct Base { virtual void f() = 0; virtual void g() = 0; };
struct Partial : Base {
    void f() override;
    void g() final {}
    virtual void h() = 0;
};
"#;
        let model = CppHarness::default().extract("o.hpp", source)?;
        let partial = model.record("Partial").unwrap();
        assert_eq!(partial.bases, vec!["Base"]);
        let names: Vec<_> = partial.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["f", "g", "h"]);
        assert!(partial.methods[0].is_overridable());
        assert!(partial.methods[1].defined_inline);
        Ok(())
    }

    #[test]
    fn test_operators_of_all_shapes() -> Result<()> {
        let source = r#"
class Ops {
public:
    virtual Ops& operator=(const Ops&) = 0;
    virtual bool operator==(const Ops& other) const = 0;
    virtual Ops& operator<<(int) = 0;
    virtual Ops& operator++() = 0;
    virtual void* operator new(std::size_t size) = 0;
    virtual explicit operator bool() const = 0;
};
"#;
        let model = CppHarness::default().extract("ops.hpp", source)?;
        let ops = model.record("Ops").unwrap();
        let names: Vec<_> = ops.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["operator=", "operator==", "operator<<", "operator++", "operator new", "operator bool"]
        );
        assert_eq!(ops.methods[5].kind, NameKind::Conversion);
        Ok(())
    }

    #[test]
    fn test_inline_bodies_are_skipped() -> Result<()> {
        let source = r#"
class I {
public:
    I() : value_(0), items_{1, 2} { if (value_) { value_ = 1; } }
    virtual int get() const { return value_ > 0 ? value_ : -1; }
    virtual void set(int v) = 0;
private:
    int value_;
    int items_[2];
};
"#;
        let model = CppHarness::default().extract("i.hpp", source)?;
        let record = model.record("I").unwrap();
        let names: Vec<_> = record.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["get", "set"]);
        Ok(())
    }

    #[test]
    fn test_header_guard_and_ifndef_feature() -> Result<()> {
        let source = r#"
#ifndef GUARD_HPP
#define GUARD_HPP
#define WITH_EXTRA
class I {
public:
    virtual void base() = 0;
#ifdef WITH_EXTRA
    virtual void extra() = 0;
#else
    virtual void fallback() = 0;
#endif
#ifndef WITH_EXTRA
    virtual void never() = 0;
#endif
};
#endif
"#;
        let model = CppHarness::default().extract("guard.hpp", source)?;
        let names: Vec<_> = model.records[0].methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["base", "extra"]);
        Ok(())
    }

    #[test]
    fn test_unnamed_parameters_and_variadics() -> Result<()> {
        let source = r#"
class Log {
public:
    virtual void printf(const char* format, ...) = 0;
    virtual void write(const char*, unsigned long long) = 0;
};
"#;
        let model = CppHarness::default().extract("log.hpp", source)?;
        let log = model.record("Log").unwrap();
        let printf = log.method("printf").unwrap();
        assert_eq!(printf.arity(), 2);
        assert_eq!(printf.parameters[1].ty.base, "...");
        let write = log.method("write").unwrap();
        assert!(write.parameters.iter().all(|p| p.name.is_none()));
        assert_eq!(write.parameters[1].ty.base, "unsigned long long");
        Ok(())
    }

    #[test]
    fn test_empty_and_declaration_free_units() -> Result<()> {
        assert!(CppHarness::default().extract("empty.hpp", "")?.records.is_empty());
        let model = CppHarness::default().extract("free.hpp", "int f(); extern int x;\nclass Fwd;\n")?;
        assert!(model.records.is_empty());
        assert!(model.diagnostics.is_empty());
        Ok(())
    }
}

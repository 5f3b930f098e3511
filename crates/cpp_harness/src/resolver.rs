//! Scope resolution and the per-unit redefinition policy.

use crate::normalizer::{best_effort_name, Normalizer};
use crate::parser::{Member, Scope, ScopeId, ScopeTree};
use indexmap::IndexMap;
use protocol::{Diagnostic, InterfaceRecord, MethodSignature, Position, RedefinitionOutcome};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use tracing::debug;

/// Everything one unit contributes to the Interface Model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitModel {
    pub unit: String,
    pub records: Vec<InterfaceRecord>,
    /// Classes whose last definition here has no pure virtual methods.
    pub plain_classes: Vec<PlainClass>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A class that is not an interface. When merged after a unit that made it
/// one, it takes the interface out of the model again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainClass {
    pub qualified_name: String,
    pub boundary: Option<String>,
    pub position: Position,
}

impl UnitModel {
    pub fn record(&self, qualified_name: &str) -> Option<&InterfaceRecord> {
        self.records.iter().find(|r| r.qualified_name == qualified_name)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }
}

/// One class definition before the redefinition policy is applied.
#[derive(Debug, Clone)]
struct ClassDefinition {
    scope: ScopeId,
    qualified_name: String,
    position: Position,
    methods: Vec<MethodSignature>,
}

impl ClassDefinition {
    fn method_names(&self) -> BTreeSet<&str> {
        self.methods
            .iter()
            .filter(|m| !m.is_destructor())
            .map(|m| m.name.as_str())
            .collect()
    }

    fn has_destructor(&self) -> bool {
        self.methods.iter().any(MethodSignature::is_destructor)
    }

    fn has_pure_virtual(&self) -> bool {
        self.methods.iter().any(MethodSignature::is_mandatory_override)
    }
}

type DefinitionKey = (String, Option<String>);

pub fn resolve(unit: &str, tree: &ScopeTree) -> UnitModel {
    let mut diagnostics = Vec::new();
    let mut groups: IndexMap<DefinitionKey, Vec<ClassDefinition>> = IndexMap::new();

    for scope in tree.class_scopes() {
        let definition = define(unit, tree, scope, &mut diagnostics);
        let key = (definition.qualified_name.clone(), boundary(unit, tree, scope.id));
        groups.entry(key).or_default().push(definition);
    }

    let mut records = Vec::new();
    let mut plain_classes = Vec::new();
    for ((qualified_name, boundary), definitions) in groups {
        let redefinition = redefinition_outcome(unit, &qualified_name, &definitions, &mut diagnostics);
        let Some(last) = definitions.into_iter().last() else {
            continue;
        };
        if !last.has_pure_virtual() {
            debug!("{}: `{}` has no pure virtual methods", unit, qualified_name);
            plain_classes.push(PlainClass {
                qualified_name,
                boundary,
                position: last.position,
            });
            continue;
        }

        let scope = tree.get(last.scope);
        let body = scope.class.clone().unwrap_or_default();
        let mut record = InterfaceRecord {
            qualified_name,
            name: scope.name.clone(),
            class_key: body.key(),
            namespaces: tree.namespaces(last.scope),
            enclosing_classes: tree.enclosing_classes(last.scope),
            template_params: body.template_params,
            bases: body.bases,
            methods: last.methods,
            redefinition,
            unit: unit.to_string(),
            position: last.position,
            boundary,
            fingerprint: String::new(),
        };
        record.fingerprint = record.compute_fingerprint();
        debug!(
            "{}: interface `{}` with {} methods",
            unit,
            record.qualified_name,
            record.methods.len()
        );
        records.push(record);
    }

    UnitModel {
        unit: unit.to_string(),
        records,
        plain_classes,
        diagnostics,
    }
}

fn define(unit: &str, tree: &ScopeTree, scope: &Scope, diagnostics: &mut Vec<Diagnostic>) -> ClassDefinition {
    let qualified_name = tree.qualified_name(scope.id);
    let mut facts = enclosing_facts(tree, scope);
    let mut methods = Vec::new();

    let members = scope.class.as_ref().map_or(&[][..], |body| &body.members[..]);
    for member in members {
        match member {
            Member::TypeFact(fact) => {
                facts.insert(fact.name.clone(), format!("{}::{}", qualified_name, fact.name));
            }
            Member::Method(span) => match Normalizer::new(&facts).normalize(span) {
                Ok(signature) => methods.push(signature),
                Err(reason) => {
                    let name = best_effort_name(&span.tokens);
                    diagnostics.push(Diagnostic::warning(
                        unit,
                        span.position,
                        format!("could not parse `{}` in `{}`: {}", name, qualified_name, reason),
                    ));
                    let mut placeholder =
                        MethodSignature::placeholder(name, span.text(), reason.to_string(), span.access);
                    placeholder.is_virtual = span.is_virtual();
                    placeholder.is_pure_virtual = span.is_pure_virtual();
                    methods.push(placeholder);
                }
            },
            Member::Class(_) | Member::Other { .. } => {}
        }
    }

    ClassDefinition {
        scope: scope.id,
        qualified_name,
        position: scope.position,
        methods,
    }
}

/// Type facts of the enclosing classes declared before `scope`.
fn enclosing_facts(tree: &ScopeTree, scope: &Scope) -> FxHashMap<String, String> {
    let mut facts = FxHashMap::default();
    let path = tree.path(scope.id);
    for outer in &path[..path.len().saturating_sub(1)] {
        let Some(body) = outer.class.as_ref() else {
            continue;
        };
        let outer_name = tree.qualified_name(outer.id);
        for member in &body.members {
            if let Member::TypeFact(fact) = member {
                if fact.position < scope.position {
                    facts.insert(fact.name.clone(), format!("{}::{}", outer_name, fact.name));
                }
            }
        }
    }
    facts
}

/// Anonymous namespaces between the unit root and `id`, as a key that no
/// other unit can produce.
fn boundary(unit: &str, tree: &ScopeTree, id: ScopeId) -> Option<String> {
    let anonymous = tree.anonymous_ancestors(id);
    if anonymous.is_empty() {
        return None;
    }
    let positions: Vec<String> = anonymous.iter().map(|scope| scope.position.to_string()).collect();
    Some(format!("{}@{}", unit, positions.join("/")))
}

fn redefinition_outcome(
    unit: &str,
    qualified_name: &str,
    definitions: &[ClassDefinition],
    diagnostics: &mut Vec<Diagnostic>,
) -> RedefinitionOutcome {
    if definitions.len() < 2 {
        return RedefinitionOutcome::Unique;
    }

    let mut method_set_changed = false;
    for pair in definitions.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        let mut message = format!(
            "`{}` redefined; keeping this definition over the one at {}",
            qualified_name, previous.position
        );
        if previous.method_names() != current.method_names() {
            method_set_changed = true;
            message.push_str(" (method names differ)");
        }
        if previous.has_destructor() != current.has_destructor() {
            method_set_changed = true;
            message.push_str(" (destructor presence differs)");
        }
        diagnostics.push(Diagnostic::warning(unit, current.position, message));
    }

    RedefinitionOutcome::Replaced {
        discarded: definitions.len() - 1,
        method_set_changed,
    }
}

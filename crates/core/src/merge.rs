use cpp_harness::{PlainClass, UnitModel};
use indexmap::IndexMap;
use protocol::{
    Diagnostic, InterfaceModel, InterfaceRecord, NameCollisionError, RedefinitionOutcome,
};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

type RecordKey = (String, Option<String>);

/// The finalized result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedModel {
    #[serde(flatten)]
    pub model: InterfaceModel,
    pub diagnostics: Vec<Diagnostic>,
    pub units: usize,
}

#[derive(Debug, Default)]
pub struct ModelBuilder {
    records: IndexMap<RecordKey, InterfaceRecord>,
    diagnostics: Vec<Diagnostic>,
    units: usize,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unit(&mut self, unit: UnitModel) {
        debug!("Merging {} ({} interfaces)", unit.unit, unit.records.len());
        self.units += 1;
        self.diagnostics.extend(unit.diagnostics);
        for record in unit.records {
            self.insert(record);
        }
        for plain in unit.plain_classes {
            self.remove(plain, &unit.unit);
        }
    }

    /// A later plain definition wins over an earlier interface just as it
    /// does within one unit, so the interface leaves the model.
    fn remove(&mut self, plain: PlainClass, unit: &str) {
        let key = (plain.qualified_name, plain.boundary);
        let Some(existing) = self.records.shift_remove(&key) else {
            return;
        };
        let message = format!(
            "`{}` redefined without pure virtual methods; dropping the interface at {}:{}",
            key.0, existing.unit, existing.position
        );
        self.diagnostics
            .push(Diagnostic::warning(unit.to_string(), plain.position, message));
    }

    fn insert(&mut self, mut record: InterfaceRecord) {
        let key = (record.qualified_name.clone(), record.boundary.clone());
        let Some(existing) = self.records.get_mut(&key) else {
            self.records.insert(key, record);
            return;
        };

        let mut message = format!(
            "`{}` redefined; keeping this definition over the one at {}:{}",
            record.qualified_name, existing.unit, existing.position
        );
        let names_differ = method_names(existing) != method_names(&record);
        let destructor_differs = existing.has_destructor() != record.has_destructor();
        if names_differ {
            message.push_str(" (method names differ)");
        }
        if destructor_differs {
            message.push_str(" (destructor presence differs)");
        }
        self.diagnostics
            .push(Diagnostic::warning(record.unit.clone(), record.position, message));

        let (earlier_discarded, earlier_changed) = replaced(&existing.redefinition);
        let (own_discarded, own_changed) = replaced(&record.redefinition);
        record.redefinition = RedefinitionOutcome::Replaced {
            discarded: earlier_discarded + own_discarded + 1,
            method_set_changed: earlier_changed || own_changed || names_differ || destructor_differs,
        };
        *existing = record;
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Close the model. Fails when one qualified name stands for two
    /// classes, which only anonymous namespaces can produce.
    pub fn finalize(self) -> Result<MergedModel, NameCollisionError> {
        let mut first_seen: FxHashMap<&str, &InterfaceRecord> = FxHashMap::default();
        for record in self.records.values() {
            if let Some(first) = first_seen.insert(&record.qualified_name, record) {
                return Err(NameCollisionError {
                    qualified_name: record.qualified_name.clone(),
                    first_unit: first.unit.clone(),
                    first_position: first.position,
                    second_unit: record.unit.clone(),
                    second_position: record.position,
                });
            }
        }

        for diagnostic in &self.diagnostics {
            warn!("{}", diagnostic);
        }

        Ok(MergedModel {
            model: InterfaceModel::new(self.records.into_values().collect()),
            diagnostics: self.diagnostics,
            units: self.units,
        })
    }
}

fn method_names(record: &InterfaceRecord) -> BTreeSet<&str> {
    record
        .methods
        .iter()
        .filter(|m| !m.is_destructor())
        .map(|m| m.name.as_str())
        .collect()
}

fn replaced(outcome: &RedefinitionOutcome) -> (usize, bool) {
    match outcome {
        RedefinitionOutcome::Unique => (0, false),
        RedefinitionOutcome::Replaced {
            discarded,
            method_set_changed,
        } => (*discarded, *method_set_changed),
    }
}

//! Property redirectors: renamed fields keep loading from old saves

use crate::engine::{ClassId, ClassRegistry};
use std::collections::BTreeMap;

/// Per-class table of old field name -> new field name
///
/// Tables are keyed by class path or short class name and are inherited:
/// a redirector registered on `Door` also applies to `VaultDoor`.
#[derive(Debug, Clone, Default)]
pub struct Redirectors {
    tables: BTreeMap<String, BTreeMap<String, String>>,
}

impl Redirectors {
    pub fn new(tables: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        Redirectors { tables }
    }

    /// New name for `old_name` on `class`, searching the class and then its parents
    pub fn lookup(&self, classes: &ClassRegistry, class: ClassId, old_name: &str) -> Option<&str> {
        classes.ancestry(class).find_map(|id| {
            [classes.path_of(id), classes.name_of(id)]
                .into_iter()
                .filter_map(|key| self.tables.get(key))
                .find_map(|table| table.get(old_name))
                .map(String::as_str)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

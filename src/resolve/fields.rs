// Foxscream Field Resolution
// Flattens a class's ancestry into per-name address tables, computed once
// when the class is defined

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use super::ResolveError;
use crate::runtime::Value;

/// A field name together with how many inheritance steps away it lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAddress {
    pub name: String,
    pub distance: u32,
}

#[derive(Clone)]
pub enum Slot {
    /// Nearest definition, held by `owner`
    Owned { owner: Value, address: FieldAddress },
    /// Several different owners at the same minimal distance
    Ambiguous { address: FieldAddress, owners: usize },
}

impl Slot {
    pub fn address(&self) -> &FieldAddress {
        match self {
            Slot::Owned { address, .. } | Slot::Ambiguous { address, .. } => address,
        }
    }
}

/// name -> nearest owner
#[derive(Clone, Default)]
pub struct AddressTable {
    slots: FxHashMap<String, Slot>,
}

impl AddressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `owner` as defining `name` at `distance`. A nearer definition
    /// replaces a farther one; a different owner at the same distance makes
    /// the name ambiguous.
    pub fn add_unique(&mut self, name: &str, owner: &Value, distance: u32) {
        let address = FieldAddress {
            name: name.to_string(),
            distance,
        };
        let Some(slot) = self.slots.get_mut(name) else {
            self.slots.insert(
                name.to_string(),
                Slot::Owned {
                    owner: owner.clone(),
                    address,
                },
            );
            return;
        };

        let current = slot.address().distance;
        if distance < current {
            *slot = Slot::Owned {
                owner: owner.clone(),
                address,
            };
            return;
        }
        if distance > current {
            return;
        }
        let same_owner = matches!(slot, Slot::Owned { owner: existing, .. } if existing.ptr_eq(owner));
        match slot {
            Slot::Ambiguous { owners, .. } => *owners += 1,
            Slot::Owned { .. } if !same_owner => {
                *slot = Slot::Ambiguous {
                    address,
                    owners: 2,
                };
            }
            Slot::Owned { .. } => {}
        }
    }

    pub fn get(&self, name: &str) -> Option<&Slot> {
        self.slots.get(name)
    }

    /// Nearest owner of `name`, or an ambiguity error
    pub fn lookup(&self, name: &str) -> Result<Option<(Value, u32)>, ResolveError> {
        match self.slots.get(name) {
            None => Ok(None),
            Some(Slot::Owned { owner, address }) => Ok(Some((owner.clone(), address.distance))),
            Some(Slot::Ambiguous { address, owners }) => Err(ResolveError::AmbiguousField {
                name: name.to_string(),
                owners: *owners,
                distance: address.distance,
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Slot)> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Flattened view of a class: every ancestor with its hop count, and the
/// nearest owner of every class field and instance-template field
#[derive(Clone, Default)]
pub struct Resolution {
    /// Ascending distance, declaration order within a distance
    pub ancestry: Vec<(Value, u32)>,
    pub class_fields: AddressTable,
    pub instance_fields: AddressTable,
}

impl Resolution {
    pub fn distance_to(&self, ancestor: &Value) -> Option<u32> {
        self.ancestry
            .iter()
            .find(|(class, _)| class.ptr_eq(ancestor))
            .map(|(_, distance)| *distance)
    }
}

/// Breadth-first walk over `parents`, keeping the minimum hop count at which
/// each ancestor is reachable. Direct parents are at distance 1.
pub fn resolve_parents(parents: &[Value]) -> Vec<(Value, u32)> {
    let mut seen: FxHashSet<u64> = FxHashSet::default();
    let mut ancestry = Vec::new();
    let mut queue: VecDeque<(Value, u32)> = parents.iter().map(|p| (p.clone(), 1)).collect();

    while let Some((class, distance)) = queue.pop_front() {
        if !seen.insert(class.id()) {
            continue;
        }
        for parent in class.borrow().parents.iter() {
            queue.push_back((parent.clone(), distance + 1));
        }
        ancestry.push((class, distance));
    }

    ancestry
}

/// Build the resolution tables for `class` from its current parents, class
/// fields and instance template
pub fn resolve(class: &Value) -> Resolution {
    let parents = class.borrow().parents.clone();
    let ancestry = resolve_parents(&parents);

    let mut class_fields = AddressTable::new();
    let mut instance_fields = AddressTable::new();

    {
        let own = class.borrow();
        for name in own.fields.keys() {
            class_fields.add_unique(name, class, 0);
        }
        for name in own.template.keys() {
            instance_fields.add_unique(name, class, 0);
        }
    }

    for (ancestor, distance) in &ancestry {
        let object = ancestor.borrow();
        for name in object.fields.keys() {
            class_fields.add_unique(name, ancestor, *distance);
        }
        for name in object.template.keys() {
            instance_fields.add_unique(name, ancestor, *distance);
        }
    }

    Resolution {
        ancestry,
        class_fields,
        instance_fields,
    }
}

/// Hop count from `class` up to `ancestor` (0 when they are the same class)
pub fn ancestor_distance(class: &Value, ancestor: &Value) -> Option<u32> {
    if class.ptr_eq(ancestor) {
        return Some(0);
    }
    let resolution = class.borrow().resolution.clone();
    match resolution {
        Some(resolution) => resolution.distance_to(ancestor),
        None => resolve_parents(&class.borrow().parents)
            .into_iter()
            .find(|(c, _)| c.ptr_eq(ancestor))
            .map(|(_, d)| d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ClassKind;
    use crate::runtime::{ClassLink, Object, ObjectKind, Payload};
    use pretty_assertions::assert_eq;

    fn class(name: &str, parents: &[&Value], template: &[&str]) -> Value {
        let mut object = Object::new(
            ObjectKind::Class(ClassKind::Class),
            ClassLink::SelfClass,
            Payload::None,
        );
        object.name = name.to_string();
        object.parents = parents.iter().map(|p| (*p).clone()).collect();
        for field in template {
            let value = Value::new(Object::new(
                ObjectKind::Primitive,
                ClassLink::SelfClass,
                Payload::Int(0),
            ));
            object.template.insert(field.to_string(), value);
        }
        let value = Value::new(object);
        let resolution = resolve(&value);
        value.borrow_mut().resolution = Some(std::rc::Rc::new(resolution));
        value
    }

    fn owner_name(table: &AddressTable, field: &str) -> (String, u32) {
        match table.lookup(field) {
            Ok(Some((owner, distance))) => (owner.name(), distance),
            _ => panic!("field {} not resolved", field),
        }
    }

    #[test]
    fn test_nearest_definition_wins() {
        let a = class("A", &[], &["x"]);
        let b = class("B", &[&a], &["y"]);
        let c = class("C", &[&b], &["x"]);

        let resolution = resolve(&c);
        assert_eq!(owner_name(&resolution.instance_fields, "x"), ("C".into(), 0));
        assert_eq!(owner_name(&resolution.instance_fields, "y"), ("B".into(), 1));
    }

    #[test]
    fn test_diamond_collapses_to_shortest_path() {
        let top = class("Top", &[], &["v"]);
        let left = class("Left", &[&top], &[]);
        let right = class("Right", &[&top], &[]);
        let bottom = class("Bottom", &[&left, &right], &[]);

        let ancestry = resolve_parents(&bottom.borrow().parents);
        let names: Vec<(String, u32)> = ancestry.iter().map(|(c, d)| (c.name(), *d)).collect();
        assert_eq!(
            names,
            vec![("Left".into(), 1), ("Right".into(), 1), ("Top".into(), 2)]
        );

        let resolution = resolve(&bottom);
        assert_eq!(owner_name(&resolution.instance_fields, "v"), ("Top".into(), 2));
    }

    #[test]
    fn test_equal_distance_collision_is_ambiguous() {
        let left = class("Left", &[], &["v"]);
        let right = class("Right", &[], &["v"]);
        let both = class("Both", &[&left, &right], &[]);

        let resolution = resolve(&both);
        assert_eq!(
            resolution.instance_fields.lookup("v").err(),
            Some(ResolveError::AmbiguousField {
                name: "v".into(),
                owners: 2,
                distance: 1
            })
        );
    }

    #[test]
    fn test_ancestor_distance() {
        let a = class("A", &[], &[]);
        let b = class("B", &[&a], &[]);
        let c = class("C", &[&b], &[]);

        assert_eq!(ancestor_distance(&c, &c), Some(0));
        assert_eq!(ancestor_distance(&c, &a), Some(2));
        assert_eq!(ancestor_distance(&a, &c), None);
    }
}

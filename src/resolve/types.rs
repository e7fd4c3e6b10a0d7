// Foxscream Type Specs
// Declared and candidate type descriptors and the distance-scored matcher

use std::fmt;

use super::fields::ancestor_distance;
use crate::runtime::Value;

/// A type descriptor. Declared types come from annotations; candidate types
/// describe a runtime value (its class plus its data fields).
#[derive(Clone, Default)]
pub struct TypeSpec {
    /// Named class, matched through the candidate's ancestry
    pub nominal: Option<Value>,
    /// Structural fields
    pub fields: Vec<(String, TypeSpec)>,
    /// `A | B`: any alternative
    pub variants: Vec<TypeSpec>,
    /// `A & B`: every member
    pub union: Vec<TypeSpec>,
    /// `- B`: hard veto
    pub exclusions: Vec<TypeSpec>,
}

impl TypeSpec {
    pub fn nominal(class: Value) -> Self {
        Self {
            nominal: Some(class),
            ..Self::default()
        }
    }

    pub fn structural(fields: Vec<(String, TypeSpec)>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    pub fn variants(members: Vec<TypeSpec>) -> Self {
        Self {
            variants: members,
            ..Self::default()
        }
    }

    pub fn union(members: Vec<TypeSpec>) -> Self {
        Self {
            union: members,
            ..Self::default()
        }
    }

    pub fn excluding(mut self, excluded: Vec<TypeSpec>) -> Self {
        self.exclusions.extend(excluded);
        self
    }

    /// Candidate spec for an instance of `class` exposing `fields`
    pub fn of_class_with_fields(class: Value, fields: Vec<(String, TypeSpec)>) -> Self {
        Self {
            nominal: Some(class),
            fields,
            ..Self::default()
        }
    }

    fn is_pure_nominal(&self) -> bool {
        self.nominal.is_some()
            && self.fields.is_empty()
            && self.variants.is_empty()
            && self.union.is_empty()
            && self.exclusions.is_empty()
    }

    /// Same shape naming the same classes
    pub fn same_as(&self, other: &TypeSpec) -> bool {
        fn same_list(a: &[TypeSpec], b: &[TypeSpec]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
        }

        let nominal = match (&self.nominal, &other.nominal) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            (None, None) => true,
            _ => false,
        };
        nominal
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|((n1, t1), (n2, t2))| n1 == n2 && t1.same_as(t2))
            && same_list(&self.variants, &other.variants)
            && same_list(&self.union, &other.union)
            && same_list(&self.exclusions, &other.exclusions)
    }
}

fn min_opt(best: Option<u32>, candidate: u32) -> Option<u32> {
    Some(best.map_or(candidate, |b| b.min(candidate)))
}

/// Score how well `candidate` satisfies `declared`. `None` is no match;
/// otherwise the distance, where lower is closer. Every applicable rule is
/// tried and the best distance wins.
pub fn type_match(declared: &TypeSpec, candidate: &TypeSpec) -> Option<u32> {
    if declared
        .exclusions
        .iter()
        .any(|excluded| type_match(excluded, candidate).is_some())
    {
        return None;
    }
    // Candidate exclusions veto only a `declared` type inside an excluded one
    if candidate
        .exclusions
        .iter()
        .any(|excluded| type_match(excluded, declared).is_some())
    {
        return None;
    }

    if declared.is_pure_nominal() && candidate.is_pure_nominal() && declared.same_as(candidate) {
        return Some(0);
    }

    let mut best: Option<u32> = None;

    if !declared.union.is_empty() {
        let mut worst = 0;
        for member in &declared.union {
            worst = worst.max(type_match(member, candidate)?);
        }
        best = min_opt(best, worst);
    }

    for member in &declared.variants {
        if let Some(distance) = type_match(member, candidate) {
            best = min_opt(best, distance);
        }
    }

    // A candidate with alternatives only satisfies `declared` if all of them do
    if !candidate.variants.is_empty() {
        let all: Option<Vec<u32>> = candidate
            .variants
            .iter()
            .map(|member| type_match(declared, member))
            .collect();
        if let Some(distances) = all {
            best = min_opt(best, distances.into_iter().max().unwrap_or(0));
        }
    }

    for member in &candidate.union {
        if let Some(distance) = type_match(declared, member) {
            best = min_opt(best, distance);
        }
    }

    if let (Some(wanted), Some(class)) = (&declared.nominal, &candidate.nominal) {
        if let Some(distance) = ancestor_distance(class, wanted) {
            best = min_opt(best, distance);
        }
    }

    if !declared.fields.is_empty() && !candidate.fields.is_empty() {
        let mut worst = Some(0u32);
        for (name, field_type) in &candidate.fields {
            worst = declared
                .fields
                .iter()
                .find(|(declared_name, _)| declared_name == name)
                .and_then(|(_, declared_type)| type_match(declared_type, field_type))
                .and_then(|distance| worst.map(|w| w.max(distance)));
            if worst.is_none() {
                break;
            }
        }
        if let Some(distance) = worst {
            best = min_opt(best, distance);
        }
    }

    best
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |members: &[TypeSpec], sep: &str| {
            members
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(sep)
        };

        let mut parts = Vec::new();
        if let Some(class) = &self.nominal {
            parts.push(class.name());
        }
        if !self.fields.is_empty() {
            let fields: Vec<String> = self
                .fields
                .iter()
                .map(|(name, ty)| format!("{}: {}", name, ty))
                .collect();
            parts.push(format!("{{{}}}", fields.join(", ")));
        }
        if !self.variants.is_empty() {
            parts.push(format!("({})", join(&self.variants, " | ")));
        }
        if !self.union.is_empty() {
            parts.push(format!("({})", join(&self.union, " & ")));
        }
        let mut text = if parts.is_empty() {
            "object".to_string()
        } else {
            parts.join(" ")
        };
        for excluded in &self.exclusions {
            text.push_str(&format!(" - {}", excluded));
        }
        write!(f, "{}", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ClassKind;
    use crate::resolve::resolve;
    use crate::runtime::{ClassLink, Object, ObjectKind, Payload};
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn class(name: &str, parents: &[&Value]) -> Value {
        let mut object = Object::new(
            ObjectKind::Class(ClassKind::Class),
            ClassLink::SelfClass,
            Payload::None,
        );
        object.name = name.to_string();
        object.parents = parents.iter().map(|p| (*p).clone()).collect();
        let value = Value::new(object);
        let resolution = resolve(&value);
        value.borrow_mut().resolution = Some(Rc::new(resolution));
        value
    }

    struct Hierarchy {
        object: Value,
        number: Value,
        int: Value,
        float: Value,
        str: Value,
    }

    fn hierarchy() -> Hierarchy {
        let object = class("object", &[]);
        let number = class("number", &[&object]);
        let int = class("int", &[&number]);
        let float = class("float", &[&number]);
        let str = class("str", &[&object]);
        Hierarchy {
            object,
            number,
            int,
            float,
            str,
        }
    }

    fn named(class: &Value) -> TypeSpec {
        TypeSpec::nominal(class.clone())
    }

    #[test]
    fn test_identity_and_ancestry() {
        let h = hierarchy();
        assert_eq!(type_match(&named(&h.int), &named(&h.int)), Some(0));
        assert_eq!(type_match(&named(&h.number), &named(&h.int)), Some(1));
        assert_eq!(type_match(&named(&h.object), &named(&h.int)), Some(2));
        assert_eq!(type_match(&named(&h.int), &named(&h.number)), None);
        assert_eq!(type_match(&named(&h.str), &named(&h.int)), None);
    }

    #[test]
    fn test_variants_take_best_member() {
        let h = hierarchy();
        let declared = TypeSpec::variants(vec![named(&h.object), named(&h.int)]);
        assert_eq!(type_match(&declared, &named(&h.int)), Some(0));
        assert_eq!(type_match(&declared, &named(&h.str)), Some(1));
    }

    #[test]
    fn test_union_takes_worst_member() {
        let h = hierarchy();
        let declared = TypeSpec::union(vec![named(&h.number), named(&h.object)]);
        assert_eq!(type_match(&declared, &named(&h.float)), Some(2));

        let impossible = TypeSpec::union(vec![named(&h.int), named(&h.str)]);
        assert_eq!(type_match(&impossible, &named(&h.int)), None);
    }

    #[test]
    fn test_exclusion_is_a_hard_veto() {
        let h = hierarchy();
        let declared = named(&h.number).excluding(vec![named(&h.float)]);
        assert_eq!(type_match(&declared, &named(&h.int)), Some(1));
        assert_eq!(type_match(&declared, &named(&h.float)), None);
    }

    #[test]
    fn test_candidate_exclusion_only_vetoes_excluded_targets() {
        let h = hierarchy();
        let candidate = named(&h.number).excluding(vec![named(&h.float)]);
        assert_eq!(type_match(&named(&h.number), &candidate), Some(0));
        assert_eq!(type_match(&named(&h.object), &candidate), Some(1));
        assert_eq!(type_match(&named(&h.float), &candidate), None);
    }

    #[test]
    fn test_structural_requires_candidate_fields_on_declared() {
        let h = hierarchy();
        let declared = TypeSpec::structural(vec![
            ("x".into(), named(&h.number)),
            ("y".into(), named(&h.number)),
        ]);
        let point = class("Point", &[&h.object]);

        let candidate = TypeSpec::of_class_with_fields(
            point.clone(),
            vec![("x".into(), named(&h.int)), ("y".into(), named(&h.float))],
        );
        assert_eq!(type_match(&declared, &candidate), Some(1));

        let extra = TypeSpec::of_class_with_fields(
            point,
            vec![("x".into(), named(&h.int)), ("z".into(), named(&h.int))],
        );
        assert_eq!(type_match(&declared, &extra), None);

        // Values without data fields never match a structural type
        assert_eq!(type_match(&declared, &named(&h.int)), None);
    }

    #[test]
    fn test_candidate_variants_must_all_match() {
        let h = hierarchy();
        let candidate = TypeSpec::variants(vec![named(&h.int), named(&h.float)]);
        assert_eq!(type_match(&named(&h.number), &candidate), Some(1));
        assert_eq!(type_match(&named(&h.int), &candidate), None);
    }

    #[test]
    fn test_display() {
        let h = hierarchy();
        let spec = TypeSpec::variants(vec![named(&h.int), named(&h.str)]);
        assert_eq!(spec.to_string(), "(int | str)");
        assert_eq!(
            named(&h.number).excluding(vec![named(&h.float)]).to_string(),
            "number - float"
        );
    }
}

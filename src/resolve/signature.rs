// Foxscream Call Signatures
// Binds call-site arguments to parameters and picks the best overload

use tracing::debug;

use super::types::{type_match, TypeSpec};
use super::ResolveError;

#[derive(Clone)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeSpec,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: TypeSpec) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Declared parameters and return type of one overload
#[derive(Clone, Default)]
pub struct CallSignature {
    pub return_type: Option<TypeSpec>,
    /// Required parameters
    pub positional: Vec<Parameter>,
    /// Parameters with defaults
    pub keyword: Vec<Parameter>,
    pub var_positional: Option<Parameter>,
    pub var_keyword: Option<Parameter>,
}

impl CallSignature {
    pub fn parameter_count(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    pub fn parameter(&self, slot: usize) -> Option<&Parameter> {
        self.positional
            .get(slot)
            .or_else(|| self.keyword.get(slot.checked_sub(self.positional.len())?))
    }

    /// Identical parameter lists (types, keyword names and variadics)
    pub fn same_parameters(&self, other: &CallSignature) -> bool {
        fn same_optional(a: &Option<Parameter>, b: &Option<Parameter>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a.ty.same_as(&b.ty),
                (None, None) => true,
                _ => false,
            }
        }

        self.positional.len() == other.positional.len()
            && self
                .positional
                .iter()
                .zip(&other.positional)
                .all(|(a, b)| a.ty.same_as(&b.ty))
            && self.keyword.len() == other.keyword.len()
            && self
                .keyword
                .iter()
                .zip(&other.keyword)
                .all(|(a, b)| a.name == b.name && a.ty.same_as(&b.ty))
            && same_optional(&self.var_positional, &other.var_positional)
            && same_optional(&self.var_keyword, &other.var_keyword)
    }
}

/// The argument types seen at a call site
#[derive(Clone, Default)]
pub struct CallSite {
    pub positional: Vec<TypeSpec>,
    pub keyword: Vec<(String, TypeSpec)>,
    /// Set by typed assignments: `x: T = f(...)`
    pub expected_return: Option<TypeSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgRef {
    Positional(usize),
    Keyword(usize),
}

/// Where each call-site argument goes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallPlan {
    /// One entry per positional then keyword parameter
    pub slots: Vec<Option<ArgRef>>,
    /// Positional arguments collected by `*rest`
    pub extra_positional: Vec<usize>,
    /// Keyword arguments collected by `**opts`
    pub extra_keyword: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMatch {
    pub distance: u32,
    /// Arguments bound to named parameters
    pub bound: usize,
    pub plan: CallPlan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchFailure {
    /// Argument count or names cannot be bound
    Arity,
    /// Bound, but some argument or the return type does not match
    Type,
}

/// Score one signature against a call site
pub fn call_match(signature: &CallSignature, site: &CallSite) -> Result<CallMatch, MatchFailure> {
    let count = signature.parameter_count();
    let mut slots: Vec<Option<ArgRef>> = vec![None; count];
    let mut extra_positional = Vec::new();
    let mut extra_keyword = Vec::new();

    for i in 0..site.positional.len() {
        if i < count {
            slots[i] = Some(ArgRef::Positional(i));
        } else if signature.var_positional.is_some() {
            extra_positional.push(i);
        } else {
            return Err(MatchFailure::Arity);
        }
    }

    for (i, (name, _)) in site.keyword.iter().enumerate() {
        let target = (0..count).find(|&slot| {
            signature
                .parameter(slot)
                .is_some_and(|param| &param.name == name)
        });
        match target {
            Some(slot) if slots[slot].is_some() => return Err(MatchFailure::Arity),
            Some(slot) => slots[slot] = Some(ArgRef::Keyword(i)),
            None if signature.var_keyword.is_some() => extra_keyword.push(i),
            None => return Err(MatchFailure::Arity),
        }
    }

    if slots[..signature.positional.len()].iter().any(Option::is_none) {
        return Err(MatchFailure::Arity);
    }

    let mut distance: u32 = 0;
    if let (Some(expected), Some(declared)) = (&site.expected_return, &signature.return_type) {
        distance = type_match(expected, declared).ok_or(MatchFailure::Type)?;
    }

    let argument_type = |arg: ArgRef| match arg {
        ArgRef::Positional(i) => &site.positional[i],
        ArgRef::Keyword(i) => &site.keyword[i].1,
    };

    let mut bound = 0;
    for (slot, arg) in slots.iter().enumerate() {
        let (Some(arg), Some(param)) = (arg, signature.parameter(slot)) else {
            continue;
        };
        let d = type_match(&param.ty, argument_type(*arg)).ok_or(MatchFailure::Type)?;
        distance = distance.saturating_add(d);
        bound += 1;
    }

    if let Some(rest) = &signature.var_positional {
        for &i in &extra_positional {
            let d = type_match(&rest.ty, &site.positional[i]).ok_or(MatchFailure::Type)?;
            distance = distance.saturating_add(d);
        }
    }
    if let Some(options) = &signature.var_keyword {
        for &i in &extra_keyword {
            let d = type_match(&options.ty, &site.keyword[i].1).ok_or(MatchFailure::Type)?;
            distance = distance.saturating_add(d);
        }
    }

    Ok(CallMatch {
        distance,
        bound,
        plan: CallPlan {
            slots,
            extra_positional,
            extra_keyword,
        },
    })
}

/// Pick among `(signature, field distance)` candidates: most bound arguments,
/// then smallest total distance, then nearest definition. A remaining tie is
/// an ambiguity.
pub fn select_overload(
    candidates: &[(&CallSignature, u32)],
    site: &CallSite,
) -> Result<(usize, CallPlan), ResolveError> {
    let mut matches: Vec<(usize, CallMatch, u32)> = Vec::new();
    let mut arity_only = true;

    for (index, (signature, field_distance)) in candidates.iter().enumerate() {
        match call_match(signature, site) {
            Ok(found) => matches.push((index, found, *field_distance)),
            Err(MatchFailure::Type) => arity_only = false,
            Err(MatchFailure::Arity) => {}
        }
    }

    if matches.is_empty() {
        return Err(ResolveError::NoMatchingOverload { arity_only });
    }

    if let Some(most) = matches.iter().map(|(_, m, _)| m.bound).max() {
        matches.retain(|(_, m, _)| m.bound == most);
    }
    if let Some(least) = matches.iter().map(|(_, m, _)| m.distance).min() {
        matches.retain(|(_, m, _)| m.distance == least);
    }
    if let Some(nearest) = matches.iter().map(|(_, _, d)| *d).min() {
        matches.retain(|(_, _, d)| *d == nearest);
    }

    if matches.len() > 1 {
        return Err(ResolveError::AmbiguousOverload {
            candidates: matches.len(),
        });
    }

    match matches.pop() {
        Some((index, found, field_distance)) => {
            debug!(
                index,
                distance = found.distance,
                bound = found.bound,
                field_distance,
                "overload selected"
            );
            Ok((index, found.plan))
        }
        None => Err(ResolveError::NoMatchingOverload { arity_only }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ClassKind;
    use crate::resolve::resolve;
    use crate::runtime::{ClassLink, Object, ObjectKind, Payload, Value};
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

    fn ty(class: &Value) -> TypeSpec {
        TypeSpec::nominal(class.clone())
    }

    fn unary(param: &Value) -> CallSignature {
        CallSignature {
            positional: vec![Parameter::new("x", ty(param))],
            ..CallSignature::default()
        }
    }

    fn site(args: &[&Value]) -> CallSite {
        CallSite {
            positional: args.iter().map(|c| ty(c)).collect(),
            ..CallSite::default()
        }
    }

    #[test]
    fn test_int_overload_beats_number_overload() {
        let object = class("object", &[]);
        let number = class("number", &[&object]);
        let int = class("int", &[&number]);

        let by_number = unary(&number);
        let by_int = unary(&int);
        let candidates = [(&by_number, 0), (&by_int, 0)];

        let (index, _) = select_overload(&candidates, &site(&[&int])).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_keyword_and_variadic_binding() {
        let object = class("object", &[]);
        let signature = CallSignature {
            positional: vec![Parameter::new("a", ty(&object))],
            keyword: vec![Parameter::new("b", ty(&object))],
            var_positional: Some(Parameter::new("rest", ty(&object))),
            var_keyword: Some(Parameter::new("opts", ty(&object))),
            ..CallSignature::default()
        };
        let call = CallSite {
            positional: vec![ty(&object), ty(&object), ty(&object)],
            keyword: vec![("flag".into(), ty(&object))],
            expected_return: None,
        };

        let found = call_match(&signature, &call).unwrap();
        assert_eq!(found.bound, 2);
        assert_eq!(
            found.plan,
            CallPlan {
                slots: vec![Some(ArgRef::Positional(0)), Some(ArgRef::Positional(1))],
                extra_positional: vec![2],
                extra_keyword: vec![0],
            }
        );
    }

    #[test]
    fn test_arity_failures() {
        let object = class("object", &[]);
        let signature = unary(&object);

        assert_eq!(
            call_match(&signature, &site(&[])).err(),
            Some(MatchFailure::Arity)
        );
        assert_eq!(
            call_match(&signature, &site(&[&object, &object])).err(),
            Some(MatchFailure::Arity)
        );

        let twice = CallSite {
            positional: vec![ty(&object)],
            keyword: vec![("x".into(), ty(&object))],
            expected_return: None,
        };
        assert_eq!(
            call_match(&signature, &twice).err(),
            Some(MatchFailure::Arity)
        );
    }

    #[test]
    fn test_type_failure_is_reported_separately() {
        let object = class("object", &[]);
        let int = class("int", &[&object]);
        let str = class("str", &[&object]);

        let by_int = unary(&int);
        assert_eq!(
            select_overload(&[(&by_int, 0)], &site(&[&str])).err(),
            Some(ResolveError::NoMatchingOverload { arity_only: false })
        );
        assert_eq!(
            select_overload(&[(&by_int, 0)], &site(&[])).err(),
            Some(ResolveError::NoMatchingOverload { arity_only: true })
        );
    }

    #[test]
    fn test_more_bound_arguments_win_over_variadic() {
        let object = class("object", &[]);
        let exact = unary(&object);
        let variadic = CallSignature {
            var_positional: Some(Parameter::new("rest", ty(&object))),
            ..CallSignature::default()
        };

        let candidates = [(&variadic, 0), (&exact, 0)];
        let (index, _) = select_overload(&candidates, &site(&[&object])).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_field_distance_breaks_ties_then_ambiguity() {
        let object = class("object", &[]);
        let near = unary(&object);
        let far = unary(&object);

        let (index, _) =
            select_overload(&[(&far, 2), (&near, 1)], &site(&[&object])).unwrap();
        assert_eq!(index, 1);

        assert_eq!(
            select_overload(&[(&far, 1), (&near, 1)], &site(&[&object])).err(),
            Some(ResolveError::AmbiguousOverload { candidates: 2 })
        );
    }

    #[test]
    fn test_expected_return_type_filters_overloads() {
        let object = class("object", &[]);
        let int = class("int", &[&object]);
        let str = class("str", &[&object]);

        let returns_int = CallSignature {
            return_type: Some(ty(&int)),
            ..CallSignature::default()
        };
        let returns_str = CallSignature {
            return_type: Some(ty(&str)),
            ..CallSignature::default()
        };
        let call = CallSite {
            expected_return: Some(ty(&str)),
            ..CallSite::default()
        };

        let (index, _) = select_overload(&[(&returns_int, 0), (&returns_str, 0)], &call).unwrap();
        assert_eq!(index, 1);
    }
}

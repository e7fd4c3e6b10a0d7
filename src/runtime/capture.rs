// Foxscream Closure Capture
// Collects the names a function body may read, so the definition site can
// snapshot them

use rustc_hash::FxHashSet;

use crate::ast::{Expr, FunctionDef, ParamKind, Stmt, TypeExpr};

/// Every name referenced by the body, defaults and type hints of `def`
/// (nested functions included), minus its own parameters and name. Sorted.
pub fn free_names(def: &FunctionDef) -> Vec<String> {
    let mut names = FxHashSet::default();
    collect_function(def, &mut names);

    for param in &def.params {
        names.remove(&param.name);
    }
    if let Some(name) = &def.name {
        names.remove(name);
    }
    names.remove("self");

    let mut names: Vec<String> = names.into_iter().collect();
    names.sort();
    names
}

fn collect_function(def: &FunctionDef, names: &mut FxHashSet<String>) {
    for param in &def.params {
        if let ParamKind::Keyword(default) = &param.kind {
            collect_expr(default, names);
        }
        if let Some(hint) = &param.type_hint {
            collect_type(hint, names);
        }
    }
    if let Some(ret) = &def.return_type {
        collect_type(ret, names);
    }
    collect_statements(&def.body, names);
}

fn collect_statements(statements: &[Stmt], names: &mut FxHashSet<String>) {
    for stmt in statements {
        match stmt {
            Stmt::Expression { expr, .. } | Stmt::Static { expr, .. } => collect_expr(expr, names),
            Stmt::Defer { expr, .. } => collect_expr(expr, names),
        }
    }
}

fn collect_type(ty: &TypeExpr, names: &mut FxHashSet<String>) {
    match ty {
        TypeExpr::Named { name, .. } => {
            names.insert(name.clone());
        }
        TypeExpr::Variants { members, .. } | TypeExpr::Union { members, .. } => {
            for member in members {
                collect_type(member, names);
            }
        }
        TypeExpr::Exclude { base, excluded, .. } => {
            collect_type(base, names);
            for member in excluded {
                collect_type(member, names);
            }
        }
        TypeExpr::Fields { fields, .. } => {
            for (_, field) in fields {
                collect_type(field, names);
            }
        }
    }
}

fn collect_optional(expr: &Option<Box<Expr>>, names: &mut FxHashSet<String>) {
    if let Some(expr) = expr {
        collect_expr(expr, names);
    }
}

fn collect_expr(expr: &Expr, names: &mut FxHashSet<String>) {
    match expr {
        Expr::Literal { .. } => {}
        Expr::Identifier { name, .. } => {
            names.insert(name.clone());
        }
        Expr::Binary { left, right, .. } => {
            collect_expr(left, names);
            collect_expr(right, names);
        }
        Expr::Unary { operand, .. } => collect_expr(operand, names),
        Expr::Assignment {
            target,
            type_hint,
            value,
            ..
        } => {
            collect_expr(target, names);
            if let Some(hint) = type_hint {
                collect_type(hint, names);
            }
            collect_expr(value, names);
        }
        Expr::Call { callee, args, .. } => {
            collect_expr(callee, names);
            for arg in args {
                collect_expr(&arg.value, names);
            }
        }
        Expr::Field { object, .. } => collect_expr(object, names),
        Expr::Index { object, index, .. } => {
            collect_expr(object, names);
            collect_expr(index, names);
        }
        Expr::Slice {
            object,
            start,
            end,
            step,
            ..
        } => {
            collect_expr(object, names);
            collect_optional(start, names);
            collect_optional(end, names);
            collect_optional(step, names);
        }
        Expr::Array { elements, .. } => {
            for element in elements {
                collect_expr(element, names);
            }
        }
        Expr::Dictionary { entries, .. } => {
            for (key, value) in entries {
                collect_expr(key, names);
                collect_expr(value, names);
            }
        }
        Expr::Block { statements, .. } => collect_statements(statements, names),
        Expr::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            collect_expr(condition, names);
            collect_expr(then_branch, names);
            collect_optional(else_branch, names);
        }
        Expr::While {
            condition,
            body,
            else_branch,
            ..
        } => {
            collect_expr(condition, names);
            collect_expr(body, names);
            collect_optional(else_branch, names);
        }
        Expr::DoWhile {
            body, condition, ..
        } => {
            collect_expr(body, names);
            collect_expr(condition, names);
        }
        Expr::For {
            iterable,
            body,
            else_branch,
            ..
        } => {
            collect_expr(iterable, names);
            collect_expr(body, names);
            collect_optional(else_branch, names);
        }
        Expr::Match {
            subject,
            arms,
            default,
            ..
        } => {
            collect_expr(subject, names);
            for arm in arms {
                for pattern in &arm.patterns {
                    collect_expr(pattern, names);
                }
                collect_expr(&arm.body, names);
            }
            collect_optional(default, names);
        }
        Expr::Function { def } => {
            if let Some(name) = &def.name {
                names.insert(name.clone());
            }
            collect_function(def, names);
        }
        Expr::Class { def } => {
            for parent in def.parents.iter().chain(&def.traits) {
                collect_expr(parent, names);
            }
            collect_statements(&def.body, names);
        }
        Expr::Return { value, .. } => collect_optional(value, names),
        Expr::Break { .. } | Expr::Continue { .. } | Expr::Leave { .. } => {}
        Expr::Labeled { body, .. } => collect_expr(body, names),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use pretty_assertions::assert_eq;

    fn names_of(source: &str) -> Vec<String> {
        let program = parse_source(source, "<test>").unwrap();
        match &program.statements[0] {
            Stmt::Expression {
                expr: Expr::Function { def },
                ..
            } => free_names(def),
            _ => panic!("expected a function"),
        }
    }

    #[test]
    fn test_parameters_are_not_free() {
        assert_eq!(
            names_of("fn add(a, b = offset) { a + b + scale }"),
            vec!["offset".to_string(), "scale".to_string()]
        );
    }

    #[test]
    fn test_nested_functions_and_type_hints_contribute() {
        assert_eq!(
            names_of("fn outer(x: Shape) { fn inner() { total + x } }"),
            vec![
                "Shape".to_string(),
                "inner".to_string(),
                "total".to_string()
            ]
        );
    }

    #[test]
    fn test_own_name_is_not_captured() {
        assert_eq!(names_of("fn fact(n) { fact(n - 1) }"), Vec::<String>::new());
    }
}

// Foxscream Runtime
// Tree-walking evaluator over an arena of scopes

mod call;
mod capture;
mod eval;
mod ops;
mod prelude;
mod scope;
mod value;

pub use capture::free_names;
pub use ops::OpError;
pub use prelude::Prelude;
pub use scope::{Scope, ScopeArena, ScopeId, ScopeKind, Signal};
pub use value::{
    BoundMethod, Callable, ClassLink, Dict, DictKey, Function, NativeCall, NativeFn, Object,
    ObjectKind, Overload, Payload, Value,
};

use std::io::{self, Write};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::debug;

use crate::ast::Program;
use crate::config::RuntimeConfig;
use crate::error::{FoxError, FoxResult, Span};
use crate::parser::parse_source;

/// Deepest nesting rendered by the JSON scope dump
const JSON_DEPTH_LIMIT: usize = 32;

/// Owns the root scope, the prelude and the output sink. State persists
/// across `run` calls, so a REPL keeps one `Runtime`.
pub struct Runtime {
    pub(crate) scopes: ScopeArena,
    pub(crate) prelude: Prelude,
    config: RuntimeConfig,
    output: Box<dyn Write>,
    /// Prelude bindings as installed, hidden from dumps while untouched
    builtins: FxHashMap<String, Value>,
    depth: usize,
}

/// One entry of the JSON scope dump
#[derive(Debug, Serialize)]
struct DumpEntry {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    value: serde_json::Value,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let prelude = Prelude::new();
        let mut scopes = ScopeArena::new();
        let mut builtins = FxHashMap::default();
        for (name, value) in prelude.bindings() {
            scopes.bind(name.clone(), value.clone());
            builtins.insert(name, value);
        }

        Self {
            scopes,
            prelude,
            config,
            output: Box::new(io::stdout()),
            builtins,
            depth: 0,
        }
    }

    /// Send `print` output to `output` instead of stdout
    pub fn with_output(mut self, output: Box<dyn Write>) -> Self {
        self.output = output;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub(crate) fn file(&self) -> &str {
        &self.config.file_name
    }

    pub(crate) fn write_line(&mut self, line: &str, span: Span) -> FoxResult<()> {
        writeln!(self.output, "{}", line)
            .and_then(|_| self.output.flush())
            .map_err(|e| {
                FoxError::runtime_error(format!("Failed to write output: {}", e), span, self.file())
            })
    }

    /// Lex, parse and evaluate `source` in the global scope
    pub fn run(&mut self, source: &str) -> FoxResult<Value> {
        let program = parse_source(source, &self.config.file_name)?;
        self.eval_program(&program)
            .map_err(|error| error.with_source(source))
    }

    /// Evaluate a parsed program in the global scope. Returns the value of
    /// the last statement, or of a top-level `return`.
    pub fn eval_program(&mut self, program: &Program) -> FoxResult<Value> {
        let root = self.scopes.root();
        self.scopes.set_current(root);
        self.depth = 0;

        let result = self.eval_statements(&program.statements);
        let result = self.run_defers(root, result);
        let signal = self.scopes.take_signal(root);

        if result.is_err() {
            self.scopes.reset_to_root();
            self.depth = 0;
        }
        debug!(live_scopes = self.scopes.live(), "program finished");

        match (result, signal) {
            (Ok(_), Signal::Returning { value, .. }) => Ok(value),
            (result, _) => result,
        }
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.scopes.bindings(self.scopes.root()).get(name).cloned()
    }

    /// User bindings of the global scope, sorted by name
    pub fn globals(&self) -> Vec<(String, Value)> {
        let mut globals: Vec<(String, Value)> = self
            .scopes
            .bindings(self.scopes.root())
            .iter()
            .filter(|(name, value)| {
                !self
                    .builtins
                    .get(*name)
                    .is_some_and(|builtin| builtin.ptr_eq(value))
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        globals.sort_by(|a, b| a.0.cmp(&b.0));
        globals
    }

    /// `name = value` per global, one per line
    pub fn dump_scope(&self) -> String {
        self.globals()
            .iter()
            .map(|(name, value)| format!("{} = {}", name, value.repr()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn dump_scope_json(&self) -> serde_json::Value {
        let entries: Vec<DumpEntry> = self
            .globals()
            .iter()
            .map(|(name, value)| DumpEntry {
                name: name.clone(),
                type_name: value.type_name(),
                value: to_json(value, 0, &mut FxHashSet::default()),
            })
            .collect();
        serde_json::to_value(entries).unwrap_or(serde_json::Value::Null)
    }

    /// Number of scopes alive, root included
    pub fn live_scopes(&self) -> usize {
        self.scopes.live()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON form of a value for the scope dump. Containers already open on the
/// current path render as `"[...]"`.
fn to_json(value: &Value, depth: usize, open: &mut FxHashSet<u64>) -> serde_json::Value {
    use serde_json::Value as Json;

    if depth > JSON_DEPTH_LIMIT {
        return Json::String("...".into());
    }
    let object = value.borrow();
    let container = matches!(object.payload, Payload::Array(_) | Payload::Dict(_))
        || (matches!(object.payload, Payload::None) && object.kind == ObjectKind::Instance);
    if container && !open.insert(object.id) {
        return Json::String("[...]".into());
    }

    let json = match &object.payload {
        Payload::Null => Json::Null,
        Payload::Bool(b) => Json::Bool(*b),
        Payload::Int(n) => Json::from(*n),
        Payload::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or_else(|| Json::String(f.to_string())),
        Payload::Str(s) => Json::String(s.clone()),
        Payload::Array(items) => Json::Array(
            items
                .iter()
                .map(|v| to_json(v, depth + 1, open))
                .collect(),
        ),
        Payload::Dict(dict) => Json::Object(
            dict.iter()
                .map(|(k, v)| (k.to_string(), to_json(v, depth + 1, open)))
                .collect(),
        ),
        Payload::None if object.kind == ObjectKind::Instance => {
            let mut fields: Vec<(&String, &Value)> = object
                .fields
                .iter()
                .filter(|(_, v)| !matches!(v.borrow().payload, Payload::Function(_) | Payload::Bound(_)))
                .collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            Json::Object(
                fields
                    .into_iter()
                    .map(|(name, v)| (name.clone(), to_json(v, depth + 1, open)))
                    .collect(),
            )
        }
        _ => Json::String(value.to_string()),
    };
    if container {
        open.remove(&object.id);
    }
    json
}

/// Run `source` in a fresh runtime
pub fn run(source: &str) -> FoxResult<Value> {
    Runtime::new().run(source)
}

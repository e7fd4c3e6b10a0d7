// Foxscream CLI - Command Line Interface
// Usage: foxscream [FILE] [OPTIONS]

use clap::{Parser, ValueEnum};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

use foxscream_core::ast::{Expr, Literal, Program, Stmt, TypeExpr};
use foxscream_core::config::RuntimeConfig;
use foxscream_core::lexer::Scanner;
use foxscream_core::logging::init_tracing;
use foxscream_core::parser;
use foxscream_core::runtime::{Payload, Runtime, Value};

/// Foxscream - a scripting language with multiple inheritance and overloads
#[derive(Parser)]
#[command(name = "foxscream")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A tree-walking interpreter with multiple inheritance", long_about = None)]
struct Cli {
    /// Source file to run
    file: Option<PathBuf>,

    /// Debug options: tokens, ast (comma-separated)
    #[arg(short = 'd', long = "debug", value_delimiter = ',')]
    debug: Option<Vec<String>>,

    /// Execute inline code
    #[arg(short = 'e', long = "exec")]
    exec: Option<String>,

    /// Print the global scope after a successful run
    #[arg(long = "dump", value_enum)]
    dump: Option<DumpFormat>,

    /// Maximum nesting of function calls
    #[arg(long = "max-depth")]
    max_depth: Option<usize>,

    /// Log every evaluated statement to stderr
    #[arg(long = "trace")]
    trace: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum DumpFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();

    init_tracing(cli.trace.then_some("foxscream_core=trace"));

    let debug = DebugFlags::from_options(&cli.debug);
    let options = RunOptions {
        debug,
        dump: cli.dump,
        max_depth: cli.max_depth,
    };

    let result = if let Some(code) = cli.exec {
        run_source(&code, "<exec>", &options)
    } else if let Some(path) = cli.file {
        handle_run(&path, &options)
    } else {
        repl(&options)
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

#[derive(Default, Clone)]
struct DebugFlags {
    tokens: bool,
    ast: bool,
}

impl DebugFlags {
    fn from_options(opts: &Option<Vec<String>>) -> Self {
        let mut flags = Self::default();
        if let Some(opts) = opts {
            for opt in opts {
                match opt.as_str() {
                    "tokens" => flags.tokens = true,
                    "ast" => flags.ast = true,
                    _ => eprintln!("{} Unknown debug option: {}", "!".yellow(), opt),
                }
            }
        }
        flags
    }
}

struct RunOptions {
    debug: DebugFlags,
    dump: Option<DumpFormat>,
    max_depth: Option<usize>,
}

impl RunOptions {
    fn runtime(&self, file_name: &str) -> Runtime {
        let mut config = RuntimeConfig::new(file_name);
        if let Some(depth) = self.max_depth {
            config = config.with_max_call_depth(depth);
        }
        Runtime::with_config(config)
    }
}

fn handle_run(path: &Path, options: &RunOptions) -> Result<(), String> {
    let source = fs::read_to_string(path)
        .map_err(|e| format!("Error reading file '{}': {}", path.display(), e))?;
    let file_name = path.to_string_lossy().to_string();
    run_source(&source, &file_name, options)
}

fn run_source(source: &str, file_name: &str, options: &RunOptions) -> Result<(), String> {
    if options.debug.tokens {
        let mut scanner = Scanner::new(source, file_name);
        let tokens = scanner.scan_tokens().map_err(|e| e.to_string())?;
        println!("{}", "-- Tokens --".cyan());
        for token in &tokens {
            println!("  {:?} '{}'", token.kind, token.lexeme);
        }
        println!();
        return Ok(());
    }

    if options.debug.ast {
        let program = parser::parse_source(source, file_name).map_err(|e| e.to_string())?;
        print_ast(&program)?;
        return Ok(());
    }

    let mut runtime = options.runtime(file_name);
    runtime.run(source).map_err(|e| e.format())?;

    match options.dump {
        Some(DumpFormat::Text) => {
            let dump = runtime.dump_scope();
            if !dump.is_empty() {
                println!("{}", dump);
            }
        }
        Some(DumpFormat::Json) => {
            let dump = serde_json::to_string_pretty(&runtime.dump_scope_json())
                .map_err(|e| e.to_string())?;
            println!("{}", dump);
        }
        None => {}
    }
    Ok(())
}

fn repl(options: &RunOptions) -> Result<(), String> {
    use reedline::{
        FileBackedHistory, Prompt, PromptHistorySearch, PromptHistorySearchStatus, Reedline,
        Signal,
    };
    use std::borrow::Cow;
    use std::io::Write;

    // Custom prompts
    struct MainPrompt;
    struct ContinuePrompt;

    fn search_indicator(history_search: PromptHistorySearch) -> Cow<'static, str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!("({}reverse-search: {}) ", prefix, history_search.term))
    }

    impl Prompt for MainPrompt {
        fn render_prompt_left(&self) -> Cow<'_, str> {
            Cow::Borrowed("fox> ")
        }

        fn render_prompt_right(&self) -> Cow<'_, str> {
            Cow::Borrowed("")
        }

        fn render_prompt_indicator(&self, _: reedline::PromptEditMode) -> Cow<'_, str> {
            Cow::Borrowed("")
        }

        fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
            Cow::Borrowed(" ... ")
        }

        fn render_prompt_history_search_indicator(
            &self,
            history_search: PromptHistorySearch,
        ) -> Cow<'_, str> {
            search_indicator(history_search)
        }
    }

    impl Prompt for ContinuePrompt {
        fn render_prompt_left(&self) -> Cow<'_, str> {
            Cow::Borrowed(" ... ")
        }

        fn render_prompt_right(&self) -> Cow<'_, str> {
            Cow::Borrowed("")
        }

        fn render_prompt_indicator(&self, _: reedline::PromptEditMode) -> Cow<'_, str> {
            Cow::Borrowed("")
        }

        fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
            Cow::Borrowed(" ... ")
        }

        fn render_prompt_history_search_indicator(
            &self,
            history_search: PromptHistorySearch,
        ) -> Cow<'_, str> {
            search_indicator(history_search)
        }
    }

    println!();
    println!(
        "  {}  {}",
        "Foxscream".cyan().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
    println!("  {}", "Type .help for commands, .exit to quit".bright_black());
    println!();

    let history_path = history_file();
    let history = Box::new(
        FileBackedHistory::with_file(1000, history_path).map_err(|e| e.to_string())?,
    );
    let mut line_editor = Reedline::create().with_history(history);
    let main_prompt = MainPrompt;
    let continue_prompt = ContinuePrompt;

    // One runtime for the whole session so globals persist between inputs
    let mut runtime = options.runtime("<repl>");
    let mut accumulated_input = String::new();

    loop {
        let prompt: &dyn Prompt = if accumulated_input.is_empty() {
            &main_prompt
        } else {
            &continue_prompt
        };

        match line_editor.read_line(prompt) {
            Ok(Signal::Success(line)) => {
                // An empty line ends multi-line input early
                if line.trim().is_empty() && !accumulated_input.is_empty() {
                    let input = accumulated_input.trim().to_string();
                    accumulated_input.clear();
                    run_repl_input(&mut runtime, &input);
                    continue;
                }

                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                if accumulated_input.is_empty() && input.starts_with('.') {
                    match input {
                        ".exit" | ".quit" => break,
                        ".help" => print_repl_help(),
                        ".clear" => {
                            print!("\x1B[2J\x1B[1;1H");
                            let _ = std::io::stdout().flush();
                        }
                        ".reset" => {
                            runtime = options.runtime("<repl>");
                            println!("{}", "  Runtime state reset".bright_black());
                        }
                        ".globals" => {
                            let dump = runtime.dump_scope();
                            if !dump.is_empty() {
                                println!("{}", dump);
                            }
                        }
                        _ => {
                            println!("{} Unknown command: {}", "!".red(), input);
                            println!("  Type {} for available commands", ".help".cyan());
                        }
                    }
                    continue;
                }

                if !accumulated_input.is_empty() {
                    accumulated_input.push('\n');
                }
                accumulated_input.push_str(&line);

                if is_incomplete(&accumulated_input) {
                    continue;
                }

                let full_input = accumulated_input.trim().to_string();
                accumulated_input.clear();
                run_repl_input(&mut runtime, &full_input);
            }
            Ok(Signal::CtrlC) => {
                if !accumulated_input.is_empty() {
                    accumulated_input.clear();
                    println!("{}", "^C (input cleared)".bright_black());
                } else {
                    println!("{}", "^C".bright_black());
                }
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "^D".bright_black());
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

fn run_repl_input(runtime: &mut Runtime, input: &str) {
    match runtime.run(input) {
        Ok(value) => print_repl_result(&value),
        Err(e) => eprintln!("{}", e.format()),
    }
}

/// Whether `code` still has open brackets or an unterminated string
fn is_incomplete(code: &str) -> bool {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut chars = code.chars();

    while let Some(c) = chars.next() {
        if let Some(open) = quote {
            match c {
                '\\' => {
                    chars.next();
                }
                c if c == open => quote = None,
                _ => {}
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '#' => {
                // Comment runs to end of line
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => depth -= 1,
            _ => {}
        }
    }
    depth > 0 || quote.is_some()
}

fn history_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".foxscream_history")
}

fn print_repl_help() {
    println!();
    println!("  {}", "REPL Commands:".cyan().bold());
    println!("    {}      Exit the REPL", ".exit".yellow());
    println!("    {}     Clear the screen", ".clear".yellow());
    println!("    {}     Discard every global binding", ".reset".yellow());
    println!("    {}   Show global bindings", ".globals".yellow());
    println!("    {}      Show this help", ".help".yellow());
    println!();
    println!("  {}", "Keyboard Shortcuts:".cyan().bold());
    println!("    {}      Previous command", "↑".yellow());
    println!("    {}      Next command", "↓".yellow());
    println!("    {}    Search history", "Ctrl+R".yellow());
    println!("    {}    Exit", "Ctrl+D".yellow());
    println!();
}

fn print_repl_result(value: &Value) {
    if !value.is_null() {
        println!("{}", format_value(value));
    }
}

/// Render a value with syntax highlighting
fn format_value(value: &Value) -> String {
    if value.is_class() {
        return value.to_string().magenta().to_string();
    }
    let text = value.repr();
    let payload_kind = match &value.borrow().payload {
        Payload::Null => 0,
        Payload::Bool(_) | Payload::Int(_) | Payload::Float(_) => 1,
        Payload::Str(_) => 2,
        Payload::Function(_) | Payload::Bound(_) => 3,
        _ => 4,
    };
    match payload_kind {
        0 => text.bright_black().to_string(),
        1 => text.yellow().to_string(),
        2 => text.green().to_string(),
        3 => text.cyan().to_string(),
        _ => text,
    }
}

// ==================== AST dump ====================

fn print_ast(program: &Program) -> Result<(), String> {
    use ptree::TreeBuilder;

    let mut tree = TreeBuilder::new("Program".to_string());
    for stmt in &program.statements {
        build_stmt_tree(&mut tree, stmt);
    }
    let tree = tree.build();
    ptree::print_tree(&tree).map_err(|e| e.to_string())
}

fn build_stmt_tree(tree: &mut ptree::TreeBuilder, stmt: &Stmt) {
    match stmt {
        Stmt::Expression { expr, .. } => build_expr_tree(tree, expr),
        Stmt::Defer { expr, .. } => {
            tree.begin_child("Defer".to_string());
            build_expr_tree(tree, expr);
            tree.end_child();
        }
        Stmt::Static { expr, .. } => {
            tree.begin_child("Static".to_string());
            build_expr_tree(tree, expr);
            tree.end_child();
        }
    }
}

fn build_children(tree: &mut ptree::TreeBuilder, label: String, children: &[&Expr]) {
    tree.begin_child(label);
    for child in children {
        build_expr_tree(tree, child);
    }
    tree.end_child();
}

fn build_block_tree(tree: &mut ptree::TreeBuilder, label: String, statements: &[Stmt]) {
    tree.begin_child(label);
    for stmt in statements {
        build_stmt_tree(tree, stmt);
    }
    tree.end_child();
}

fn type_label(ty: &Option<TypeExpr>) -> String {
    ty.as_ref()
        .map(|t| format!(": {}", t))
        .unwrap_or_default()
}

fn build_expr_tree(tree: &mut ptree::TreeBuilder, expr: &Expr) {
    match expr {
        Expr::Literal { value, .. } => {
            let text = match value {
                Literal::Int(n) => n.to_string(),
                Literal::Float(f) => f.to_string(),
                Literal::Str(s) => format!("{:?}", s),
            };
            tree.add_empty_child(format!("Literal {}", text));
        }
        Expr::Identifier { name, .. } => {
            tree.add_empty_child(format!("Identifier '{}'", name));
        }
        Expr::Binary {
            left, op, right, ..
        } => build_children(tree, format!("Binary '{}'", op.symbol()), &[left.as_ref(), right.as_ref()]),
        Expr::Unary { op, operand, .. } => {
            build_children(tree, format!("Unary '{}'", op.symbol()), &[operand.as_ref()])
        }
        Expr::Assignment {
            target,
            op,
            type_hint,
            value,
            ..
        } => build_children(
            tree,
            format!("Assign {:?}{}", op, type_label(type_hint)),
            &[target.as_ref(), value.as_ref()],
        ),
        Expr::Call { callee, args, .. } => {
            tree.begin_child("Call".to_string());
            build_expr_tree(tree, callee);
            for arg in args {
                match &arg.name {
                    Some(name) => build_children(tree, format!("Keyword '{}'", name), &[&arg.value]),
                    None => build_expr_tree(tree, &arg.value),
                }
            }
            tree.end_child();
        }
        Expr::Field { object, name, .. } => {
            build_children(tree, format!("Field '{}'", name), &[object.as_ref()])
        }
        Expr::Index { object, index, .. } => build_children(tree, "Index".to_string(), &[object.as_ref(), index.as_ref()]),
        Expr::Slice {
            object,
            start,
            end,
            step,
            ..
        } => {
            let mut parts: Vec<&Expr> = vec![object.as_ref()];
            parts.extend(start.as_deref());
            parts.extend(end.as_deref());
            parts.extend(step.as_deref());
            build_children(tree, "Slice".to_string(), &parts)
        }
        Expr::Array { elements, .. } => {
            let parts: Vec<&Expr> = elements.iter().collect();
            build_children(tree, "Array".to_string(), &parts)
        }
        Expr::Dictionary { entries, .. } => {
            tree.begin_child("Dictionary".to_string());
            for (key, value) in entries {
                build_children(tree, "Entry".to_string(), &[key, value]);
            }
            tree.end_child();
        }
        Expr::Block { statements, .. } => build_block_tree(tree, "Block".to_string(), statements),
        Expr::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            let mut parts: Vec<&Expr> = vec![condition.as_ref(), then_branch.as_ref()];
            parts.extend(else_branch.as_deref());
            build_children(tree, "If".to_string(), &parts)
        }
        Expr::While {
            condition,
            body,
            else_branch,
            ..
        } => {
            let mut parts: Vec<&Expr> = vec![condition.as_ref(), body.as_ref()];
            parts.extend(else_branch.as_deref());
            build_children(tree, "While".to_string(), &parts)
        }
        Expr::DoWhile {
            body, condition, ..
        } => build_children(tree, "DoWhile".to_string(), &[body.as_ref(), condition.as_ref()]),
        Expr::For {
            variable,
            iterable,
            body,
            else_branch,
            ..
        } => {
            let mut parts: Vec<&Expr> = vec![iterable.as_ref(), body.as_ref()];
            parts.extend(else_branch.as_deref());
            build_children(tree, format!("For '{}'", variable), &parts)
        }
        Expr::Match {
            subject,
            arms,
            default,
            ..
        } => {
            tree.begin_child("Match".to_string());
            build_expr_tree(tree, subject);
            for arm in arms {
                tree.begin_child("Case".to_string());
                for pattern in &arm.patterns {
                    build_expr_tree(tree, pattern);
                }
                build_expr_tree(tree, &arm.body);
                tree.end_child();
            }
            if let Some(default) = default {
                build_children(tree, "Else".to_string(), &[default.as_ref()]);
            }
            tree.end_child();
        }
        Expr::Function { def } => {
            let params: Vec<String> = def
                .params
                .iter()
                .map(|p| format!("{}{}", p.name, type_label(&p.type_hint)))
                .collect();
            let label = format!(
                "Function '{}' ({}){}",
                def.name.as_deref().unwrap_or("<anonymous>"),
                params.join(", "),
                def.return_type
                    .as_ref()
                    .map(|t| format!(" -> {}", t))
                    .unwrap_or_default()
            );
            build_block_tree(tree, label, &def.body);
        }
        Expr::Class { def } => {
            let label = format!(
                "{} '{}'",
                def.kind,
                def.name.as_deref().unwrap_or("<anonymous>")
            );
            tree.begin_child(label);
            if !def.parents.is_empty() {
                let parts: Vec<&Expr> = def.parents.iter().collect();
                build_children(tree, "Of".to_string(), &parts);
            }
            if !def.traits.is_empty() {
                let parts: Vec<&Expr> = def.traits.iter().collect();
                build_children(tree, "Has".to_string(), &parts);
            }
            for stmt in &def.body {
                build_stmt_tree(tree, stmt);
            }
            tree.end_child();
        }
        Expr::Return { value, .. } => {
            let parts: Vec<&Expr> = value.as_deref().into_iter().collect();
            build_children(tree, "Return".to_string(), &parts)
        }
        Expr::Break { label, .. } => {
            tree.add_empty_child(control_label("Break", label));
        }
        Expr::Continue { label, .. } => {
            tree.add_empty_child(control_label("Continue", label));
        }
        Expr::Leave { label, .. } => {
            tree.add_empty_child(control_label("Leave", label));
        }
        Expr::Labeled { label, body, .. } => {
            build_children(tree, format!("Label '{}'", label), &[body.as_ref()])
        }
    }
}

fn control_label(keyword: &str, label: &Option<String>) -> String {
    match label {
        Some(label) => format!("{} '{}'", keyword, label),
        None => keyword.to_string(),
    }
}

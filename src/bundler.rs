//! Module bundler adapter.
//!
//! Produces a single script from a TypeScript/JS entry file: relative
//! imports are resolved and inlined dependency-first, TypeScript syntax is
//! stripped through the transformer, and top-level declarations that no
//! reachable code references are dropped (tree-shaking). Output is printed
//! by the code generator, so whitespace normalization is expected and the
//! result is a pure function of the input sources.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};

use oxc_allocator::{Allocator, Vec as OxcVec};
use oxc_ast::ast::{
    BindingPattern, Declaration, ExportDefaultDeclarationKind, Program,
    Statement,
};
use oxc_ast_visit::Visit;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};

use crate::cache::BuildCache;
use crate::error::BuildError;

/// Bundler knobs. `quiet` stops the adapter from forwarding compile
/// diagnostics to the log; `suppress_errors` turns a compile failure into a
/// logged empty bundle instead of an error, which keeps a long-running dev
/// server alive across transient syntax errors.
#[derive(Default)]
pub struct BundleOptions<'a> {
    pub quiet: bool,
    pub suppress_errors: bool,
    pub cache: Option<&'a BuildCache>,
}

/// Bundle the entry file into a single script.
pub fn bundle(entry: Option<&Path>, options: &BundleOptions) -> Result<String, BuildError> {
    let entry = entry.ok_or(BuildError::UndefinedInput)?;
    if !entry.exists() {
        return Err(BuildError::missing_file(entry));
    }

    match bundle_graph(entry, options) {
        Ok(code) => Ok(code),
        Err(BuildError::Compile { message }) if options.suppress_errors => {
            if !options.quiet {
                tracing::warn!(entry = %entry.display(), %message, "compile error suppressed");
            }
            Ok(String::new())
        }
        Err(e) => Err(e),
    }
}

/// Bundle and persist to `out_file`. The out-file argument is required by
/// this caller-facing variant.
pub fn bundle_to_file(
    entry: Option<&Path>,
    out_file: Option<&Path>,
    options: &BundleOptions,
) -> Result<String, BuildError> {
    let out_file = out_file.ok_or(BuildError::UndefinedOutput)?;
    let code = bundle(entry, options)?;
    if let Some(parent) = out_file.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(out_file, &code)?;
    Ok(code)
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODULE GRAPH
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
enum ImportedName {
    Named(String),
    Default,
    Namespace,
}

#[derive(Debug, Clone, PartialEq)]
enum StatementKind {
    /// `import ...` — defines bindings, never emitted.
    Import,
    /// `export { a, b as c }` — export map entry, never emitted.
    ExportSpecifiers,
    /// Top-level declaration; emitted only when one of its names is needed.
    Declaration,
    /// Anything else at the top level; always emitted when the module is
    /// included (module evaluation side effects).
    SideEffect,
}

#[derive(Debug)]
struct StatementMeta {
    kind: StatementKind,
    declared: Vec<String>,
    referenced: Vec<String>,
}

struct Module {
    path: PathBuf,
    source: String,
    /// Dependency module indices, in import order.
    deps: Vec<usize>,
    /// Local binding name -> (dependency index, name inside the dependency).
    import_bindings: HashMap<String, (usize, ImportedName)>,
    /// Exported name -> local name.
    exports: HashMap<String, String>,
    statements: Vec<StatementMeta>,
}

struct ModuleGraph {
    modules: Vec<Module>,
    index: HashMap<PathBuf, usize>,
}

/// Collect every identifier referenced inside a statement.
#[derive(Default)]
struct IdentCollector {
    names: Vec<String>,
}

impl<'a> Visit<'a> for IdentCollector {
    fn visit_identifier_reference(&mut self, ident: &oxc_ast::ast::IdentifierReference<'a>) {
        self.names.push(ident.name.to_string());
    }
}

fn binding_names(pattern: &BindingPattern, out: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(ident) => out.push(ident.name.to_string()),
        BindingPattern::ObjectPattern(object) => {
            for property in &object.properties {
                binding_names(&property.value, out);
            }
            if let Some(rest) = &object.rest {
                binding_names(&rest.argument, out);
            }
        }
        BindingPattern::ArrayPattern(array) => {
            for element in array.elements.iter().flatten() {
                binding_names(element, out);
            }
        }
        BindingPattern::AssignmentPattern(assignment) => {
            binding_names(&assignment.left, out);
        }
    }
}

fn declaration_names(declaration: &Declaration) -> Vec<String> {
    let mut names = Vec::new();
    match declaration {
        Declaration::VariableDeclaration(var) => {
            for declarator in &var.declarations {
                binding_names(&declarator.id, &mut names);
            }
        }
        Declaration::FunctionDeclaration(func) => {
            if let Some(id) = &func.id {
                names.push(id.name.to_string());
            }
        }
        Declaration::ClassDeclaration(class) => {
            if let Some(id) = &class.id {
                names.push(id.name.to_string());
            }
        }
        _ => {}
    }
    names
}

/// Parse the module and strip TypeScript syntax. Compile diagnostics are
/// joined into one error message carrying the file path.
fn prepare_program<'a>(
    allocator: &'a Allocator,
    path: &Path,
    source: &'a str,
) -> Result<Program<'a>, BuildError> {
    let source_type = SourceType::from_path(path).unwrap_or_else(|_| SourceType::ts());
    let ret = Parser::new(allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        let messages: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
        return Err(BuildError::compile(format!(
            "{}: {}",
            path.display(),
            messages.join("; ")
        )));
    }
    let mut program = ret.program;

    let scoping = SemanticBuilder::new()
        .build(&program)
        .semantic
        .into_scoping();
    let ret = Transformer::new(allocator, path, &TransformOptions::default())
        .build_with_scoping(scoping, &mut program);
    if !ret.errors.is_empty() {
        let messages: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
        return Err(BuildError::compile(format!(
            "{}: {}",
            path.display(),
            messages.join("; ")
        )));
    }
    Ok(program)
}

/// Resolve a relative import specifier against the importing file, with the
/// usual extension fallbacks.
fn resolve_import(from: &Path, specifier: &str) -> Option<PathBuf> {
    if !specifier.starts_with("./") && !specifier.starts_with("../") {
        return None;
    }
    let base = from.parent().unwrap_or_else(|| Path::new(".")).join(specifier);
    let mut candidates = vec![base.clone()];
    candidates.push(PathBuf::from(format!("{}.ts", base.display())));
    candidates.push(PathBuf::from(format!("{}.js", base.display())));
    candidates.push(base.join("index.ts"));
    candidates.push(base.join("index.js"));
    candidates
        .into_iter()
        .find(|c| c.is_file())
        .and_then(|c| fs::canonicalize(c).ok())
}

fn load_module(graph: &mut ModuleGraph, path: &Path) -> Result<usize, BuildError> {
    let canonical = fs::canonicalize(path).map_err(|_| BuildError::missing_file(path))?;
    if let Some(&idx) = graph.index.get(&canonical) {
        return Ok(idx);
    }

    // Reserve the slot up front so import cycles terminate.
    let idx = graph.modules.len();
    graph.index.insert(canonical.clone(), idx);
    graph.modules.push(Module {
        path: canonical.clone(),
        source: String::new(),
        deps: Vec::new(),
        import_bindings: HashMap::new(),
        exports: HashMap::new(),
        statements: Vec::new(),
    });

    let source = fs::read_to_string(&canonical)?;
    let allocator = Allocator::default();
    let program = prepare_program(&allocator, &canonical, &source)?;

    struct PendingImport {
        specifier: String,
        bindings: Vec<(String, ImportedName)>,
    }

    let mut statements = Vec::new();
    let mut exports = HashMap::new();
    let mut pending_imports: Vec<PendingImport> = Vec::new();

    for stmt in program.body.iter() {
        let mut collector = IdentCollector::default();
        collector.visit_statement(stmt);
        let referenced = collector.names;

        let meta = match stmt {
            Statement::ImportDeclaration(import) => {
                let mut bindings = Vec::new();
                if let Some(specifiers) = &import.specifiers {
                    use oxc_ast::ast::ImportDeclarationSpecifier::*;
                    for specifier in specifiers {
                        match specifier {
                            ImportSpecifier(named) => bindings.push((
                                named.local.name.to_string(),
                                ImportedName::Named(named.imported.name().to_string()),
                            )),
                            ImportDefaultSpecifier(default) => bindings
                                .push((default.local.name.to_string(), ImportedName::Default)),
                            ImportNamespaceSpecifier(namespace) => bindings
                                .push((namespace.local.name.to_string(), ImportedName::Namespace)),
                        }
                    }
                }
                pending_imports.push(PendingImport {
                    specifier: import.source.value.to_string(),
                    bindings,
                });
                StatementMeta {
                    kind: StatementKind::Import,
                    declared: Vec::new(),
                    referenced: Vec::new(),
                }
            }
            Statement::ExportNamedDeclaration(export) => {
                if let Some(declaration) = &export.declaration {
                    let declared = declaration_names(declaration);
                    for name in &declared {
                        exports.insert(name.clone(), name.clone());
                    }
                    StatementMeta {
                        kind: StatementKind::Declaration,
                        declared,
                        referenced,
                    }
                } else {
                    if export.source.is_some() {
                        tracing::warn!(
                            path = %canonical.display(),
                            "re-export from another module is not supported, skipping"
                        );
                    }
                    for specifier in &export.specifiers {
                        exports.insert(
                            specifier.exported.name().to_string(),
                            specifier.local.name().to_string(),
                        );
                    }
                    StatementMeta {
                        kind: StatementKind::ExportSpecifiers,
                        declared: Vec::new(),
                        referenced: Vec::new(),
                    }
                }
            }
            Statement::ExportDefaultDeclaration(export) => {
                let declared = match &export.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => func
                        .id
                        .as_ref()
                        .map(|id| vec![id.name.to_string()])
                        .unwrap_or_default(),
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => class
                        .id
                        .as_ref()
                        .map(|id| vec![id.name.to_string()])
                        .unwrap_or_default(),
                    _ => Vec::new(),
                };
                if let Some(name) = declared.first() {
                    exports.insert("default".to_string(), name.clone());
                    StatementMeta {
                        kind: StatementKind::Declaration,
                        declared,
                        referenced,
                    }
                } else {
                    // Anonymous default export: evaluated with the module.
                    StatementMeta {
                        kind: StatementKind::SideEffect,
                        declared,
                        referenced,
                    }
                }
            }
            Statement::ExportAllDeclaration(_) => {
                tracing::warn!(
                    path = %canonical.display(),
                    "`export *` is not supported, skipping"
                );
                StatementMeta {
                    kind: StatementKind::ExportSpecifiers,
                    declared: Vec::new(),
                    referenced: Vec::new(),
                }
            }
            Statement::VariableDeclaration(var) => {
                let mut declared = Vec::new();
                for declarator in &var.declarations {
                    binding_names(&declarator.id, &mut declared);
                }
                StatementMeta {
                    kind: StatementKind::Declaration,
                    declared,
                    referenced,
                }
            }
            Statement::FunctionDeclaration(func) => StatementMeta {
                kind: StatementKind::Declaration,
                declared: func
                    .id
                    .as_ref()
                    .map(|id| vec![id.name.to_string()])
                    .unwrap_or_default(),
                referenced,
            },
            Statement::ClassDeclaration(class) => StatementMeta {
                kind: StatementKind::Declaration,
                declared: class
                    .id
                    .as_ref()
                    .map(|id| vec![id.name.to_string()])
                    .unwrap_or_default(),
                referenced,
            },
            _ => StatementMeta {
                kind: StatementKind::SideEffect,
                declared: Vec::new(),
                referenced,
            },
        };
        statements.push(meta);
    }

    // Resolve import edges after the statement walk so the borrow of the
    // program has ended before the graph is mutated recursively.
    drop(program);

    let mut deps = Vec::new();
    let mut import_bindings = HashMap::new();
    for pending in pending_imports {
        let resolved = resolve_import(&canonical, &pending.specifier).ok_or_else(|| {
            BuildError::compile(format!(
                "cannot resolve module '{}' imported from {}",
                pending.specifier,
                canonical.display()
            ))
        })?;
        let dep_idx = load_module(graph, &resolved)?;
        deps.push(dep_idx);
        for (local, imported) in pending.bindings {
            import_bindings.insert(local, (dep_idx, imported));
        }
    }

    let module = &mut graph.modules[idx];
    module.source = source;
    module.deps = deps;
    module.import_bindings = import_bindings;
    module.exports = exports;
    module.statements = statements;
    Ok(idx)
}

// ═══════════════════════════════════════════════════════════════════════════════
// REACHABILITY (TREE-SHAKING)
// ═══════════════════════════════════════════════════════════════════════════════

fn compute_kept(graph: &ModuleGraph, entry: usize) -> Vec<HashSet<usize>> {
    let mut kept: Vec<HashSet<usize>> = graph.modules.iter().map(|_| HashSet::new()).collect();
    let mut worklist: Vec<(usize, String)> = Vec::new();
    let mut seen: HashSet<(usize, String)> = HashSet::new();

    // Name -> declaring statement index, per module.
    let declaring: Vec<HashMap<&str, usize>> = graph
        .modules
        .iter()
        .map(|module| {
            let mut map = HashMap::new();
            for (idx, stmt) in module.statements.iter().enumerate() {
                for name in &stmt.declared {
                    map.insert(name.as_str(), idx);
                }
            }
            map
        })
        .collect();

    let mut need = |worklist: &mut Vec<(usize, String)>,
                    seen: &mut HashSet<(usize, String)>,
                    module: usize,
                    name: &str| {
        let key = (module, name.to_string());
        if seen.insert(key.clone()) {
            worklist.push(key);
        }
    };

    // The entry module keeps everything it says; dependency modules always
    // keep their side-effect statements (module evaluation semantics).
    for (module_idx, module) in graph.modules.iter().enumerate() {
        for (stmt_idx, stmt) in module.statements.iter().enumerate() {
            let keep = if module_idx == entry {
                stmt.kind != StatementKind::Import && stmt.kind != StatementKind::ExportSpecifiers
            } else {
                stmt.kind == StatementKind::SideEffect
            };
            if keep {
                kept[module_idx].insert(stmt_idx);
                for name in &stmt.referenced {
                    need(&mut worklist, &mut seen, module_idx, name);
                }
            }
        }
    }

    while let Some((module_idx, name)) = worklist.pop() {
        let module = &graph.modules[module_idx];

        if let Some((dep_idx, imported)) = module.import_bindings.get(&name) {
            let dep = &graph.modules[*dep_idx];
            match imported {
                ImportedName::Named(exported) => {
                    if let Some(local) = dep.exports.get(exported) {
                        need(&mut worklist, &mut seen, *dep_idx, local);
                    }
                }
                ImportedName::Default => {
                    if let Some(local) = dep.exports.get("default") {
                        need(&mut worklist, &mut seen, *dep_idx, local);
                    }
                }
                ImportedName::Namespace => {
                    let locals: Vec<String> = dep.exports.values().cloned().collect();
                    for local in locals {
                        need(&mut worklist, &mut seen, *dep_idx, &local);
                    }
                }
            }
            continue;
        }

        if let Some(&stmt_idx) = declaring[module_idx].get(name.as_str()) {
            if kept[module_idx].insert(stmt_idx) {
                for referenced in &module.statements[stmt_idx].referenced {
                    need(&mut worklist, &mut seen, module_idx, referenced);
                }
            }
        }
        // Anything else is a global (console, document, ...) and resolves at
        // run time.
    }

    kept
}

// ═══════════════════════════════════════════════════════════════════════════════
// EMISSION
// ═══════════════════════════════════════════════════════════════════════════════

/// Print the kept statements of one module, unwrapping export declarations.
fn emit_module(module: &Module, kept: &HashSet<usize>) -> Result<String, BuildError> {
    let allocator = Allocator::default();
    let mut program = prepare_program(&allocator, &module.path, &module.source)?;

    let body = mem::replace(&mut program.body, OxcVec::new_in(&allocator));
    for (idx, stmt) in body.into_iter().enumerate() {
        if !kept.contains(&idx) {
            continue;
        }
        match stmt {
            Statement::ImportDeclaration(_) | Statement::ExportAllDeclaration(_) => {}
            Statement::ExportNamedDeclaration(export) => {
                let mut export = export.unbox();
                if let Some(declaration) = export.declaration.take() {
                    program.body.push(Statement::from(declaration));
                }
            }
            Statement::ExportDefaultDeclaration(export) => {
                let export = export.unbox();
                match export.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                        program.body.push(Statement::FunctionDeclaration(func));
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                        program.body.push(Statement::ClassDeclaration(class));
                    }
                    _ => {}
                }
            }
            other => program.body.push(other),
        }
    }

    Ok(Codegen::new().build(&program).code)
}

/// Dependency-first (post-order) emission order from the entry.
fn emission_order(graph: &ModuleGraph, entry: usize) -> Vec<usize> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();

    fn visit(graph: &ModuleGraph, idx: usize, visited: &mut HashSet<usize>, order: &mut Vec<usize>) {
        if !visited.insert(idx) {
            return;
        }
        for &dep in &graph.modules[idx].deps {
            visit(graph, dep, visited, order);
        }
        order.push(idx);
    }

    visit(graph, entry, &mut visited, &mut order);
    order
}

fn bundle_graph(entry: &Path, options: &BundleOptions) -> Result<String, BuildError> {
    let mut graph = ModuleGraph {
        modules: Vec::new(),
        index: HashMap::new(),
    };
    let entry_idx = load_module(&mut graph, entry)?;
    let order = emission_order(&graph, entry_idx);

    // The exact input is the concatenation of every resolved module source,
    // in emission order; identical inputs reuse the cached bundle.
    if let Some(cache) = options.cache {
        let mut input = Vec::new();
        for &idx in &order {
            input.extend_from_slice(graph.modules[idx].source.as_bytes());
            input.push(0);
        }
        if let Some(hit) = cache.get_text("bundle", &input) {
            tracing::debug!(entry = %entry.display(), "bundle cache hit");
            return Ok(hit);
        }
        let kept = compute_kept(&graph, entry_idx);
        let code = emit_ordered(&graph, &order, &kept)?;
        cache.save("bundle", &input, code.as_bytes());
        return Ok(code);
    }

    let kept = compute_kept(&graph, entry_idx);
    emit_ordered(&graph, &order, &kept)
}

fn emit_ordered(
    graph: &ModuleGraph,
    order: &[usize],
    kept: &[HashSet<usize>],
) -> Result<String, BuildError> {
    let mut parts = Vec::new();
    for &idx in order {
        let code = emit_module(&graph.modules[idx], &kept[idx])?;
        if !code.trim().is_empty() {
            parts.push(code);
        }
    }
    Ok(parts.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("mkdir");
            }
            fs::write(path, content).expect("write");
        }
        dir
    }

    #[test]
    fn undefined_entry_is_rejected() {
        let err = bundle(None, &BundleOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "file must be defined");
    }

    #[test]
    fn missing_entry_is_rejected_with_its_path() {
        let err = bundle(
            Some(Path::new("no/such/entry.ts")),
            &BundleOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "file no/such/entry.ts doesn't exist");
    }

    #[test]
    fn undefined_outfile_is_rejected() {
        let dir = project(&[("entry.ts", "console.log(1);")]);
        let err = bundle_to_file(
            Some(&dir.path().join("entry.ts")),
            None,
            &BundleOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "outfile must be defined");
    }

    #[test]
    fn inlines_imports_and_shakes_unused_exports() {
        let dir = project(&[
            (
                "ops.ts",
                "export function sum(a: number, b: number) { return a + b; }\n\
                 export function min(a: number, b: number) { return a < b ? a : b; }\n\
                 export function pow(a: number, b: number) { return Math.pow(a, b); }\n",
            ),
            (
                "entry.ts",
                "import { sum, min, pow } from \"./ops\";\n\
                 console.log(sum(1, 2), pow(2, 3));\n",
            ),
        ]);
        let code = bundle(Some(&dir.path().join("entry.ts")), &BundleOptions::default())
            .expect("bundle");
        assert!(code.contains("sum"));
        assert!(code.contains("pow"));
        assert!(!code.contains("min"));
        assert!(!code.contains("import"));
    }

    #[test]
    fn bundling_is_deterministic() {
        let dir = project(&[
            ("util.ts", "export const greeting = \"hi\";\n"),
            (
                "entry.ts",
                "import { greeting } from \"./util\";\nconsole.log(greeting);\n",
            ),
        ]);
        let opts = BundleOptions::default();
        let first = bundle(Some(&dir.path().join("entry.ts")), &opts).expect("first");
        let second = bundle(Some(&dir.path().join("entry.ts")), &opts).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn aliased_imports_resolve_to_their_export() {
        let dir = project(&[
            ("ops.ts", "export function sum(a, b) { return a + b; }\n"),
            (
                "entry.ts",
                "import { sum as add } from \"./ops\";\nconsole.log(add(1, 2));\n",
            ),
        ]);
        let code = bundle(Some(&dir.path().join("entry.ts")), &BundleOptions::default())
            .expect("bundle");
        assert!(code.contains("function sum"));
    }

    #[test]
    fn dependency_side_effects_survive_shaking() {
        let dir = project(&[
            (
                "ops.ts",
                "globalThis.__ops_loaded__ = true;\n\
                 export function sum(a, b) { return a + b; }\n\
                 export function unused() { return 0; }\n",
            ),
            (
                "entry.ts",
                "import { sum } from \"./ops\";\nconsole.log(sum(1, 1));\n",
            ),
        ]);
        let code = bundle(Some(&dir.path().join("entry.ts")), &BundleOptions::default())
            .expect("bundle");
        assert!(code.contains("__ops_loaded__"));
        assert!(!code.contains("unused"));
    }

    #[test]
    fn typescript_annotations_are_stripped() {
        let dir = project(&[(
            "entry.ts",
            "interface Point { x: number; y: number; }\n\
             const p: Point = { x: 1, y: 2 };\n\
             console.log(p.x);\n",
        )]);
        let code = bundle(Some(&dir.path().join("entry.ts")), &BundleOptions::default())
            .expect("bundle");
        assert!(!code.contains("interface"));
        assert!(!code.contains(": Point"));
    }

    #[test]
    fn compile_errors_propagate_in_strict_mode() {
        let dir = project(&[("entry.ts", "const = broken;\n")]);
        let err = bundle(Some(&dir.path().join("entry.ts")), &BundleOptions::default())
            .unwrap_err();
        assert!(matches!(err, BuildError::Compile { .. }));
    }

    #[test]
    fn compile_errors_are_suppressed_in_resilient_mode() {
        let dir = project(&[("entry.ts", "const = broken;\n")]);
        let opts = BundleOptions {
            suppress_errors: true,
            quiet: true,
            ..Default::default()
        };
        let code = bundle(Some(&dir.path().join("entry.ts")), &opts).expect("suppressed");
        assert_eq!(code, "");
    }

    #[test]
    fn writes_bundle_to_the_out_file() {
        let dir = project(&[("entry.ts", "console.log(\"persisted\");\n")]);
        let out = dir.path().join("out/entry.js");
        let code = bundle_to_file(
            Some(&dir.path().join("entry.ts")),
            Some(&out),
            &BundleOptions::default(),
        )
        .expect("bundle");
        assert_eq!(fs::read_to_string(out).expect("read"), code);
        assert!(code.contains("persisted"));
    }

    #[test]
    fn cache_round_trips_identical_inputs() {
        let cache_dir = tempfile::tempdir().expect("tempdir");
        let cache = BuildCache::new(cache_dir.path());
        let dir = project(&[("entry.ts", "console.log(\"cached\");\n")]);
        let opts = BundleOptions {
            cache: Some(&cache),
            ..Default::default()
        };
        let first = bundle(Some(&dir.path().join("entry.ts")), &opts).expect("first");
        let second = bundle(Some(&dir.path().join("entry.ts")), &opts).expect("second");
        assert_eq!(first, second);
    }
}

//! Module graph resolution.
//!
//! Turns import specifiers into a dependency-ordered list of parsed
//! modules. Resolution is pure path arithmetic over the resolution root;
//! file loading is the only I/O. Missing modules and unresolvable cycles
//! surface as diagnostics, never panics.

use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;

use tsi_common::diagnostics::{Diagnostic, diagnostic_codes};
use tsi_common::modpath;
use tsi_common::options::EngineOptions;
use tsi_parser::Parser;
use tsi_parser::ast::{ExportKind, Program, Stmt, StmtKind};

/// One parsed module in the graph.
pub struct LoadedModule {
    /// Normalised engine-internal path (forward slashes, absolute).
    pub path: String,
    pub program: Program,
}

/// The resolved graph, dependency-ordered (imports before importers).
pub struct ModuleGraph {
    pub modules: Vec<LoadedModule>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve the graph reachable from `entry`.
pub fn resolve_graph(entry: &Path, options: &EngineOptions) -> ModuleGraph {
    let root = options
        .module_resolution_root
        .clone()
        .or_else(|| entry.parent().map(Path::to_path_buf))
        .unwrap_or_default();

    let entry_key = normalise_fs_path(entry);
    let mut resolver = Resolver {
        root,
        options: options.clone(),
        loaded: FxHashMap::default(),
        visiting: FxHashSet::default(),
        order: Vec::new(),
        diagnostics: Vec::new(),
    };
    resolver.visit(&entry_key, None);

    let mut modules = Vec::new();
    for path in resolver.order {
        if let Some(program) = resolver.loaded.remove(&path) {
            modules.push(LoadedModule { path, program });
        }
    }
    ModuleGraph {
        modules,
        diagnostics: resolver.diagnostics,
    }
}

struct Resolver {
    root: std::path::PathBuf,
    options: EngineOptions,
    loaded: FxHashMap<String, Program>,
    visiting: FxHashSet<String>,
    order: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl Resolver {
    /// Depth-first post-order: dependencies land before their importers.
    fn visit(&mut self, path: &str, importer: Option<&str>) {
        if self.loaded.contains_key(path) || self.order.contains(&path.to_string()) {
            return;
        }
        if self.visiting.contains(path) {
            self.diagnostics.push(Diagnostic::error(
                importer.unwrap_or(path).to_string(),
                0,
                0,
                format!("Circular import through '{path}'."),
                diagnostic_codes::CIRCULAR_IMPORT,
            ));
            return;
        }

        let fs_path = self.to_fs_path(path);
        let source = match std::fs::read_to_string(&fs_path) {
            Ok(source) => source,
            Err(_) => {
                self.diagnostics.push(Diagnostic::error(
                    importer.unwrap_or(path).to_string(),
                    0,
                    0,
                    format!("Cannot find module '{path}'."),
                    diagnostic_codes::MODULE_NOT_FOUND,
                ));
                return;
            }
        };

        let parsed = Parser::new(path.to_string(), &source)
            .with_decorator_mode(self.options.decorator_mode)
            .parse_program();
        self.diagnostics.extend(parsed.diagnostics);

        self.visiting.insert(path.to_string());
        for specifier in import_specifiers(&parsed.program.statements) {
            if modpath::is_bare(&specifier) {
                // Bare specifiers are host capabilities, not graph edges.
                continue;
            }
            let resolved =
                modpath::with_default_extension(&modpath::resolve(&specifier, Some(path)));
            self.visit(&resolved, Some(path));
        }
        self.visiting.remove(path);

        self.order.push(path.to_string());
        self.loaded.insert(path.to_string(), parsed.program);
    }

    fn to_fs_path(&self, module_path: &str) -> std::path::PathBuf {
        let relative = module_path.trim_start_matches('/');
        self.root.join(relative)
    }
}

/// Engine-internal key for the entry file: `/<file name>` under its own
/// directory root.
fn normalise_fs_path(entry: &Path) -> String {
    let name = entry
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    modpath::with_default_extension(&format!("/{name}"))
}

/// All static import specifiers of a program.
fn import_specifiers(stmts: &[Stmt]) -> Vec<String> {
    let mut out = Vec::new();
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Import { source, .. } => out.push(source.clone()),
            StmtKind::Export(ExportKind::Star { source }) => out.push(source.clone()),
            _ => {}
        }
    }
    out
}

/// Names a module exports (value world).
pub fn exported_names(program: &Program) -> Vec<String> {
    let mut out = Vec::new();
    for stmt in &program.statements {
        let StmtKind::Export(kind) = &stmt.kind else {
            continue;
        };
        match kind {
            ExportKind::DefaultExpr(_) => out.push("default".to_string()),
            ExportKind::Named(specs) => {
                out.extend(specs.iter().map(|spec| spec.exported.clone()));
            }
            ExportKind::Decl(inner) => match &inner.kind {
                StmtKind::Var { decls, .. } => {
                    out.extend(
                        decls
                            .iter()
                            .filter(|d| !d.synthetic)
                            .map(|d| d.name.clone()),
                    );
                }
                StmtKind::Function(func) => out.extend(func.name.clone()),
                StmtKind::Class(class) => out.extend(class.name.clone()),
                StmtKind::Enum { name, .. } | StmtKind::Namespace { name, .. } => {
                    out.push(name.clone());
                }
                _ => {}
            },
            ExportKind::Star { .. } => {}
        }
    }
    out
}

//! Public engine API for the tsi TypeScript-subset execution engine.
//!
//! Three entry points:
//! - [`run`] - parse, check, interpret one source text
//! - [`run_module`] - resolve an import graph, check it whole, evaluate
//!   the entry in dependency order
//! - [`compile`] - parse and check, handing the typed program to an
//!   emission back end behind the [`Emitter`] trait
//!
//! Parse and check diagnostics accumulate and are reported together; a
//! non-empty error set prevents execution.

pub mod modules;

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use tsi_checker::{TypeMap, check_program};
use tsi_common::diagnostics::Diagnostic;
use tsi_common::options::EngineOptions;
use tsi_common::span::Span;
use tsi_parser::Parser;
use tsi_parser::ast::Program;
use tsi_runtime::interp::{BufferSink, ConsoleSink, ModuleRecord, StdoutSink};
use tsi_runtime::value::ObjectData;
use tsi_runtime::{EngineFault, Interpreter, Value};

pub use tsi_common::options::DecoratorMode;

/// Result of a `run`/`run_module` call.
pub struct RunReport {
    /// Lex, parse, check and module-resolution diagnostics.
    pub diagnostics: Vec<Diagnostic>,
    /// Normal-completion value of the last top-level expression, if
    /// execution happened and produced one.
    pub value: Option<Value>,
    /// Rendered unhandled throw, if one escaped top level.
    pub unhandled_error: Option<String>,
}

impl RunReport {
    /// Non-zero when diagnostics are errors or a throw went unhandled.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.diagnostics.iter().any(Diagnostic::is_error) || self.unhandled_error.is_some() {
            1
        } else {
            0
        }
    }
}

/// Parse, check and interpret one source text.
pub fn run(source: &str, options: &EngineOptions) -> Result<RunReport, EngineFault> {
    run_with_sink(source, options, Rc::new(RefCell::new(StdoutSink)))
}

/// `run` with console output captured by the given sink.
pub fn run_with_sink(
    source: &str,
    options: &EngineOptions,
    sink: Rc<RefCell<dyn ConsoleSink>>,
) -> Result<RunReport, EngineFault> {
    let options = options.clone().apply_strict_defaults();
    let parsed = Parser::new("main.ts", source)
        .with_decorator_mode(options.decorator_mode)
        .parse_program();
    let mut diagnostics = parsed.diagnostics;
    let checked = check_program(&parsed.program, &options);
    diagnostics.extend(checked.diagnostics);
    tracing::debug!(
        statements = parsed.program.statements.len(),
        diagnostics = diagnostics.len(),
        "front end finished"
    );
    if diagnostics.iter().any(Diagnostic::is_error) {
        return Ok(RunReport {
            diagnostics,
            value: None,
            unhandled_error: None,
        });
    }

    let mut interp = Interpreter::with_sink(options, checked.type_map, sink);
    let outcome = interp.run_program(&parsed.program)?;
    Ok(RunReport {
        diagnostics,
        value: outcome.value,
        unhandled_error: outcome.unhandled_error,
    })
}

/// Convenience: run and capture console output as lines.
pub fn run_capturing(
    source: &str,
    options: &EngineOptions,
) -> Result<(RunReport, Vec<String>), EngineFault> {
    let sink = Rc::new(RefCell::new(BufferSink::default()));
    let report = run_with_sink(source, options, Rc::clone(&sink) as _)?;
    let lines = sink.borrow().lines.clone();
    Ok((report, lines))
}

/// Resolve the import graph under `entry`, check every module, evaluate
/// in dependency order and return the entry's outcome.
pub fn run_module(entry: &Path, options: &EngineOptions) -> Result<RunReport, EngineFault> {
    run_module_with_sink(entry, options, Rc::new(RefCell::new(StdoutSink)))
}

pub fn run_module_with_sink(
    entry: &Path,
    options: &EngineOptions,
    sink: Rc<RefCell<dyn ConsoleSink>>,
) -> Result<RunReport, EngineFault> {
    let options = options.clone().apply_strict_defaults();
    let graph = modules::resolve_graph(entry, &options);
    let mut diagnostics = graph.diagnostics;
    tracing::debug!(modules = graph.modules.len(), "module graph resolved");

    // Check the whole graph before any evaluation.
    let mut checked_modules = Vec::new();
    for module in &graph.modules {
        let result = check_program(&module.program, &options);
        diagnostics.extend(result.diagnostics);
        checked_modules.push(result.type_map);
    }
    if diagnostics.iter().any(Diagnostic::is_error) {
        return Ok(RunReport {
            diagnostics,
            value: None,
            unhandled_error: None,
        });
    }

    // One engine evaluates every module; each gets its own environment and
    // its exports become a live namespace record.
    let mut value = None;
    let mut unhandled_error = None;
    let mut interp: Option<Interpreter> = None;
    for (module, type_map) in graph.modules.iter().zip(checked_modules) {
        let engine = match &mut interp {
            Some(engine) => {
                engine.type_map = Rc::new(type_map);
                engine
            }
            None => {
                interp = Some(Interpreter::with_sink(
                    options.clone(),
                    type_map,
                    Rc::clone(&sink),
                ));
                interp.as_mut().expect("engine")
            }
        };
        engine.current_module = Some(module.path.clone());
        let module_env = tsi_runtime::env::Environment::child(&engine.globals);

        // Wire imports from already-evaluated modules.
        if let Err(error) = wire_imports(engine, &module.program, &module_env, &module.path) {
            unhandled_error = Some(error);
            break;
        }

        let outcome = engine.run_program_in(&module.program, &module_env)?;
        if outcome.unhandled_error.is_some() {
            unhandled_error = outcome.unhandled_error;
            break;
        }
        if outcome.value.is_some() {
            value = outcome.value;
        }

        // Export surface: collect the module's exported bindings.
        let namespace = ObjectData::new();
        {
            let mut data = namespace.borrow_mut();
            for name in modules::exported_names(&module.program) {
                let binding = if name == "default" {
                    module_env.lookup("%default")
                } else {
                    module_env.lookup(&name)
                };
                if let Some(binding) = binding {
                    data.properties.insert(name, binding);
                }
            }
        }
        engine
            .modules
            .insert(module.path.clone(), ModuleRecord { namespace });
    }

    Ok(RunReport {
        diagnostics,
        value,
        unhandled_error,
    })
}

fn wire_imports(
    engine: &mut Interpreter,
    program: &Program,
    module_env: &tsi_runtime::env::EnvRef,
    importer: &str,
) -> Result<(), String> {
    use tsi_parser::ast::{ImportClause, StmtKind};
    for stmt in &program.statements {
        let StmtKind::Import {
            clause,
            source,
            type_only,
        } = &stmt.kind
        else {
            continue;
        };
        if *type_only {
            continue;
        }
        let resolved = tsi_common::modpath::with_default_extension(&tsi_common::modpath::resolve(
            source,
            Some(importer),
        ));
        let Some(record) = engine.modules.get(&resolved) else {
            // Bare specifiers resolve through the capability table; the
            // graph builder already diagnosed missing relative modules.
            continue;
        };
        let namespace = Rc::clone(&record.namespace);
        match clause {
            ImportClause::Bare => {}
            ImportClause::Namespace(local) => {
                module_env.declare(local, Value::Object(namespace), false);
            }
            ImportClause::Default(local) => {
                let value = namespace
                    .borrow()
                    .properties
                    .get("default")
                    .cloned()
                    .unwrap_or(Value::Undefined);
                module_env.declare(local, value, false);
            }
            ImportClause::Named(specs) => {
                for spec in specs {
                    if spec.type_only {
                        continue;
                    }
                    let value = namespace.borrow().properties.get(&spec.imported).cloned();
                    match value {
                        Some(value) => module_env.declare(&spec.local, value, false),
                        None => {
                            return Err(format!(
                                "Module '{source}' has no export named '{}'",
                                spec.imported
                            ));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// Compile surface
// =============================================================================

/// What the emission back end consumes: exactly the parsed statement
/// list, the type map, and the dead-code set.
pub struct CompileArtifact {
    pub program: Program,
    pub type_map: TypeMap,
    pub dead_code: Vec<Span>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileArtifact {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// The external code-emission back end.
pub trait Emitter {
    type Output;
    type Error;

    /// Emit from a checked artifact. Never called with an erroring one by
    /// [`compile_with`].
    fn emit(&mut self, artifact: &CompileArtifact) -> Result<Self::Output, Self::Error>;
}

/// Parse and check; hand back the artifact for an external emitter.
#[must_use]
pub fn compile(source: &str, options: &EngineOptions) -> CompileArtifact {
    let options = options.clone().apply_strict_defaults();
    let parsed = Parser::new("main.ts", source)
        .with_decorator_mode(options.decorator_mode)
        .parse_program();
    let mut diagnostics = parsed.diagnostics;
    let mut checked = check_program(&parsed.program, &options);
    diagnostics.extend(std::mem::take(&mut checked.diagnostics));
    let dead_code = std::mem::take(&mut checked.type_map.dead_code);
    CompileArtifact {
        program: parsed.program,
        type_map: checked.type_map,
        dead_code,
        diagnostics,
    }
}

/// Compile and emit in one step.
pub fn compile_with<E: Emitter>(
    source: &str,
    options: &EngineOptions,
    emitter: &mut E,
) -> Result<Option<E::Output>, E::Error> {
    let artifact = compile(source, options);
    if artifact.has_errors() {
        return Ok(None);
    }
    emitter.emit(&artifact).map(Some)
}

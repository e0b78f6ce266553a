use std::{
    cell::RefCell,
    collections::HashMap,
    io::{ErrorKind, Read},
    path::{Component, Path, PathBuf},
    rc::Rc,
};

use indexmap::IndexSet;

use crate::{
    codegen::{Compiler, Interrupt, Invoker},
    diagnostics::{Diagnostic, EaselError, Result},
    environment::Scopes,
    package::{Registry, BUILTIN_PACKAGE},
    parser,
    source::SourceProvider,
    value::Value,
};

/// The execution context: a package registry, a source provider for
/// imports, and the global environment scripts compile against.
pub struct Machine {
    scopes: Scopes,
    registry: Rc<Registry>,
    importer: Rc<Importer>,
}

impl Machine {
    pub fn new(registry: Registry, source: impl SourceProvider + 'static) -> Self {
        let registry = Rc::new(registry);
        let scopes = Scopes::new();
        preload_builtin(&scopes, &registry);
        let importer = Importer::new(Rc::clone(&registry), Rc::new(source));
        Self {
            scopes,
            registry,
            importer,
        }
    }

    /// Parses and lowers one source file. Running the result executes the
    /// top-level statements in order.
    pub fn compile(&mut self, filename: &str, mut reader: impl Read) -> Result<CompiledProgram> {
        let mut source = String::new();
        reader.read_to_string(&mut source)?;
        self.compile_source(filename, &source)
    }

    pub fn compile_source(&mut self, filename: &str, source: &str) -> Result<CompiledProgram> {
        let file = parser::parse_program(source).map_err(|diag| located(diag, filename))?;
        let compiler = Compiler::new(
            self.scopes.clone(),
            Rc::clone(&self.registry),
            Rc::clone(&self.importer),
        );
        let invoker = compiler
            .lower_program(&file)
            .map_err(|err| located_err(err, filename))?;
        Ok(CompiledProgram {
            invoker,
            scopes: self.scopes.clone(),
        })
    }

    /// Compiles and runs a source string against this machine's
    /// environment.
    pub fn eval_source(&mut self, source: &str) -> Result<()> {
        self.compile_source("", source)?.run()
    }

    /// The machine's `pub` exports gathered so far.
    pub fn exports(&self) -> Value {
        Value::object(self.scopes.global().borrow().export_snapshot())
    }
}

/// A lowered program bound to its environment.
pub struct CompiledProgram {
    invoker: Invoker,
    scopes: Scopes,
}

impl CompiledProgram {
    pub fn run(&self) -> Result<()> {
        match (self.invoker)() {
            Ok(()) => Ok(()),
            Err(Interrupt::Failure(err)) => Err(err),
            Err(Interrupt::Return) => Ok(()),
            Err(Interrupt::Break) | Err(Interrupt::Continue) => Err(Diagnostic::runtime(
                "loop control flow escaped the program",
            )
            .into()),
        }
    }

    /// The `pub` exports published by this program's file.
    pub fn exports(&self) -> Value {
        Value::object(self.scopes.global().borrow().export_snapshot())
    }
}

fn preload_builtin(scopes: &Scopes, registry: &Registry) {
    let Some(builtin) = registry.get(BUILTIN_PACKAGE) else {
        return;
    };
    let global = scopes.global();
    for (name, value) in builtin.objects() {
        let slot = global.borrow_mut().register(name);
        global.borrow_mut().define(slot, value.clone());
    }
}

fn located(diag: Diagnostic, filename: &str) -> EaselError {
    if filename.is_empty() {
        return diag.into();
    }
    diag.with_note(format!("in {filename}")).into()
}

fn located_err(err: EaselError, filename: &str) -> EaselError {
    match err {
        EaselError::Diagnostic(diag) => located(diag, filename),
        other => other,
    }
}

/// Loads peer source files for `import` expressions. Keeps the active
/// import chain for cycle detection and memoises finished files by
/// canonical path.
pub struct Importer {
    registry: Rc<Registry>,
    source: Rc<dyn SourceProvider>,
    chain: RefCell<IndexSet<PathBuf>>,
    loaded: RefCell<HashMap<PathBuf, Value>>,
}

impl Importer {
    pub fn new(registry: Rc<Registry>, source: Rc<dyn SourceProvider>) -> Rc<Self> {
        Rc::new(Self {
            registry,
            source,
            chain: RefCell::new(IndexSet::new()),
            loaded: RefCell::new(HashMap::new()),
        })
    }

    /// Validates and cleans an import path: non-empty, relative, and not
    /// escaping the project root.
    pub fn normalize_path(raw: &str) -> std::result::Result<PathBuf, String> {
        if raw.is_empty() {
            return Err("import path must not be empty".into());
        }
        let path = Path::new(raw);
        if path.is_absolute() {
            return Err(format!("import path `{raw}` must be relative"));
        }
        let mut clean = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => clean.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !clean.pop() {
                        return Err(format!(
                            "import path `{raw}` must not escape the project root"
                        ));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(format!("import path `{raw}` must be relative"));
                }
            }
        }
        if clean.as_os_str().is_empty() {
            return Err("import path must not be empty".into());
        }
        Ok(clean)
    }

    /// Runs a peer file and returns its `pub` exports as an object. The
    /// file executes at most once; later imports reuse the first result.
    pub fn import(self: &Rc<Self>, path: &Path) -> Result<Value> {
        if let Some(exports) = self.loaded.borrow().get(path) {
            return Ok(exports.clone());
        }
        if self.chain.borrow().contains(path) {
            return Err(Diagnostic::runtime(format!(
                "import cycle detected at `{}`",
                path.display()
            ))
            .into());
        }

        self.chain.borrow_mut().insert(path.to_path_buf());
        let result = self.load(path);
        self.chain.borrow_mut().shift_remove(path);

        let exports = result?;
        self.loaded
            .borrow_mut()
            .insert(path.to_path_buf(), exports.clone());
        Ok(exports)
    }

    fn load(self: &Rc<Self>, path: &Path) -> Result<Value> {
        let source = self.source.open(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => EaselError::from(Diagnostic::runtime(format!(
                "module `{}` not found",
                path.display()
            ))),
            ErrorKind::InvalidInput => EaselError::from(Diagnostic::runtime(format!(
                "`{}` is not a regular file",
                path.display()
            ))),
            _ => EaselError::Io(err),
        })?;

        let filename = path.display().to_string();
        let file = parser::parse_program(&source).map_err(|diag| located(diag, &filename))?;

        // Imported files get a fresh environment sharing only the registry
        // and this importer.
        let scopes = Scopes::new();
        preload_builtin(&scopes, &self.registry);
        let compiler = Compiler::new(scopes.clone(), Rc::clone(&self.registry), Rc::clone(self));
        let invoker = compiler
            .lower_program(&file)
            .map_err(|err| located_err(err, &filename))?;

        match invoker() {
            Ok(()) | Err(Interrupt::Return) => {}
            Err(Interrupt::Failure(err)) => return Err(err),
            Err(Interrupt::Break) | Err(Interrupt::Continue) => {
                return Err(Diagnostic::runtime("loop control flow escaped the module").into());
            }
        }

        let snapshot = scopes.global().borrow().export_snapshot();
        Ok(Value::object(snapshot))
    }
}

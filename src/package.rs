use indexmap::IndexMap;

use crate::{
    diagnostics::{Diagnostic, Result},
    stdlib,
    value::Value,
};

/// The reserved package preloaded into every global scope.
pub const BUILTIN_PACKAGE: &str = "builtin";

/// A named bundle of pre-built values exposed to scripts through `using`
/// (or implicitly, for `builtin`).
pub struct Package {
    name: String,
    objects: IndexMap<String, Value>,
}

impl Package {
    pub fn builder(name: impl Into<String>) -> PackageBuilder {
        PackageBuilder {
            name: name.into(),
            objects: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn objects(&self) -> &IndexMap<String, Value> {
        &self.objects
    }
}

pub struct PackageBuilder {
    name: String,
    objects: IndexMap<String, Value>,
}

impl PackageBuilder {
    pub fn value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.objects.insert(name.into(), value);
        self
    }

    pub fn build(self) -> Package {
        Package {
            name: self.name,
            objects: self.objects,
        }
    }
}

/// Process-wide set of registered packages. Populated at startup and
/// read-only afterwards.
pub struct Registry {
    packages: IndexMap<String, Package>,
}

impl Registry {
    /// A registry seeded with the `builtin` and `iter` packages, with
    /// `print`/`println` writing to stdout.
    pub fn new() -> Self {
        Self::with_output(stdlib::stdout_output())
    }

    /// Like `new`, but host output goes through the given writer.
    pub fn with_output(out: stdlib::Output) -> Self {
        let mut packages = IndexMap::new();
        let builtin = stdlib::builtin_package(out);
        let iter = stdlib::iter_package();
        packages.insert(builtin.name().to_string(), builtin);
        packages.insert(iter.name().to_string(), iter);
        Self { packages }
    }

    pub fn register(&mut self, package: Package) -> Result<()> {
        if package.name() == BUILTIN_PACKAGE {
            return Err(Diagnostic::compile("package name 'builtin' is reserved").into());
        }
        if self.packages.contains_key(package.name()) {
            return Err(Diagnostic::compile(format!(
                "package name '{}' is already registered",
                package.name()
            ))
            .into());
        }
        self.packages.insert(package.name().to_string(), package);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_builtin_and_iter() {
        let registry = Registry::new();
        assert!(registry.get("builtin").is_some());
        assert!(registry.get("iter").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn builtin_name_is_reserved() {
        let mut registry = Registry::new();
        let err = registry
            .register(Package::builder("builtin").build())
            .expect_err("builtin must be reserved");
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn rejects_duplicate_registration() {
        let mut registry = Registry::new();
        registry
            .register(Package::builder("host").value("answer", Value::int(42)).build())
            .expect("first registration");
        let err = registry
            .register(Package::builder("host").build())
            .expect_err("duplicate must fail");
        assert!(err.to_string().contains("already registered"));
    }
}

//! The table of parsed modules in a compilation.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast;
use crate::error::{ResolveError, ResolveErrorKind};

/// Every module of a compilation, addressable by name. Import cycles are
/// tolerated here (the resolver breaks them lazily) but surfaced as
/// warnings.
#[derive(Debug)]
pub(crate) struct ModuleTable {
    modules: Vec<ast::Module>,
    by_name: BTreeMap<String, usize>,
}

impl ModuleTable {
    /// Builds the table, enforcing unique module names.
    pub fn new(modules: Vec<ast::Module>) -> Result<Self, ResolveError> {
        let mut by_name = BTreeMap::new();
        for (position, module) in modules.iter().enumerate() {
            if by_name.insert(module.name.clone(), position).is_some() {
                return Err(ResolveError::new(
                    ResolveErrorKind::DuplicateName {
                        duplicate: module.name.clone(),
                    },
                    &module.name,
                    &module.name,
                ));
            }
        }
        Ok(Self { modules, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&ast::Module> {
        self.by_name.get(name).map(|&position| &self.modules[position])
    }

    pub fn modules(&self) -> impl Iterator<Item = &ast::Module> {
        self.modules.iter()
    }

    /// Finds the assignment a symbol used in `module` refers to, following
    /// the import chain to the defining module. Returns the defining module
    /// and the assignment itself.
    pub fn lookup<'table>(
        &'table self,
        module: &str,
        symbol: &str,
    ) -> Result<(&'table ast::Module, &'table ast::Assignment), ResolveErrorKind> {
        let mut visited = BTreeSet::new();
        let mut current = module;

        loop {
            if !visited.insert(current.to_owned()) {
                // an import cycle with no definition anywhere on it
                return Err(ResolveErrorKind::UnknownReference {
                    symbol: symbol.to_owned(),
                });
            }
            let definition = self.get(current).ok_or(ResolveErrorKind::UnknownModule {
                module: current.to_owned(),
            })?;

            if let Some(assignment) = definition
                .assignments
                .iter()
                .find(|assignment| assignment.name() == symbol)
            {
                // Exports only gate symbols pulled in from elsewhere.
                if current != module {
                    if let Some(exports) = &definition.exports {
                        if !exports.iter().any(|name| name == symbol) {
                            return Err(ResolveErrorKind::UnknownImport {
                                symbol: symbol.to_owned(),
                                module: current.to_owned(),
                            });
                        }
                    }
                }
                return Ok((definition, assignment));
            }

            match definition
                .imports
                .iter()
                .find(|import| import.symbols.iter().any(|name| name == symbol))
            {
                Some(import) => current = &import.module,
                None => {
                    return Err(ResolveErrorKind::UnknownReference {
                        symbol: symbol.to_owned(),
                    })
                }
            }
        }
    }

    /// Import cycles, described for warning output. Cycles are legal; the
    /// resolver breaks them as it dereferences symbols.
    pub fn import_cycles(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for start in self.modules.iter() {
            let mut stack = vec![start.name.as_str()];
            let mut visited = BTreeSet::new();
            self.walk_imports(&start.name, start, &mut stack, &mut visited, &mut warnings);
        }
        warnings.sort();
        warnings.dedup();
        warnings
    }

    fn walk_imports<'table>(
        &'table self,
        origin: &str,
        module: &'table ast::Module,
        stack: &mut Vec<&'table str>,
        visited: &mut BTreeSet<&'table str>,
        warnings: &mut Vec<String>,
    ) {
        for import in &module.imports {
            if import.module == origin {
                let mut cycle: Vec<&str> = stack.clone();
                cycle.push(origin);
                warnings.push(format!("import cycle: {}", cycle.join(" -> ")));
                continue;
            }
            if !visited.insert(import.module.as_str()) {
                continue;
            }
            if let Some(next) = self.get(&import.module) {
                stack.push(&next.name);
                self.walk_imports(origin, next, stack, visited, warnings);
                stack.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn table(source: &str) -> ModuleTable {
        ModuleTable::new(parse("test", source).unwrap()).unwrap()
    }

    #[test]
    fn duplicate_module_names_rejected() {
        let modules = parse(
            "test",
            "M DEFINITIONS ::= BEGIN END M DEFINITIONS ::= BEGIN END",
        )
        .unwrap();
        assert!(ModuleTable::new(modules).is_err());
    }

    #[test]
    fn lookup_follows_imports() {
        let table = table(
            "A DEFINITIONS ::= BEGIN \
             IMPORTS T FROM B; \
             U ::= T \
             END \
             B DEFINITIONS ::= BEGIN T ::= INTEGER END",
        );
        let (module, assignment) = table.lookup("A", "T").unwrap();
        assert_eq!(module.name, "B");
        assert_eq!(assignment.name(), "T");
    }

    #[test]
    fn unexported_symbols_are_invisible() {
        let table = table(
            "A DEFINITIONS ::= BEGIN IMPORTS T FROM B; END \
             B DEFINITIONS ::= BEGIN EXPORTS U; T ::= INTEGER U ::= BOOLEAN END",
        );
        assert!(matches!(
            table.lookup("A", "T"),
            Err(ResolveErrorKind::UnknownImport { .. })
        ));
    }

    #[test]
    fn import_cycles_warn_but_resolve() {
        let table = table(
            "A DEFINITIONS ::= BEGIN IMPORTS T FROM B; U ::= INTEGER END \
             B DEFINITIONS ::= BEGIN IMPORTS U FROM A; T ::= INTEGER END",
        );
        assert!(!table.import_cycles().is_empty());
        assert!(table.lookup("A", "T").is_ok());
        assert!(table.lookup("B", "U").is_ok());
    }
}

use super::types::TableSchema;
use std::collections::{HashMap, HashSet, VecDeque};

/// Resolves load order and filter closures over a set of tables
pub struct DependencyResolver {
    tables: Vec<&'static TableSchema>,
    /// Map of table name -> tables it depends on
    deps: HashMap<&'static str, HashSet<&'static str>>,
}

impl DependencyResolver {
    pub fn new(tables: &[&'static TableSchema]) -> Self {
        let deps = tables
            .iter()
            .map(|table| (table.name, table.dependencies()))
            .collect();

        Self {
            tables: tables.to_vec(),
            deps,
        }
    }

    fn get(&self, name: &str) -> Option<&'static TableSchema> {
        self.tables.iter().find(|t| t.name == name).copied()
    }

    /// Given a set of requested tables, resolve all required dependencies.
    /// Returns tables in dependency order (parents before children)
    pub fn resolve_includes(
        &self,
        requested: &[&str],
    ) -> Result<Vec<&'static TableSchema>, String> {
        let mut included: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = requested.iter().copied().collect();

        while let Some(table_name) = queue.pop_front() {
            if included.contains(table_name) {
                continue;
            }

            let Some(table) = self.get(table_name) else {
                return Err(format!("Unknown table: {}", table_name));
            };

            included.insert(table.name);

            if let Some(table_deps) = self.deps.get(table.name) {
                for dep in table_deps {
                    if !included.contains(dep) {
                        queue.push_back(dep);
                    }
                }
            }
        }

        self.topological_sort(&included)
    }

    /// Given a set of tables to exclude, return remaining tables in order.
    /// Tables whose parent is excluded are dropped as well.
    pub fn resolve_excludes(&self, excluded: &[&str]) -> Result<Vec<&'static TableSchema>, String> {
        for name in excluded {
            if self.get(name).is_none() {
                return Err(format!("Unknown table: {}", name));
            }
        }

        let mut dropped: HashSet<&str> = excluded.iter().copied().collect();

        // Propagate until no new child loses a parent
        loop {
            let newly_dropped: Vec<&'static str> = self
                .tables
                .iter()
                .filter(|t| !dropped.contains(t.name))
                .filter(|t| self.deps[t.name].iter().any(|dep| dropped.contains(dep)))
                .map(|t| t.name)
                .collect();

            if newly_dropped.is_empty() {
                break;
            }
            dropped.extend(newly_dropped);
        }

        let included: HashSet<&str> = self
            .tables
            .iter()
            .map(|t| t.name)
            .filter(|name| !dropped.contains(name))
            .collect();

        self.topological_sort(&included)
    }

    /// Return all tables in dependency order
    pub fn all_tables_ordered(&self) -> Result<Vec<&'static TableSchema>, String> {
        let all: HashSet<&str> = self.tables.iter().map(|t| t.name).collect();
        self.topological_sort(&all)
    }

    /// Topological sort of tables by dependencies. Ties keep the order the
    /// tables were configured in.
    fn topological_sort(
        &self,
        included: &HashSet<&str>,
    ) -> Result<Vec<&'static TableSchema>, String> {
        let mut result = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut temp_visited: HashSet<&str> = HashSet::new();

        for table in &self.tables {
            if included.contains(table.name) && !visited.contains(table.name) {
                self.visit(
                    table.name,
                    included,
                    &mut visited,
                    &mut temp_visited,
                    &mut result,
                )?;
            }
        }

        Ok(result)
    }

    fn visit<'a>(
        &self,
        name: &'a str,
        included: &HashSet<&'a str>,
        visited: &mut HashSet<&'a str>,
        temp_visited: &mut HashSet<&'a str>,
        result: &mut Vec<&'static TableSchema>,
    ) -> Result<(), String> {
        if temp_visited.contains(name) {
            return Err(format!("Circular dependency detected at: {}", name));
        }
        if visited.contains(name) {
            return Ok(());
        }

        temp_visited.insert(name);

        if let Some(deps) = self.deps.get(name) {
            for dep in deps {
                if *dep != name && included.contains(dep) {
                    self.visit(dep, included, visited, temp_visited, result)?;
                }
            }
        }

        temp_visited.remove(name);
        visited.insert(name);

        if let Some(table) = self.get(name) {
            result.push(table);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tables::ALL_TABLES;

    fn names(tables: &[&TableSchema]) -> Vec<&'static str> {
        tables.iter().map(|t| t.name).collect()
    }

    #[test]
    fn test_resolve_master_includes_references() {
        let resolver = DependencyResolver::new(ALL_TABLES);
        let tables = resolver.resolve_includes(&["master"]).unwrap();
        let names = names(&tables);

        assert_eq!(names.len(), 3);
        let master_pos = names.iter().position(|&n| n == "master").unwrap();
        let acftref_pos = names.iter().position(|&n| n == "acftref").unwrap();
        let engine_pos = names.iter().position(|&n| n == "engine").unwrap();

        assert!(acftref_pos < master_pos);
        assert!(engine_pos < master_pos);
    }

    #[test]
    fn test_reference_tables_precede_master_regardless_of_config_order() {
        let reversed: Vec<&'static TableSchema> = ALL_TABLES.iter().rev().copied().collect();
        let resolver = DependencyResolver::new(&reversed);
        let names = names(&resolver.all_tables_ordered().unwrap());

        let master_pos = names.iter().position(|&n| n == "master").unwrap();
        assert!(names.iter().position(|&n| n == "acftref").unwrap() < master_pos);
        assert!(names.iter().position(|&n| n == "engine").unwrap() < master_pos);
        assert_eq!(names.len(), ALL_TABLES.len());
    }

    #[test]
    fn test_excluding_parent_drops_dependents() {
        let resolver = DependencyResolver::new(ALL_TABLES);
        let names = names(&resolver.resolve_excludes(&["engine"]).unwrap());

        assert!(!names.contains(&"engine"));
        assert!(!names.contains(&"master"));
        // Informational references keep these independent
        assert!(names.contains(&"dereg"));
        assert!(names.contains(&"docindex"));
    }

    #[test]
    fn test_unknown_table_error() {
        let resolver = DependencyResolver::new(ALL_TABLES);
        assert!(resolver.resolve_includes(&["nonexistent"]).is_err());
        assert!(resolver.resolve_excludes(&["nonexistent"]).is_err());
    }
}

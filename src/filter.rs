use crate::schema::{DependencyResolver, TableSchema};
use anyhow::{anyhow, bail, Result};
use tracing::{debug, info};

/// Resolves which tables to load from `--include` / `--exclude`.
/// The result is in load order (parents before children).
pub fn resolve_tables(
    tables: &[&'static TableSchema],
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
) -> Result<Vec<&'static TableSchema>> {
    let resolver = DependencyResolver::new(tables);

    let resolved = match (include, exclude) {
        (Some(_), Some(_)) => {
            bail!("Cannot use both --include and --exclude at the same time");
        }
        (Some(include_list), None) => {
            let refs: Vec<&str> = include_list.iter().map(|s| s.as_str()).collect();
            debug!(requested = ?refs, "Resolving dependencies");
            resolver.resolve_includes(&refs).map_err(|e| anyhow!(e))?
        }
        (None, Some(exclude_list)) => {
            let refs: Vec<&str> = exclude_list.iter().map(|s| s.as_str()).collect();
            debug!(excluded = ?refs, "Excluding tables");
            resolver.resolve_excludes(&refs).map_err(|e| anyhow!(e))?
        }
        (None, None) => resolver.all_tables_ordered().map_err(|e| anyhow!(e))?,
    };

    if resolved.is_empty() {
        bail!("No tables left to load");
    }

    let names: Vec<&str> = resolved.iter().map(|t| t.name).collect();
    info!(count = resolved.len(), tables = ?names, "Selected tables");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ALL_TABLES;

    fn names(tables: &[&'static TableSchema]) -> Vec<&'static str> {
        tables.iter().map(|t| t.name).collect()
    }

    #[test]
    fn test_include_pulls_in_parents() {
        let tables = resolve_tables(ALL_TABLES, Some(vec!["master".into()]), None).unwrap();
        assert_eq!(names(&tables), vec!["acftref", "engine", "master"]);
    }

    #[test]
    fn test_exclude_parent_drops_dependents() {
        let tables = resolve_tables(ALL_TABLES, None, Some(vec!["engine".into()])).unwrap();
        let names = names(&tables);
        assert!(!names.contains(&"engine"));
        assert!(!names.contains(&"master"));
        assert!(names.contains(&"dereg"));
    }

    #[test]
    fn test_rejects_both_filters_and_unknown_tables() {
        assert!(resolve_tables(ALL_TABLES, Some(vec![]), Some(vec![])).is_err());
        assert!(resolve_tables(ALL_TABLES, Some(vec!["aircraft".into()]), None).is_err());
    }
}

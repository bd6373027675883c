use std::path::Path;

use anyhow::{Context, Result};

use crate::flag::FeatureFlag;

/// Summary row for a single flag file.
pub struct FlagRow {
    pub file: String,
    pub name: String,
    pub default_enabled: bool,
    pub environments: String,
    pub rules: usize,
}

/// Scan a directory for .json files and produce summary rows.
pub fn scan_dir(dir: &str) -> Result<Vec<FlagRow>> {
    let mut rows = Vec::new();
    let entries = std::fs::read_dir(dir).with_context(|| format!("cannot read directory {dir}"))?;

    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        .map(|e| e.path())
        .collect();
    paths.sort();

    for path in paths {
        match load_row(&path) {
            Ok(row) => rows.push(row),
            Err(e) => {
                eprintln!("  skip {}: {e:#}", path.display());
            }
        }
    }
    Ok(rows)
}

fn load_row(path: &Path) -> Result<FlagRow> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    let flag: FeatureFlag = serde_json::from_str(&content)
        .with_context(|| format!("{}: not a flag definition", path.display()))?;

    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();

    let environments = if flag.environments.is_empty() {
        "-".to_string()
    } else {
        flag.environments
            .iter()
            .map(|env| {
                let state = if env.enabled { "on" } else { "off" };
                format!("{}:{state}", env.environment)
            })
            .collect::<Vec<_>>()
            .join(",")
    };

    let rules = flag
        .environments
        .iter()
        .filter_map(|env| env.rule.as_ref())
        .map(|rule| rule.node_count())
        .sum();

    Ok(FlagRow {
        file,
        name: flag.name,
        default_enabled: flag.default_enabled,
        environments,
        rules,
    })
}

/// Print rows as an aligned table to stdout.
pub fn print_table(rows: &[FlagRow]) {
    if rows.is_empty() {
        println!("(no flags found)");
        return;
    }
    let w_file = rows.iter().map(|r| r.file.len()).max().unwrap_or(4).max(4);
    let w_name = rows.iter().map(|r| r.name.len()).max().unwrap_or(4).max(4);
    let w_envs = rows
        .iter()
        .map(|r| r.environments.len())
        .max()
        .unwrap_or(12)
        .max(12);

    println!(
        "{:<w_file$}  {:<w_name$}  {:<7}  {:<w_envs$}  NODES",
        "FILE", "NAME", "DEFAULT", "ENVIRONMENTS"
    );
    println!(
        "{:<w_file$}  {:<w_name$}  {:<7}  {:<w_envs$}  -----",
        "-".repeat(w_file),
        "-".repeat(w_name),
        "-------",
        "-".repeat(w_envs)
    );
    for r in rows {
        let default = if r.default_enabled { "on" } else { "off" };
        println!(
            "{:<w_file$}  {:<w_name$}  {:<7}  {:<w_envs$}  {}",
            r.file, r.name, default, r.environments, r.rules
        );
    }
}

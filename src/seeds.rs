use std::path::Path;

/// Loads newline-delimited seed URLs. Blank lines and `#`-prefixed comments
/// are ignored. Each pod filters this same shared list down to the domains
/// it owns (spec.md §4.3 seed loading).
pub fn load_seed_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

//! Operator-facing subcommands.

use anyhow::{Context, Result, bail};
use rph_common::errors::lookup;
use rph_common::{LoadedConfig, RestoreHook};
use serde_json::{Map, Value, json};

pub fn applies_to(hook: &RestoreHook) -> Result<()> {
    println!("{}", serde_json::to_string(&hook.applies_to())?);
    Ok(())
}

/// Print the rule set and its conflicts as JSON. With `check`, overlapping
/// rules are an error.
pub async fn rules(hook: &RestoreHook, check: bool) -> Result<()> {
    let rules = hook.load_rules().await.map_err(|e| {
        anyhow::anyhow!(
            "[{}] failed to load substitution rules: {}",
            e.code().code_string(),
            e
        )
    })?;
    let conflicts = rules.conflicts();

    let map: Map<String, Value> = rules
        .iter()
        .map(|(pattern, replacement)| (pattern.to_string(), Value::from(replacement)))
        .collect();
    let report = json!({
        "selector": hook.config().rules.selector,
        "rules": map,
        "conflicts": conflicts.iter().map(ToString::to_string).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if check && !conflicts.is_empty() {
        bail!(
            "{} overlapping rule(s); substitution depends on rule order",
            conflicts.len()
        );
    }
    Ok(())
}

pub fn config(loaded: &LoadedConfig, as_json: bool) -> Result<()> {
    if as_json {
        let report = json!({
            "path": loaded.path,
            "config": loaded.config,
            "sources": loaded.sources,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match &loaded.path {
        Some(path) => println!("# config file: {}", path.display()),
        None => println!("# config file: none"),
    }
    let width = loaded.sources.iter().map(|s| s.key.len()).max().unwrap_or(0);
    for entry in &loaded.sources {
        let origin = match &entry.origin {
            Some(origin) => format!("{}: {}", entry.source, origin),
            None => entry.source.to_string(),
        };
        println!(
            "{:width$} = {:?}  ({})",
            entry.key,
            entry.value,
            origin,
            width = width
        );
    }
    Ok(())
}

pub fn explain(code: &str) -> Result<()> {
    let code = lookup(code).with_context(|| format!("unknown error code '{}'", code))?;
    print!("{}", code.entry().format_full());
    Ok(())
}

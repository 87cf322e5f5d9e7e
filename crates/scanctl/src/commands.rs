//! CLI command implementations

use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use scanstore::{KindFilter, Row, SelectedVariables, SessionEncoding, SessionStore, StoreConfig};
use serde_json::{Map, Value};
use tracing::warn;

fn filter(volumes: bool, blocks: bool) -> KindFilter {
    if !volumes && !blocks {
        KindFilter::ALL
    } else {
        KindFilter { volumes, blocks }
    }
}

/// Print variable names, one per line
pub fn list(file: &Path, volumes: bool, blocks: bool) -> Result<()> {
    list_to(&mut io::stdout().lock(), file, volumes, blocks)
}

fn list_to(out: &mut impl Write, file: &Path, volumes: bool, blocks: bool) -> Result<()> {
    let store = SessionStore::new();
    let names = store
        .list_variable_names_in_file(file, filter(volumes, blocks))
        .with_context(|| format!("failed to list {}", file.display()))?;

    for name in names {
        writeln!(out, "{}", name)?;
    }
    Ok(())
}

/// Print the requested variables as rows or JSON
pub fn show(file: &Path, names: &[String], blocks: bool, json: bool) -> Result<()> {
    show_to(&mut io::stdout().lock(), file, names, blocks, json)
}

fn show_to(out: &mut impl Write, file: &Path, names: &[String], blocks: bool, json: bool) -> Result<()> {
    let store = SessionStore::new();
    let found = if blocks {
        let selected = store
            .read_trial_variables_from_file(file, names)
            .with_context(|| format!("failed to read {}", file.display()))?;
        render(out, selected, json)?
    } else {
        let selected = store
            .read_volume_variables_from_file(file, names)
            .with_context(|| format!("failed to read {}", file.display()))?;
        render(out, selected, json)?
    };

    if found == 0 {
        bail!("none of the requested variables were found in {}", file.display());
    }
    Ok(())
}

/// Write the found variables and return how many there were.
fn render<T>(out: &mut impl Write, selected: SelectedVariables<T>, json: bool) -> Result<usize>
where
    T: Row + serde::Serialize,
{
    let mut found = Map::new();
    let mut count = 0;

    for (name, items) in selected {
        let Some(items) = items else {
            warn!(variable = %name, "variable not found");
            continue;
        };
        count += 1;

        if json {
            found.insert(name, serde_json::to_value(&items)?);
        } else {
            writeln!(out, "<{}>\n{}", name, T::header_line())?;
            for item in &items {
                writeln!(out, "{}", item.to_row())?;
            }
        }
    }

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&Value::Object(found))?)?;
    }
    Ok(count)
}

/// Re-encode a session file; the output extension selects the encoding
pub fn convert(input: &Path, output: &Path) -> Result<()> {
    let store = SessionStore::new();
    store
        .load_session(input)
        .with_context(|| format!("failed to load {}", input.display()))?;

    let encoding = SessionEncoding::from_path(output);
    store
        .save_session_as(output, encoding)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("{} -> {} ({:?})", input.display(), output.display(), encoding);
    Ok(())
}

/// Load a session file and write it out as a checkpoint
pub fn checkpoint(config: &StoreConfig, input: &Path, label: &str) -> Result<()> {
    let store = SessionStore::new();
    store
        .load_session(input)
        .with_context(|| format!("failed to load {}", input.display()))?;

    let written = store
        .save_checkpoint(config, label)
        .with_context(|| format!("failed to write checkpoint into {}", config.session_dir.display()))?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

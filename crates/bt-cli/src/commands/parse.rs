//! Parse command for inspecting a single compiler command line.

use std::io::Write;

use anyhow::{Context, Result};

use bt_core::{CompilerCommand, CompilerLanguage};

pub fn run<W: Write>(
    writer: &mut W,
    language: CompilerLanguage,
    command_line: &str,
    json: bool,
) -> Result<()> {
    let command = CompilerCommand::parse(command_line, language)
        .with_context(|| format!("failed to parse {language} command line"))?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&command)?)?;
        return Ok(());
    }

    writeln!(writer, "Executable: {}", command.executable)?;

    let switches: Vec<_> = command
        .arguments
        .iter()
        .filter(|arg| !arg.is_positional())
        .collect();
    if !switches.is_empty() {
        writeln!(writer, "Switches:")?;
        for switch in switches {
            let name = switch.name.as_deref().unwrap_or_default();
            match &switch.value {
                Some(value) => writeln!(writer, "  {name} = {value}")?,
                None => writeln!(writer, "  {name}")?,
            }
        }
    }

    let positionals: Vec<_> = command.positionals().collect();
    if !positionals.is_empty() {
        writeln!(writer, "Positional:")?;
        for value in positionals {
            writeln!(writer, "  {value}")?;
        }
    }

    Ok(())
}

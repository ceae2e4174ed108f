use anyhow::Result;
use serde_json::Value;
use std::io::Write;

pub fn emit_value(value: &Value, compact: bool, quiet: bool) -> Result<()> {
    if quiet {
        return Ok(());
    }

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    if compact {
        serde_json::to_writer(&mut handle, value)?;
    } else {
        serde_json::to_writer_pretty(&mut handle, value)?;
    }
    handle.write_all(b"\n")?;
    Ok(())
}

use std::io::{self, Write};

use serde::Serialize;

pub struct JsonOutput;

impl JsonOutput {
    /// Pretty JSON on stdout, one document per command.
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write_to(&mut stdout, value)
    }

    pub fn write_to<W: Write, T: Serialize>(writer: &mut W, value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

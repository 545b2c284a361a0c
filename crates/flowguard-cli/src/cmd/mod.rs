pub mod config;
pub mod diff;
pub mod epic;
pub mod init;
pub mod rules;
pub mod spec;
pub mod verification;
pub mod verify;

use anyhow::Context;
use std::io::Read;
use std::path::Path;

/// Read `path`, or stdin when the path is absent or `-`.
pub fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read {}", p.display())),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

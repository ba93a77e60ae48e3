//! Compilation driver
//!
//! Entry points that set up a [`Session`] from a [`LowerConfig`] and lower
//! one compilation unit, given either as a statement tree or as its JSON
//! serialization produced by an external parser.

mod config;

pub use config::LowerConfig;

use anyhow::{Context, Result};
use sq_lower::{lower_program, Session};
use sq_syntax::Stmt;
use std::path::Path;

/// Lower the statement tree `root` into a fresh session
#[tracing::instrument(level = "debug", skip_all, fields(file = config.file_id))]
pub fn compile_unit(config: &LowerConfig, root: &Stmt) -> Result<Session> {
    let mut session = Session::with_options(config.options());
    lower_program(&mut session, root).context("Failed to lower compilation unit")?;
    tracing::debug!(funcs = session.module.funcs().count(), "lowered compilation unit");
    Ok(session)
}

/// Lower a statement tree serialized as JSON
pub fn compile_json(config: &LowerConfig, json: &str) -> Result<Session> {
    let root: Stmt = serde_json::from_str(json).context("Failed to parse statement tree")?;
    compile_unit(config, &root)
}

/// Lower the JSON statement tree stored at `path`
pub fn compile_file(config: &LowerConfig, path: impl AsRef<Path>) -> Result<Session> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read statement tree: {}", path.display()))?;
    compile_json(config, &json).with_context(|| format!("Failed to compile {}", path.display()))
}

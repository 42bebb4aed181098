//! `domainclaw version`.

use serde_json::json;

use domainclaw_core::error::Result;

use crate::emit::Context;
use crate::update::VERSION;

pub fn run(ctx: &mut Context) -> Result<()> {
    ctx.finish("version", Ok(json!({"version": VERSION})))
}

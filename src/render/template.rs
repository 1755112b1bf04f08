//! User template backend.
//!
//! Templates see one variable, `data`: a map from engine-relative leaf path
//! to that leaf's key/value map. Referencing anything undefined is an error.

use minijinja::{context, Environment, UndefinedBehavior};

use crate::errors::{Result, VkvError};
use crate::projection::flatten;
use crate::store::{FlatSecrets, Tree};

pub fn render(source: &str, base: &str, tree: &Tree) -> Result<String> {
    let data: FlatSecrets =
        flatten(tree).into_iter().map(|(path, leaf)| (format!("{}{}", base, path), leaf)).collect();

    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    let rendered = env
        .render_str(source, context! { data => data })
        .map_err(|e| VkvError::internal(format!("template error: {}", e)))?;

    Ok(format!("{}\n", rendered.trim_end()))
}

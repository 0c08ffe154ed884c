//! Required-field checks shared by the dispatcher and every adapter.

use crate::value::{is_truthy, Parameters};
use crate::{Credentials, NodeError};

/// Anything that can answer "is this field present and non-empty".
pub trait FieldLookup {
    /// Scope named in the error message ("parameters" or "credentials").
    const SCOPE: &'static str;

    fn is_present(&self, name: &str) -> bool;
}

impl FieldLookup for Parameters {
    const SCOPE: &'static str = "parameters";

    fn is_present(&self, name: &str) -> bool {
        self.get(name).map(is_truthy).unwrap_or(false)
    }
}

impl FieldLookup for Credentials {
    const SCOPE: &'static str = "credentials";

    fn is_present(&self, name: &str) -> bool {
        self.has(name)
    }
}

/// Fail with every missing name when any of `required` is absent or falsy.
pub fn require_params<P>(params: &P, required: &[&str]) -> Result<(), NodeError>
where
    P: FieldLookup + ?Sized,
{
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !params.is_present(name))
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(NodeError::MissingParameter {
            scope: P::SCOPE,
            names: missing,
        })
    }
}

//! The one place "generic fetch-or-404 helper" lives.
//! Every workspace-scoped repository method ends with a call through this
//! helper so a row that exists but belongs to a different workspace returns
//! the same error as a row that doesn't exist at all — never `Forbidden`,
//! which would let a caller distinguish "wrong tenant" from "no such
//! resource" (an existence oracle).

use crate::error::{Error, Result};

/// Converts `Option<T>` (the shape every `SELECT ... WHERE id = $1 AND
/// workspace_id = $2` query naturally returns) into `Result<T>`, tagging the
/// 404 with the resource type for logging/response purposes.
pub fn found_or_404<T>(row: Option<T>, resource_type: &'static str) -> Result<T> {
    row.ok_or(Error::NotFound { resource_type })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn some_passes_through() {
        assert_eq!(found_or_404(Some(42), "thing").unwrap(), 42);
    }

    #[test]
    fn none_becomes_not_found() {
        let result: Result<i32> = found_or_404(None, "thing");
        assert!(matches!(result, Err(Error::NotFound { resource_type: "thing" })));
    }
}

//! Roots message types.
//!
//! `roots/list` is server-origin: the server asks the client which root
//! directories it may operate within.

use serde::{Deserialize, Serialize};

/// A root directory or file the client exposes to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    /// `file://` URI of the root.
    pub uri: String,

    /// Optional human-readable name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Result the client's roots handler produces for `roots/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRootsResult {
    /// The roots the client exposes.
    pub roots: Vec<Root>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roots_result_wire_shape() {
        let result = ListRootsResult {
            roots: vec![Root {
                uri: "file:///home/user/project".into(),
                name: Some("project".into()),
            }],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["roots"][0]["uri"], "file:///home/user/project");
    }
}

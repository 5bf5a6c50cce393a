use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::IntoStaticStr;

/// A unit of work for the index worker. Paths are vault-relative and `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Task {
    /// Reindex a file from its current on-disk content
    UpsertFile { path: String },
    /// Drop a file and its derived rows
    DeleteFile { path: String },
    /// User-requested rename: move on disk, then rewrite references everywhere
    RenameFile { src_path: String, dest_path: String },
    /// Broadcast an edited block to every other file sharing the old one
    GlobalUpdateBlock {
        origin_path: String,
        old_hash: String,
        new_content: String,
    },
    /// A move already performed on disk; re-key rows without rewriting references
    MoveFile { src_path: String, dest_path: String },
    /// Remove blocks with no instances
    CollectGarbage,
}

impl Task {
    pub fn upsert(path: impl Into<String>) -> Self {
        Task::UpsertFile { path: path.into() }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Task::DeleteFile { path: path.into() }
    }

    /// Short label for logs, matching the serialized `kind`
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

/// Parse a task from its JSON wire form, e.g. `{"kind":"upsert_file","path":"a.md"}`
impl FromStr for Task {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_wire_shape() {
        let task = Task::GlobalUpdateBlock {
            origin_path: "A.md".into(),
            old_hash: "abc".into(),
            new_content: "Shared Block Updated".into(),
        };
        assert_eq!(
            serde_json::to_value(&task).unwrap(),
            json!({
                "kind": "global_update_block",
                "origin_path": "A.md",
                "old_hash": "abc",
                "new_content": "Shared Block Updated"
            })
        );

        let parsed: Task = serde_json::from_value(json!({
            "kind": "rename_file",
            "src_path": "pages/Note A.md",
            "dest_path": "pages/Note A Renamed.md"
        }))
        .unwrap();
        assert_eq!(parsed.kind(), "rename_file");

        assert_eq!(
            serde_json::to_value(Task::CollectGarbage).unwrap(),
            json!({"kind": "collect_garbage"})
        );
    }

    #[test]
    fn test_parse_from_str() {
        let task: Task = r#"{"kind":"delete_file","path":"pages/x.md"}"#.parse().unwrap();
        assert_eq!(task, Task::delete("pages/x.md"));
        assert!(r#"{"kind":"explode"}"#.parse::<Task>().is_err());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(Task::upsert("a.md").kind(), "upsert_file");
        assert_eq!(Task::delete("a.md").kind(), "delete_file");
    }
}

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TAG_COLOR: &str = "#3498DB";

/// Palette offered when creating a tag.
pub const DEFAULT_TAG_COLORS: [&str; 10] = [
    "#E74C3C", "#E67E22", "#F1C40F", "#2ECC71", "#1ABC9C", "#3498DB", "#9B59B6", "#E91E8F",
    "#607D8B", "#795548",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDefinition {
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    DEFAULT_TAG_COLOR.to_string()
}

/// Tag definitions plus assignments keyed by entity.
///
/// Item keys are `column/file`; group keys are `group:column/group`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagsConfig {
    #[serde(default)]
    pub definitions: Vec<TagDefinition>,
    #[serde(default)]
    pub assignments: IndexMap<String, Vec<String>>,
}

impl TagsConfig {
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty() && self.assignments.is_empty()
    }
}

pub fn item_key(column_folder: &str, file_name: &str) -> String {
    format!("{}/{}", column_folder, file_name)
}

pub fn group_key(column_folder: &str, group_name: &str) -> String {
    format!("group:{}/{}", column_folder, group_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys() {
        assert_eq!(item_key("To Do", "a.md"), "To Do/a.md");
        assert_eq!(group_key("To Do", "Urgent"), "group:To Do/Urgent");
    }

    #[test]
    fn color_defaults_when_missing() {
        let tag: TagDefinition = serde_json::from_str(r#"{"name":"bug"}"#).unwrap();
        assert_eq!(tag.color, DEFAULT_TAG_COLOR);
    }

    #[test]
    fn assignments_keep_insertion_order() {
        let json = r#"{"definitions":[],"assignments":{"b/x.md":["t"],"a/y.md":["t"]}}"#;
        let tags: TagsConfig = serde_json::from_str(json).unwrap();
        let keys: Vec<&str> = tags.assignments.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["b/x.md", "a/y.md"]);
        assert_eq!(serde_json::to_string(&tags).unwrap(), json);
    }
}

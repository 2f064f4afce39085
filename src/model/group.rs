use serde::{Deserialize, Serialize};

/// A named, ordered subset of a column's items, stored as its own sidecar file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Always equal to the sidecar file's base name once loaded.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub item_file_names: Vec<String>,
    #[serde(default)]
    pub is_collapsed: bool,
}

impl Group {
    pub fn new(name: impl Into<String>, sort_order: i32) -> Self {
        Group {
            name: name.into(),
            sort_order,
            item_file_names: Vec::new(),
            is_collapsed: false,
        }
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.item_file_names.iter().any(|f| f == file_name)
    }

    /// Remove a member. Returns true if it was present.
    pub fn remove_member(&mut self, file_name: &str) -> bool {
        let before = self.item_file_names.len();
        self.item_file_names.retain(|f| f != file_name);
        self.item_file_names.len() != before
    }

    /// Append a member unless already present. Returns true if added.
    pub fn add_member(&mut self, file_name: &str) -> bool {
        if self.contains(file_name) {
            return false;
        }
        self.item_file_names.push(file_name.to_string());
        true
    }

    /// Replace a member name in place, keeping its position.
    pub fn rename_member(&mut self, old: &str, new: &str) -> bool {
        match self.item_file_names.iter_mut().find(|f| *f == old) {
            Some(slot) => {
                *slot = new.to_string();
                true
            }
            None => false,
        }
    }
}

/// The pre-sidecar aggregate format: one `groups.json` per column.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyGroups {
    #[serde(default)]
    pub groups: Vec<Group>,
}

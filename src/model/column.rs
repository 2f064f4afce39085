use std::path::PathBuf;

use serde::Serialize;

use super::group::Group;
use super::item::Item;

/// The reconciled view of one column: items in display order plus groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub folder_name: String,
    pub display_name: String,
    pub path: PathBuf,
    pub sort_order: i32,
    pub items: Vec<Item>,
    /// Ordered by sort order.
    pub groups: Vec<Group>,
}

impl Column {
    pub fn item(&self, file_name: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.file_name == file_name)
    }

    pub fn item_mut(&mut self, file_name: &str) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| i.file_name == file_name)
    }

    pub fn position(&self, file_name: &str) -> Option<usize> {
        self.items.iter().position(|i| i.file_name == file_name)
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.name == name)
    }

    /// Items that belong to no group, in display order.
    pub fn ungrouped(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|i| i.group.is_none())
    }

    /// Items of one group, in display order.
    pub fn group_items<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Item> + 'a {
        self.items
            .iter()
            .filter(move |i| i.group.as_deref() == Some(name))
    }

    /// File names in display order.
    pub fn file_names(&self) -> Vec<String> {
        self.items.iter().map(|i| i.file_name.clone()).collect()
    }

    pub fn sort_groups(&mut self) {
        self.groups.sort_by_key(|g| g.sort_order);
    }
}

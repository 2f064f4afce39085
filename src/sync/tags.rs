use super::{BoardError, Reconciler};
use crate::model::tags::{TagDefinition, group_key, item_key};
use crate::ops::tag_ops;

impl Reconciler {
    pub fn tag_definitions(&self) -> &[TagDefinition] {
        tag_ops::definitions(&self.board)
    }

    pub fn create_tag(&mut self, name: &str, color: Option<&str>) -> Result<TagDefinition, BoardError> {
        let tag = tag_ops::create_tag(&mut self.board, name, color);
        self.save_board()?;
        Ok(tag)
    }

    pub fn delete_tag(&mut self, name: &str) -> Result<(), BoardError> {
        tag_ops::delete_tag(&mut self.board, name)?;
        self.save_board()?;
        Ok(())
    }

    pub fn rename_tag(&mut self, old: &str, new: &str) -> Result<String, BoardError> {
        let name = tag_ops::rename_tag(&mut self.board, old, new)?;
        self.save_board()?;
        Ok(name)
    }

    pub fn set_tag_color(&mut self, name: &str, color: &str) -> Result<(), BoardError> {
        tag_ops::set_tag_color(&mut self.board, name, color)?;
        self.save_board()?;
        Ok(())
    }

    /// Flip a tag on a card. Returns true if the tag is now assigned.
    pub fn toggle_item_tag(&mut self, column: &str, file: &str, tag: &str) -> Result<bool, BoardError> {
        let col_idx = self.column_index(column)?;
        self.item_position(col_idx, file)?;
        let assigned = tag_ops::toggle_tag(&mut self.board, &item_key(column, file), tag)?;
        self.save_board()?;
        Ok(assigned)
    }

    /// Flip a tag on a group. Returns true if the tag is now assigned.
    pub fn toggle_group_tag(&mut self, column: &str, group: &str, tag: &str) -> Result<bool, BoardError> {
        let col_idx = self.column_index(column)?;
        self.ensure_group(col_idx, group)?;
        let assigned = tag_ops::toggle_tag(&mut self.board, &group_key(column, group), tag)?;
        self.save_board()?;
        Ok(assigned)
    }

    pub fn item_tags(&self, column: &str, file: &str) -> Vec<String> {
        tag_ops::tags_for(&self.board, &item_key(column, file))
    }

    pub fn group_tags(&self, column: &str, group: &str) -> Vec<String> {
        tag_ops::tags_for(&self.board, &group_key(column, group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_tags_persist_across_reopen() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("A")).unwrap();
        fs::write(tmp.path().join("A/x.md"), "x").unwrap();
        let mut rec = Reconciler::open_unwatched(tmp.path()).unwrap();
        rec.create_tag("bug", Some("#E74C3C")).unwrap();
        rec.create_group("A", "G").unwrap();
        assert!(rec.toggle_item_tag("A", "x.md", "bug").unwrap());
        assert!(rec.toggle_group_tag("A", "G", "bug").unwrap());
        assert_eq!(rec.rename_tag("bug", "defect").unwrap(), "defect");

        let reopened = Reconciler::open_unwatched(tmp.path()).unwrap();
        assert_eq!(reopened.tag_definitions()[0].color, "#E74C3C");
        assert_eq!(reopened.item_tags("A", "x.md"), vec!["defect"]);
        assert_eq!(reopened.group_tags("A", "G"), vec!["defect"]);
    }

    #[test]
    fn test_toggle_requires_known_targets() {
        let tmp = TempDir::new().unwrap();
        let mut rec = Reconciler::open_unwatched(tmp.path()).unwrap();
        rec.create_tag("bug", None).unwrap();
        assert!(matches!(
            rec.toggle_item_tag("Done", "missing.md", "bug"),
            Err(BoardError::UnknownItem { .. })
        ));
        assert!(matches!(
            rec.toggle_group_tag("Done", "G", "bug"),
            Err(BoardError::UnknownGroup { .. })
        ));
        assert!(matches!(
            rec.set_tag_color("nope", "#000000"),
            Err(BoardError::Tag(_))
        ));

        rec.delete_tag("bug").unwrap();
        assert!(rec.tag_definitions().is_empty());
        assert!(rec.board().tags.is_none());
    }
}

pub mod board_io;
pub mod group_io;
pub mod item_io;
pub mod registry;
pub mod settings;
pub mod suppress;
pub mod watcher;

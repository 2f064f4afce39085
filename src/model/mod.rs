pub mod board;
pub mod column;
pub mod drag;
pub mod event;
pub mod group;
pub mod item;
pub mod tags;

pub use board::*;
pub use column::*;
pub use drag::*;
pub use event::*;
pub use group::*;
pub use item::*;
pub use tags::*;

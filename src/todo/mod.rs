pub mod schema;
pub mod store;

pub use schema::{Priority, TodoItem, TodoStatus, TodoSummary};
pub use store::TodoStore;

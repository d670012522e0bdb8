pub mod task;

pub use task::{TaskRow, TaskState};

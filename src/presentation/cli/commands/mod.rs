pub mod history;
pub mod project;
pub mod remote;

pub use history::*;
pub use project::*;
pub use remote::*;

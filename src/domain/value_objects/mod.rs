pub mod repo_type;

pub use repo_type::RepoType;

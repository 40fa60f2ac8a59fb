/// Presentation layer: the `repokit` command line
pub mod cli;

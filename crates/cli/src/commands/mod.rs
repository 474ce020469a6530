pub mod auto_repo_remove;
pub mod builder;
pub mod database;
pub mod schedule;
pub mod web;

pub mod backend;
pub mod dedup;
pub mod extract;
pub mod lines;
pub mod paragraph;
pub mod references;

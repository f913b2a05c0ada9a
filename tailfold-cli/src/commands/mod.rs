pub mod check;
pub mod common;
pub mod list;
pub mod run;
pub mod show;

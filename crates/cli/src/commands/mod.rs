//! CLI Commands

pub mod build_info;
pub mod doctor;
pub mod library;
pub mod list;
pub mod run;

pub mod compare;
pub mod init;
pub mod list_items;
pub mod report;
pub mod simulate;
pub mod validate;

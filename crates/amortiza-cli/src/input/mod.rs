pub mod file;
pub mod stdin;
pub mod tr_history;

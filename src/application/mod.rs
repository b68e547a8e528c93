pub mod bootstrap;
pub mod commands;
pub mod entries;
pub mod fallback;
pub mod history_loader;
pub mod session;
pub mod summary;

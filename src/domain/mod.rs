pub mod calendar;
pub mod day_key;
pub mod history;
pub mod models;
pub mod trigger;

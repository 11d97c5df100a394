pub mod bot;
pub mod meeting;
pub mod report;
pub mod settings;

pub mod story;
pub mod theme;

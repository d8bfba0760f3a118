pub mod api;
pub mod app;
pub mod audio;
pub mod library;
pub mod lyrics;
pub mod media;
pub mod model;
pub mod player;
pub mod store;
pub mod ui;

pub mod direction;
pub mod heading;
pub mod models;
pub mod navigation;
pub mod orientation;
pub mod photos;
pub mod settings;

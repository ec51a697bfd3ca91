pub mod camera;
pub mod compass;
pub mod gallery;
pub mod help;
pub mod settings;

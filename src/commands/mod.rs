pub mod dashboard;
pub mod editor;
pub mod goals;
pub mod settings;
pub mod workspace;

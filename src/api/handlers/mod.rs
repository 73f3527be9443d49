pub mod documentations;
pub mod forms;
pub mod health;
pub mod previews;
pub mod vehicles;

pub mod components;
pub mod helpers;

pub mod demo;
pub mod input;

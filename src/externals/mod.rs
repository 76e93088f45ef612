pub mod sensors;
pub mod web;

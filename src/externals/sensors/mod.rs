pub mod analog;
pub mod digital;
pub mod random;
pub mod services;

pub mod halfspace;
pub mod raw;

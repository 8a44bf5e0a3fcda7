pub mod signature;
pub mod upstream;

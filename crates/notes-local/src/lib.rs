// Local directory backend

pub mod filesystem;

pub use filesystem::LocalProvider;

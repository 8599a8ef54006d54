pub mod advisor;
pub mod bootstrap;
pub mod commands;
pub mod schulte;
pub mod timer;

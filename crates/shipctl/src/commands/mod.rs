pub mod completion;
pub mod config;
pub mod gate;
pub mod serve;

pub mod command;
pub mod unavailable;

pub use command::CommandDiffusion;
pub use unavailable::UnavailableDiffusion;

pub mod configured;
pub mod daemon;
pub mod foreground;

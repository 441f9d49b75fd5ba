pub mod chain;
pub mod clock;
pub mod config;
pub mod leg;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod sequencer;
pub mod sequences;

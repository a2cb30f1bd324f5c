#![deny(rust_2018_idioms)]
#![deny(clippy::correctness)]
#![deny(clippy::perf)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod emitter;
pub mod error;
pub mod generator;
pub mod party;
pub mod render;
pub mod sampler;
pub mod timestamp;
pub mod transaction;

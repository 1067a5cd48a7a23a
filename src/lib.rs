pub mod arena;
pub mod benchmark;
pub mod calibration;
pub mod pilot;
pub mod pursuit;
pub mod runner;
pub mod score;
pub mod sim;
pub mod targeting;
pub mod transport;
pub mod world;

mod common;
mod distribution;
mod ranking;

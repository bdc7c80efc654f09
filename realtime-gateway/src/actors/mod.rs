// realtime-gateway/src/actors/mod.rs

pub mod connection_actor;

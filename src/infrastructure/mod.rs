pub mod config;
pub mod cycles_state_repository;
pub mod error;
pub mod storage;

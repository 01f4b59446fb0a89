pub mod config_ops;
pub mod replay_ops;

// cmdrelay - command execution orchestration over local, ssh and ssm targets

pub mod backend;
pub mod chat;
pub mod config;
pub mod limits;
pub mod pager;
pub mod plan;
pub mod policy;
pub mod registry;
pub mod service;

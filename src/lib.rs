// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

mod otel;

pub mod asyncapi;
pub mod channel;
pub mod config;
pub mod consumer;
pub mod errors;
pub mod exchange;
pub mod kafka;
pub mod logging;
pub mod publisher;
pub mod queue;
pub mod topology;

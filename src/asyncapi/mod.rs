// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AsyncAPI Documents
//!
//! Document model for AsyncAPI 2.6 and 3.0, a registration builder, the
//! description of a broker configuration, and YAML/JSON export.
//!
//! ```no_run
//! use broker_asyncapi::{
//!     asyncapi::{build_v2_document, write_document},
//!     config::load_broker_config,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = load_broker_config("rabbitmq-config.yaml")?;
//! write_document(&build_v2_document(&cfg).into(), "asyncapispec/asyncapi.yaml")?;
//! # Ok(())
//! # }
//! ```

pub mod bindings;
pub mod broker;
pub mod builder;
pub mod export;
pub mod model;
pub mod schema;
pub mod v3;

pub use broker::{build_v2_document, build_v3_document, BrokerDocumentBuilder};
pub use builder::AsyncApiBuilder;
pub use export::{export_all, write_document, ExportFormat, ExportReport, ExportTarget};
pub use model::{AsyncApiDocument, Document};
pub use v3::V3Document;

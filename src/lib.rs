//! Prometheus exporter for W&T (Wiesemann & Theis) temperature sensors.
//!
//! Every Prometheus scrape triggers a live SNMPv1 walk of the target
//! device's sensor table; nothing is cached between scrapes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ HTTP scrape  │───>│   Walker     │───>│   Parser     │
//! │ (?target=..) │    │ (SNMPv1 GET  │    │ ("19,8" ->   │
//! │              │<───│  NEXT walk)  │    │   19.8)      │
//! └──────────────┘    └──────────────┘    └──────────────┘
//! ```
//!
//! # Usage
//!
//! Run the exporter binary with a configuration file:
//!
//! ```bash
//! wut-temperature-exporter --config config.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod http;
pub mod reading;
pub mod resolver;
pub mod walker;

pub use collector::{Collector, Registry, Sample, TemperatureCollector};
pub use config::ExporterConfig;
pub use http::HttpServer;
pub use resolver::TargetTable;
pub use walker::{LeafValue, RawLeaf, SnmpWalker, WalkError};

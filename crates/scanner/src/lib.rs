//! dockscan 스캐너 -- 이미지 취약점 스캔 파이프라인과 컨테이너 위험 분류 오케스트레이터
//!
//! # Module Structure
//!
//! - [`error`]: Stage-tagged failures (`ScanError`, `ScanStage`, `EngineError`)
//! - [`config`]: Scanner configuration (`ScannerConfig`, builder)
//! - [`engine`]: Container engine abstraction (`EngineClient` trait, `BollardEngineClient`)
//! - [`recipe`]: Scan recipe synthesis and tar build context
//! - [`pipeline`]: Image scan pipeline with guaranteed cleanup (`ImageScanner`)
//! - [`inspector`]: Container risk classification (`ContainerInspector`)
//! - [`report`]: Outcome consumers (`ReportSink`, `CollectingSink`)
//! - [`orchestrator`]: Fan-out and aggregation (`ScanOrchestrator`, builder)
//!
//! # Architecture
//!
//! ```text
//! targets --> ScanOrchestrator --spawn--> ImageScanner / ContainerInspector
//!                  |                              |
//!                  |                         EngineClient
//!                  |                              |
//!             result/failure mpsc <---------------+
//!                  |
//!             ReportSink
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod inspector;
pub mod orchestrator;
pub mod pipeline;
pub mod recipe;
pub mod report;

// --- Public API Re-exports ---

// Orchestrator
pub use orchestrator::{RunSummary, ScanOrchestrator, ScanOrchestratorBuilder};

// Configuration
pub use config::{ScannerConfig, ScannerConfigBuilder};

// Error
pub use error::{EngineError, ScanError, ScanStage};

// Engine API
pub use engine::{BollardEngineClient, BuildOptions, EngineClient, LogChunk, stdout_bytes};

// Pipeline
pub use pipeline::{ArtifactGuard, ImageScanOptions, ImageScanner, ScanToken, decode_agent_output};

// Recipe
pub use recipe::{ScanRecipe, build_context, unique_scan_tag};

// Inspector
pub use inspector::{ContainerInspector, classify, parse_host_binds};

// Report
pub use report::{CollectingSink, ReportSink};

//! dockscan 공통 크레이트
//!
//! 스캐너와 CLI가 공유하는 도메인 타입, 에러, 설정, 메트릭 이름을 정의합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ConfigError, DockscanError};

// 설정
pub use config::DockscanConfig;

// 도메인 타입
pub use types::{
    ContainerDescriptor, ContainerRuntimeConfig, ContainerScanResult, ImageScanResult,
    ScanFinding, ScanTarget, VulnerabilitySummary, short_id,
};

//! 스캔 결과 소비자
//!
//! 오케스트레이터의 두 소비자 태스크가 [`ReportSink`]를 호출합니다.
//! 결과는 대상 완료 순서대로 도착하므로, 정렬이 필요하면 렌더러가 직접 정렬해야 합니다.

use std::sync::Mutex;

use dockscan_core::types::ScanFinding;

use crate::error::ScanError;

/// 결과/실패 스트림 소비자
///
/// `on_result`와 `on_failure`는 서로 다른 태스크에서 동시에 호출될 수 있습니다.
/// 구현은 오래 블록하지 않아야 합니다.
pub trait ReportSink: Send + Sync + 'static {
    /// 성공 결과 하나를 받습니다.
    fn on_result(&self, finding: ScanFinding);

    /// 대상 실패 하나를 받습니다.
    fn on_failure(&self, error: ScanError);
}

/// 모든 결과와 실패를 메모리에 모으는 싱크
#[derive(Debug, Default)]
pub struct CollectingSink {
    findings: Mutex<Vec<ScanFinding>>,
    failures: Mutex<Vec<ScanError>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 받은 결과의 복사본 (도착 순서)
    pub fn findings(&self) -> Vec<ScanFinding> {
        self.findings
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// 받은 결과를 모두 꺼냅니다.
    pub fn take_findings(&self) -> Vec<ScanFinding> {
        std::mem::take(&mut *self.findings.lock().unwrap_or_else(|p| p.into_inner()))
    }

    /// 받은 실패를 모두 꺼냅니다.
    pub fn take_failures(&self) -> Vec<ScanError> {
        std::mem::take(&mut *self.failures.lock().unwrap_or_else(|p| p.into_inner()))
    }

    pub fn finding_count(&self) -> usize {
        self.findings
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .len()
    }
}

impl ReportSink for CollectingSink {
    fn on_result(&self, finding: ScanFinding) {
        self.findings
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(finding);
    }

    fn on_failure(&self, error: ScanError) {
        self.failures
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(error);
    }
}

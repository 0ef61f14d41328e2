//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않으면 모든 호출은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `dockscan_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use dockscan_core::metrics as m;
//!
//! metrics::counter!(m::SCAN_TARGETS_SUBMITTED_TOTAL, m::LABEL_TARGET_KIND => "image")
//!     .increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 대상 종류 레이블 키 (image, container)
pub const LABEL_TARGET_KIND: &str = "target_kind";

/// 결과 레이블 키 (success, failure, silent)
pub const LABEL_RESULT: &str = "result";

/// 파이프라인 단계 레이블 키 (pull, build, run, collect, ...)
pub const LABEL_STAGE: &str = "stage";

// ─── 레이블 값 상수 ────────────────────────────────────────────────

/// 스캔 성공
pub const RESULT_SUCCESS: &str = "success";

/// 스캔 실패
pub const RESULT_FAILURE: &str = "failure";

/// 위험 신호 없음 (결과를 내보내지 않음)
pub const RESULT_SILENT: &str = "silent";

// ─── Scanner 메트릭 ────────────────────────────────────────────────

/// 제출된 스캔 대상 수 (counter, label: target_kind)
pub const SCAN_TARGETS_SUBMITTED_TOTAL: &str = "dockscan_scan_targets_submitted_total";

/// 종료된 스캔 대상 수 (counter, labels: target_kind, result)
pub const SCAN_OUTCOMES_TOTAL: &str = "dockscan_scan_outcomes_total";

/// 단계별 스캔 실패 수 (counter, label: stage)
pub const SCAN_STAGE_FAILURES_TOTAL: &str = "dockscan_scan_stage_failures_total";

/// 임시 아티팩트 정리 실패 수 (counter)
pub const SCAN_CLEANUP_FAILURES_TOTAL: &str = "dockscan_scan_cleanup_failures_total";

/// 이미지 스캔 파이프라인 소요 시간 (histogram, 초)
pub const IMAGE_SCAN_DURATION_SECONDS: &str = "dockscan_image_scan_duration_seconds";

/// 현재 실행 중인 스캔 태스크 수 (gauge)
pub const SCAN_TASKS_IN_FLIGHT: &str = "dockscan_scan_tasks_in_flight";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 이미지 스캔 소요 시간 히스토그램 버킷 (초)
///
/// 1s ~ 1800s 범위 (pull + build + 에이전트 실행 포함)
pub const IMAGE_SCAN_DURATION_BUCKETS: [f64; 9] =
    [1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        SCAN_TARGETS_SUBMITTED_TOTAL,
        "Total number of scan targets submitted to the orchestrator"
    );
    describe_counter!(
        SCAN_OUTCOMES_TOTAL,
        "Total number of terminal scan outcomes by target kind and result"
    );
    describe_counter!(
        SCAN_STAGE_FAILURES_TOTAL,
        "Total number of scan failures by pipeline stage"
    );
    describe_counter!(
        SCAN_CLEANUP_FAILURES_TOTAL,
        "Total number of best-effort cleanup failures for ephemeral scan artifacts"
    );
    describe_histogram!(
        IMAGE_SCAN_DURATION_SECONDS,
        "Time to complete a single image scan pipeline in seconds"
    );
    describe_gauge!(
        SCAN_TASKS_IN_FLIGHT,
        "Number of scan tasks currently holding an engine slot"
    );
}

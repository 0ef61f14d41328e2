//! 도메인 타입 -- 스캔 대상과 스캔 결과
//!
//! 오케스트레이터, 파이프라인, 리포트가 공유하는 데이터 구조를 정의합니다.
//! 모든 결과 타입은 생성 후 변경되지 않으며, 결과 채널을 읽는 소비자가 소유합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 화면 표시용 컨테이너 ID 길이
pub const SHORT_ID_LEN: usize = 12;

/// 엔진 ID를 표시용 길이로 자릅니다.
///
/// 12자보다 짧은 ID는 그대로 반환합니다.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// 엔진이 나열한 컨테이너 한 개
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    /// 엔진이 부여한 컨테이너 ID (전체 길이)
    pub id: String,
    /// 컨테이너가 선언한 이미지 참조
    pub image: String,
}

impl ContainerDescriptor {
    /// 새 컨테이너 디스크립터를 생성합니다.
    pub fn new(id: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image: image.into(),
        }
    }
}

impl fmt::Display for ContainerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} image={}", short_id(&self.id), self.image)
    }
}

/// 스캔 대상
///
/// 호출자가 열거하여 넘기며, 코어에서는 읽기 전용입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanTarget {
    /// 이미지 참조 (name:tag)
    Image(String),
    /// 실행 중(또는 정지된) 컨테이너
    Container(ContainerDescriptor),
}

impl ScanTarget {
    /// 로그와 에러 메시지에 쓰는 대상 식별자를 반환합니다.
    pub fn label(&self) -> &str {
        match self {
            Self::Image(reference) => reference,
            Self::Container(c) => &c.id,
        }
    }

    /// 메트릭 태그용 고정된 대상 종류명을 반환합니다.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::Container(_) => "container",
        }
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(reference) => write!(f, "image {reference}"),
            Self::Container(c) => write!(f, "container {c}"),
        }
    }
}

/// 컨테이너 런타임 설정 중 위험 분류에 필요한 부분
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRuntimeConfig {
    /// privileged 모드
    pub privileged: bool,
    /// 추가된 capability 목록 (엔진이 보고한 순서)
    pub cap_add: Vec<String>,
    /// bind 마운트 명세 (`source:destination[:mode]`)
    pub binds: Vec<String>,
    /// 모든 포트 공개 (`-P`)
    pub publish_all_ports: bool,
    /// 실행 상태
    pub running: bool,
}

/// 스캐닝 에이전트가 보고하는 취약점 요약
///
/// 에이전트가 생략한 필드는 0으로 채웁니다.
/// `total`과 심각도별 합계 사이의 관계는 에이전트가 정의하며 여기서 검증하지 않습니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VulnerabilitySummary {
    pub total: u64,
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub negligible: u64,
    pub sensitive: u64,
    pub malware: u64,
}

/// 이미지 스캔 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageScanResult {
    /// 스캔을 요청한 이미지 참조
    #[serde(rename = "Image")]
    pub image: String,
    /// 취약점 요약
    #[serde(rename = "vulnerability_summary")]
    pub summary: VulnerabilitySummary,
}

/// 컨테이너 위험 분류 결과
///
/// 위험 신호가 하나 이상 감지된 컨테이너에 대해서만 생성됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerScanResult {
    /// 12자로 자른 컨테이너 ID
    pub id: String,
    /// 이미지 참조
    pub image: String,
    pub running: bool,
    pub privileged: bool,
    pub publish_all_ports: bool,
    /// 절대 경로 호스트 bind 소스 (명세 순서 유지)
    pub host_mounts: Vec<String>,
    /// 추가된 capability (엔진이 보고한 그대로)
    pub cap_add: Vec<String>,
}

/// 결과 채널로 전달되는 단일 스캔 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanFinding {
    /// 이미지 취약점 스캔 결과
    Image(ImageScanResult),
    /// 컨테이너 위험 분류 결과
    Container(ContainerScanResult),
}

impl ScanFinding {
    /// 결과 행의 ID 컬럼 값 (이미지 참조 또는 짧은 컨테이너 ID)
    pub fn id(&self) -> &str {
        match self {
            Self::Image(r) => &r.image,
            Self::Container(r) => &r.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_truncates_long_ids() {
        let id = "4f3c2b1a0e9d8c7b6a5f4e3d2c1b0a99";
        assert_eq!(short_id(id), "4f3c2b1a0e9d");
    }

    #[test]
    fn short_id_keeps_short_ids() {
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id(""), "");
    }

    #[test]
    fn scan_target_label_and_kind() {
        let image = ScanTarget::Image("alpine:3.19".to_owned());
        assert_eq!(image.label(), "alpine:3.19");
        assert_eq!(image.kind_name(), "image");

        let container = ScanTarget::Container(ContainerDescriptor::new("abc123", "nginx"));
        assert_eq!(container.label(), "abc123");
        assert_eq!(container.kind_name(), "container");
        assert!(container.to_string().contains("nginx"));
    }

    #[test]
    fn image_result_uses_agent_keys() {
        let json = r#"{"Image":"alpine:3.19","vulnerability_summary":{"total":5,"low":1,"medium":2,"high":2,"negligible":0,"sensitive":0,"malware":0}}"#;
        let parsed: ImageScanResult = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.image, "alpine:3.19");
        assert_eq!(parsed.summary.total, 5);
        assert_eq!(parsed.summary.high, 2);

        let value = serde_json::to_value(&parsed).unwrap();
        assert_eq!(value["Image"], "alpine:3.19");
        assert_eq!(value["vulnerability_summary"]["medium"], 2);
    }

    #[test]
    fn summary_missing_fields_default_to_zero() {
        let parsed: VulnerabilitySummary = serde_json::from_str(r#"{"total":3}"#).unwrap();
        assert_eq!(parsed.total, 3);
        assert_eq!(parsed.malware, 0);
        assert_eq!(parsed.negligible, 0);
    }

    #[test]
    fn finding_id_matches_row_key() {
        let finding = ScanFinding::Container(ContainerScanResult {
            id: "abc123def456".to_owned(),
            image: "nginx".to_owned(),
            running: true,
            privileged: true,
            publish_all_ports: false,
            host_mounts: Vec::new(),
            cap_add: Vec::new(),
        });
        assert_eq!(finding.id(), "abc123def456");
    }
}

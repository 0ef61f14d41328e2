//! 컨테이너 위험 분류
//!
//! [`ContainerInspector`]는 컨테이너의 런타임 설정을 조회하고 위험 신호를 분류합니다.
//!
//! | 신호 | 발견으로 간주 |
//! |------|---------------|
//! | privileged | O |
//! | cap_add 비어 있지 않음 | O |
//! | publish_all_ports | O |
//! | 절대 경로 호스트 bind | X (다른 신호가 있을 때 결과에 첨부만 됨) |
//!
//! 신호가 하나도 없으면 결과도 에러도 내지 않습니다.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use dockscan_core::metrics as m;
use dockscan_core::types::{
    ContainerDescriptor, ContainerRuntimeConfig, ContainerScanResult, short_id,
};

use crate::config::ScannerConfig;
use crate::engine::EngineClient;
use crate::error::{ScanError, ScanStage};
use crate::pipeline::StageLimits;

/// bind 명세에서 절대 경로 호스트 소스만 골라냅니다.
///
/// `source:destination` 형태(정확히 두 부분)만 대상으로 하며,
/// 모드가 붙은 명세나 상대 경로/named volume은 조용히 건너뜁니다.
pub fn parse_host_binds(binds: &[String]) -> Vec<String> {
    binds
        .iter()
        .filter_map(|bind| {
            let mut parts = bind.split(':');
            let source = parts.next()?;
            let _destination = parts.next()?;
            if parts.next().is_some() {
                return None;
            }
            source.starts_with('/').then(|| source.to_owned())
        })
        .collect()
}

/// 런타임 설정에서 위험 신호를 분류합니다.
///
/// 모든 신호를 평가하되, 결과는 privileged/cap_add/publish_all_ports 중
/// 하나라도 있을 때만 만들어집니다.
pub fn classify(
    container: &ContainerDescriptor,
    runtime: &ContainerRuntimeConfig,
) -> Option<ContainerScanResult> {
    let mut triggered = false;

    if runtime.privileged {
        triggered = true;
    }
    if !runtime.cap_add.is_empty() {
        triggered = true;
    }
    let host_mounts = parse_host_binds(&runtime.binds);
    if runtime.publish_all_ports {
        triggered = true;
    }

    if !triggered {
        return None;
    }

    Some(ContainerScanResult {
        id: short_id(&container.id).to_owned(),
        image: container.image.clone(),
        running: runtime.running,
        privileged: runtime.privileged,
        publish_all_ports: runtime.publish_all_ports,
        host_mounts,
        cap_add: runtime.cap_add.clone(),
    })
}

/// 컨테이너 위험 분류기
pub struct ContainerInspector<E: EngineClient> {
    engine: Arc<E>,
    config: Arc<ScannerConfig>,
    cancel: CancellationToken,
}

impl<E: EngineClient> Clone for ContainerInspector<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            config: Arc::clone(&self.config),
            cancel: self.cancel.clone(),
        }
    }
}

impl<E: EngineClient> ContainerInspector<E> {
    pub fn new(engine: Arc<E>, config: Arc<ScannerConfig>, cancel: CancellationToken) -> Self {
        Self {
            engine,
            config,
            cancel,
        }
    }

    /// 컨테이너를 조회하고 분류합니다.
    ///
    /// 위험 신호가 없으면 `Ok(None)`입니다. 조회 실패 시 부분 결과 없이 에러를 반환합니다.
    pub async fn scan_container(
        &self,
        container: &ContainerDescriptor,
    ) -> Result<Option<ContainerScanResult>, ScanError> {
        let limits = StageLimits::start(&self.cancel, self.config.target_timeout());
        let engine = self.engine.as_ref();

        let runtime = limits
            .run(&container.id, ScanStage::Inspect, async {
                engine
                    .inspect_container(&container.id)
                    .await
                    .map_err(|e| ScanError::Inspect {
                        container_id: container.id.clone(),
                        reason: e.to_string(),
                    })
            })
            .await
            .inspect_err(|e| {
                warn!(container_id = %short_id(&container.id), error = %e, "container inspect failed");
                metrics::counter!(m::SCAN_STAGE_FAILURES_TOTAL, m::LABEL_STAGE => e.stage().as_str())
                    .increment(1);
            })?;

        let finding = classify(container, &runtime);
        match &finding {
            Some(result) => debug!(
                container_id = %result.id,
                privileged = result.privileged,
                cap_add = result.cap_add.len(),
                publish_all_ports = result.publish_all_ports,
                host_mounts = result.host_mounts.len(),
                "risk signals detected"
            ),
            None => debug!(container_id = %short_id(&container.id), "no risk signals"),
        }
        Ok(finding)
    }
}

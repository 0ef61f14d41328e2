//! 스캔 오케스트레이터 -- 대상별 팬아웃, 결과/실패 수집, 완료 대기
//!
//! # 내부 아키텍처
//! ```text
//!                       ┌─> task(target 1) ─┐
//! targets ──> run() ────┼─> task(target 2) ─┼──result──> consumer ──> ReportSink::on_result
//!                       └─> task(target N) ─┴──failure─> consumer ──> ReportSink::on_failure
//!                                 │
//!                     JoinHandle 전체 대기 (wait-group)
//! ```
//!
//! 소비자 태스크는 생산자보다 먼저 시작됩니다. 모든 태스크 핸들을 기다린 뒤
//! 채널을 닫고 소비자를 기다리므로, `run`이 반환될 때 싱크는 모든 결과를 받은 상태입니다.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use dockscan_core::metrics as m;
use dockscan_core::types::{ScanFinding, ScanTarget};

use crate::config::ScannerConfig;
use crate::engine::EngineClient;
use crate::error::{ScanError, ScanStage};
use crate::inspector::ContainerInspector;
use crate::pipeline::{ImageScanOptions, ImageScanner};
use crate::report::ReportSink;

/// 결과/실패 채널 용량
const OUTCOME_CHANNEL_CAPACITY: usize = 64;

/// 한 번의 실행 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// 제출된 대상 수
    pub submitted: usize,
    /// 결과를 낸 대상 수
    pub succeeded: usize,
    /// 실패한 대상 수
    pub failed: usize,
    /// 위험 신호가 없어 아무것도 내지 않은 컨테이너 수
    pub silent: usize,
}

impl RunSummary {
    /// 실패한 대상이 있는지 여부
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// 대상 하나의 종료 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskOutcome {
    Succeeded,
    Failed,
    Silent,
}

impl TaskOutcome {
    fn label(self) -> &'static str {
        match self {
            Self::Succeeded => m::RESULT_SUCCESS,
            Self::Failed => m::RESULT_FAILURE,
            Self::Silent => m::RESULT_SILENT,
        }
    }
}

/// 스캔 오케스트레이터
///
/// # 사용 예시
/// ```ignore
/// use std::sync::Arc;
/// use dockscan_scanner::{BollardEngineClient, CollectingSink, ScanOrchestratorBuilder};
///
/// let engine = Arc::new(BollardEngineClient::connect_local()?);
/// let orchestrator = ScanOrchestratorBuilder::new()
///     .config(config)
///     .engine(engine)
///     .build()?;
///
/// let sink = Arc::new(CollectingSink::new());
/// let summary = orchestrator.scan_containers(Arc::clone(&sink)).await?;
/// ```
pub struct ScanOrchestrator<E: EngineClient> {
    config: Arc<ScannerConfig>,
    engine: Arc<E>,
    images: ImageScanner<E>,
    inspector: ContainerInspector<E>,
    /// `max_concurrency > 0`일 때 엔진을 동시에 사용하는 태스크 수 제한
    limiter: Option<Arc<Semaphore>>,
    cancel: CancellationToken,
}

impl<E: EngineClient> ScanOrchestrator<E> {
    /// 공유 취소 토큰을 반환합니다.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 진행 중인 모든 파이프라인을 취소합니다.
    ///
    /// 이미 만든 임시 아티팩트는 각 파이프라인이 정리한 뒤 종료합니다.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// 엔진 연결을 확인합니다.
    pub async fn check_engine(&self) -> Result<(), ScanError> {
        self.engine
            .ping()
            .await
            .map_err(|e| ScanError::Engine(e.to_string()))
    }

    /// 이미지 목록을 스캔합니다.
    pub async fn scan_images<S: ReportSink>(
        &self,
        images: Vec<String>,
        options: ImageScanOptions,
        sink: Arc<S>,
    ) -> RunSummary {
        let targets = images.into_iter().map(ScanTarget::Image).collect();
        self.run(targets, options, sink).await
    }

    /// 호스트의 모든 컨테이너(정지된 것 포함)를 나열하고 위험 분류합니다.
    pub async fn scan_containers<S: ReportSink>(&self, sink: Arc<S>) -> Result<RunSummary, ScanError> {
        let containers = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(ScanError::Cancelled {
                    target: "container list".to_owned(),
                    stage: ScanStage::Engine,
                });
            }
            listed = self.engine.list_containers(true) => {
                listed.map_err(|e| ScanError::Engine(e.to_string()))?
            }
        };
        debug!(count = containers.len(), "containers listed");

        let targets = containers.into_iter().map(ScanTarget::Container).collect();
        Ok(self.run(targets, ImageScanOptions::default(), sink).await)
    }

    /// 대상마다 태스크 하나를 띄우고 모두 끝날 때까지 기다립니다.
    ///
    /// 대상 하나의 실패는 다른 대상에 영향을 주지 않습니다. 결과 순서는
    /// 완료 순서이며 제출 순서와 무관합니다.
    pub async fn run<S: ReportSink>(
        &self,
        targets: Vec<ScanTarget>,
        options: ImageScanOptions,
        sink: Arc<S>,
    ) -> RunSummary {
        let mut summary = RunSummary {
            submitted: targets.len(),
            ..Default::default()
        };
        info!(
            targets = targets.len(),
            max_concurrency = self.config.max_concurrency,
            "starting scan run"
        );

        // 소비자를 먼저 띄워 생산자가 막히지 않게 합니다.
        let (result_tx, mut result_rx) = mpsc::channel::<ScanFinding>(OUTCOME_CHANNEL_CAPACITY);
        let (failure_tx, mut failure_rx) = mpsc::channel::<ScanError>(OUTCOME_CHANNEL_CAPACITY);

        let result_sink = Arc::clone(&sink);
        let result_consumer = tokio::spawn(async move {
            while let Some(finding) = result_rx.recv().await {
                result_sink.on_result(finding);
            }
        });
        let failure_sink = Arc::clone(&sink);
        let failure_consumer = tokio::spawn(async move {
            while let Some(failure) = failure_rx.recv().await {
                failure_sink.on_failure(failure);
            }
        });

        let options = Arc::new(options);
        let mut tasks: Vec<(String, &'static str, JoinHandle<TaskOutcome>)> =
            Vec::with_capacity(targets.len());

        for target in targets {
            let label = target.label().to_owned();
            let kind = target.kind_name();
            metrics::counter!(m::SCAN_TARGETS_SUBMITTED_TOTAL, m::LABEL_TARGET_KIND => kind)
                .increment(1);

            let handle = tokio::spawn(scan_target(
                target,
                self.images.clone(),
                self.inspector.clone(),
                Arc::clone(&options),
                self.limiter.clone(),
                self.cancel.clone(),
                result_tx.clone(),
                failure_tx.clone(),
            ));
            tasks.push((label, kind, handle));
        }

        // wait-group: 모든 대상 태스크의 종료를 기다립니다.
        for (label, kind, handle) in tasks {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    error!(scan_target = %label, error = %join_err, "scan task terminated abnormally");
                    let failure = ScanError::TaskPanicked {
                        target: label,
                        reason: join_err.to_string(),
                    };
                    if failure_tx.send(failure).await.is_err() {
                        error!("failure consumer stopped, dropping failure");
                    }
                    TaskOutcome::Failed
                }
            };
            metrics::counter!(
                m::SCAN_OUTCOMES_TOTAL,
                m::LABEL_TARGET_KIND => kind,
                m::LABEL_RESULT => outcome.label()
            )
            .increment(1);
            match outcome {
                TaskOutcome::Succeeded => summary.succeeded += 1,
                TaskOutcome::Failed => summary.failed += 1,
                TaskOutcome::Silent => summary.silent += 1,
            }
        }

        drop(result_tx);
        drop(failure_tx);
        if let Err(e) = result_consumer.await {
            error!(error = %e, "result consumer terminated abnormally");
        }
        if let Err(e) = failure_consumer.await {
            error!(error = %e, "failure consumer terminated abnormally");
        }

        info!(
            submitted = summary.submitted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            silent = summary.silent,
            "scan run finished"
        );
        summary
    }
}

/// 대상 하나를 스캔하고 결과 또는 실패를 정확히 한 번 보냅니다 (조용한 컨테이너 제외).
#[allow(clippy::too_many_arguments)]
async fn scan_target<E: EngineClient>(
    target: ScanTarget,
    images: ImageScanner<E>,
    inspector: ContainerInspector<E>,
    options: Arc<ImageScanOptions>,
    limiter: Option<Arc<Semaphore>>,
    cancel: CancellationToken,
    result_tx: mpsc::Sender<ScanFinding>,
    failure_tx: mpsc::Sender<ScanError>,
) -> TaskOutcome {
    let _permit = match limiter {
        Some(semaphore) => {
            let acquired = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.acquire_owned() => permit.ok(),
            };
            match acquired {
                Some(permit) => Some(permit),
                None => {
                    let failure = ScanError::Cancelled {
                        target: target.label().to_owned(),
                        stage: ScanStage::Schedule,
                    };
                    send_failure(&failure_tx, failure).await;
                    return TaskOutcome::Failed;
                }
            }
        }
        None => None,
    };

    metrics::gauge!(m::SCAN_TASKS_IN_FLIGHT).increment(1.0);
    let outcome = match &target {
        ScanTarget::Image(image) => match images.scan_image(image, &options).await {
            Ok(result) => Ok(Some(ScanFinding::Image(result))),
            Err(e) => Err(e),
        },
        ScanTarget::Container(container) => inspector
            .scan_container(container)
            .await
            .map(|finding| finding.map(ScanFinding::Container)),
    };
    metrics::gauge!(m::SCAN_TASKS_IN_FLIGHT).decrement(1.0);

    match outcome {
        Ok(Some(finding)) => {
            if result_tx.send(finding).await.is_err() {
                warn!(scan_target = %target, "result consumer stopped, dropping result");
            }
            TaskOutcome::Succeeded
        }
        Ok(None) => TaskOutcome::Silent,
        Err(e) => {
            send_failure(&failure_tx, e).await;
            TaskOutcome::Failed
        }
    }
}

async fn send_failure(failure_tx: &mpsc::Sender<ScanError>, failure: ScanError) {
    if let Err(mpsc::error::SendError(failure)) = failure_tx.send(failure).await {
        warn!(error = %failure, "failure consumer stopped, dropping failure");
    }
}

/// 스캔 오케스트레이터 빌더
pub struct ScanOrchestratorBuilder<E: EngineClient> {
    config: ScannerConfig,
    engine: Option<Arc<E>>,
    cancel: Option<CancellationToken>,
}

impl<E: EngineClient> ScanOrchestratorBuilder<E> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ScannerConfig::default(),
            engine: None,
            cancel: None,
        }
    }

    /// 스캐너 설정을 지정합니다.
    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    /// 엔진 클라이언트를 지정합니다.
    pub fn engine(mut self, engine: Arc<E>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// 외부에서 만든 취소 토큰을 공유합니다 (예: Ctrl-C 처리기).
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// 오케스트레이터를 빌드합니다.
    ///
    /// # Errors
    ///
    /// 설정이 유효하지 않거나 엔진 클라이언트가 지정되지 않은 경우
    pub fn build(self) -> Result<ScanOrchestrator<E>, ScanError> {
        self.config.validate()?;

        let engine = self.engine.ok_or_else(|| ScanError::Config {
            field: "engine".to_owned(),
            reason: "engine client must be provided".to_owned(),
        })?;
        let cancel = self.cancel.unwrap_or_default();
        let config = Arc::new(self.config);

        let limiter = match config.max_concurrency {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        Ok(ScanOrchestrator {
            images: ImageScanner::new(Arc::clone(&engine), Arc::clone(&config), cancel.clone()),
            inspector: ContainerInspector::new(
                Arc::clone(&engine),
                Arc::clone(&config),
                cancel.clone(),
            ),
            config,
            engine,
            limiter,
            cancel,
        })
    }
}

impl<E: EngineClient> Default for ScanOrchestratorBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

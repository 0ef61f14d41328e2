//! 이미지 스캔 파이프라인
//!
//! [`ImageScanner`]는 이미지 하나에 대해 다음 단계를 순서대로 수행합니다.
//!
//! ```text
//! Pull -> Recipe -> Context -> Build -> Run -> Collect
//!                                 \       \        \
//!                                  +-------+--------+--> Cleanup (항상)
//! ```
//!
//! 빌드 이미지 태그와 스캔 컨테이너 이름(빌드 태그와 같음)은 요청하기 전에
//! [`ArtifactGuard`]에 기록되고, 어떤 경로로 종료하든 정리됩니다. 정리 실패는 로그로만 남고
//! 주 결과를 덮어쓰지 않습니다.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dockscan_core::metrics as m;
use dockscan_core::types::{ImageScanResult, VulnerabilitySummary, short_id};

use crate::config::ScannerConfig;
use crate::engine::{EngineClient, stdout_bytes};
use crate::error::{EngineError, ScanError, ScanStage};
use crate::recipe::{ScanRecipe, build_context, unique_scan_tag};

/// 스캐닝 에이전트 인증 토큰
///
/// `Debug`/`Display` 출력에서 값이 가려집니다.
/// 파이프라인 호출 동안에만 보유하며 공유 설정에 저장하지 않습니다.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ScanToken(String);

impl ScanToken {
    /// 토큰을 감쌉니다.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// 빌드 인자로 넘길 실제 값을 반환합니다.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ScanToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ScanToken(<redacted>)")
    }
}

impl fmt::Display for ScanToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// 이미지 스캔 호출 옵션
#[derive(Debug, Clone, Default)]
pub struct ImageScanOptions {
    /// 에이전트 인증 토큰
    pub token: ScanToken,
    /// 대상 이미지 pull 생략
    pub skip_pull: bool,
}

impl ImageScanOptions {
    pub fn new(token: ScanToken, skip_pull: bool) -> Self {
        Self { token, skip_pull }
    }
}

/// 단계 실행 제한 -- 공유 취소 토큰과 대상별 마감 시간
#[derive(Debug, Clone)]
pub(crate) struct StageLimits {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    timeout_secs: u64,
}

impl StageLimits {
    /// 지금부터 `timeout`이 지나면 만료되는 제한을 만듭니다.
    pub(crate) fn start(cancel: &CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            cancel: cancel.clone(),
            deadline: timeout.map(|t| Instant::now() + t),
            timeout_secs: timeout.map_or(0, |t| t.as_secs()),
        }
    }

    /// 단계 future를 취소/마감과 경쟁시킵니다.
    ///
    /// 취소나 마감이 먼저 오면 future는 drop되고 해당 단계로 태그된 에러를 반환합니다.
    pub(crate) async fn run<T, F>(&self, target: &str, stage: ScanStage, fut: F) -> Result<T, ScanError>
    where
        F: Future<Output = Result<T, ScanError>>,
    {
        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ScanError::Cancelled {
                target: target.to_owned(),
                stage,
            }),
            _ = expired => Err(ScanError::TimedOut {
                target: target.to_owned(),
                stage,
                timeout_secs: self.timeout_secs,
            }),
            result = fut => result,
        }
    }
}

/// 한 번의 파이프라인 호출이 만든 임시 이미지와 컨테이너
///
/// [`release`](Self::release)는 컨테이너, 이미지 순으로 제거하며 두 번째 호출부터는
/// 아무것도 하지 않습니다. 아티팩트를 쥔 채 drop되면 (태스크 abort 등)
/// 현재 런타임에 정리 태스크를 띄웁니다.
pub struct ArtifactGuard<E: EngineClient> {
    engine: Arc<E>,
    container_id: Option<String>,
    image_tag: Option<String>,
}

impl<E: EngineClient> ArtifactGuard<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            engine,
            container_id: None,
            image_tag: None,
        }
    }

    /// 빌드를 요청하기 전에 태그를 기록합니다.
    pub fn track_image(&mut self, tag: impl Into<String>) {
        self.image_tag = Some(tag.into());
    }

    /// 스캔 컨테이너를 기록합니다 (ID 또는 이름).
    ///
    /// 생성 요청 전에 이름으로 기록해야 응답을 받기 전에 취소되어도 제거할 수 있습니다.
    pub fn track_container(&mut self, id: impl Into<String>) {
        self.container_id = Some(id.into());
    }

    pub fn is_empty(&self) -> bool {
        self.container_id.is_none() && self.image_tag.is_none()
    }

    /// 기록된 아티팩트를 best-effort로 제거합니다.
    ///
    /// 정리에 실패한 아티팩트 수를 반환합니다. 이미 없는 아티팩트는 실패로 치지 않습니다.
    pub async fn release(&mut self) -> usize {
        let container = self.container_id.take();
        let image = self.image_tag.take();
        remove_artifacts(self.engine.as_ref(), container, image).await
    }
}

impl<E: EngineClient> Drop for ArtifactGuard<E> {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }
        let container = self.container_id.take();
        let image = self.image_tag.take();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let engine = Arc::clone(&self.engine);
                handle.spawn(async move {
                    remove_artifacts(engine.as_ref(), container, image).await;
                });
            }
            Err(_) => {
                warn!(
                    container_id = ?container,
                    tag = ?image,
                    "no runtime available, scan artifacts were not removed"
                );
                metrics::counter!(m::SCAN_CLEANUP_FAILURES_TOTAL).increment(1);
            }
        }
    }
}

async fn remove_artifacts<E: EngineClient>(
    engine: &E,
    container: Option<String>,
    image: Option<String>,
) -> usize {
    let mut failures = 0;

    if let Some(id) = container {
        match engine.remove_container(&id).await {
            Ok(()) => debug!(container = %id, "removed scan container"),
            Err(EngineError::NotFound(_)) => {
                debug!(container = %id, "scan container already gone");
            }
            Err(e) => {
                failures += 1;
                let err = ScanError::Cleanup {
                    resource: format!("scan container {id}"),
                    reason: e.to_string(),
                };
                warn!(error = %err, "cleanup failed");
            }
        }
    }

    if let Some(tag) = image {
        match engine.remove_image(&tag).await {
            Ok(()) => debug!(tag = %tag, "removed scan image"),
            Err(EngineError::NotFound(_)) => debug!(tag = %tag, "scan image already gone"),
            Err(e) => {
                failures += 1;
                let err = ScanError::Cleanup {
                    resource: format!("scan image {tag}"),
                    reason: e.to_string(),
                };
                warn!(error = %err, "cleanup failed");
            }
        }
    }

    if failures > 0 {
        metrics::counter!(m::SCAN_CLEANUP_FAILURES_TOTAL).increment(failures as u64);
    }
    failures
}

#[derive(Deserialize)]
struct AgentReport {
    #[serde(default)]
    vulnerability_summary: VulnerabilitySummary,
}

/// 에이전트 stdout에서 첫 번째 JSON 값을 디코딩합니다.
///
/// 결과는 에이전트가 보고한 이름이 아니라 요청한 이미지 참조로 키가 붙습니다.
/// 출력이 비었거나 JSON이 깨졌으면 에러입니다. 생략된 요약 필드는 0입니다.
pub fn decode_agent_output(image: &str, stdout: &[u8]) -> Result<ImageScanResult, String> {
    let report = serde_json::Deserializer::from_slice(stdout)
        .into_iter::<AgentReport>()
        .next()
        .ok_or_else(|| "scan container produced no output".to_owned())?
        .map_err(|e| format!("malformed scan output: {e}"))?;

    Ok(ImageScanResult {
        image: image.to_owned(),
        summary: report.vulnerability_summary,
    })
}

fn build_failure(image: &str, err: EngineError) -> ScanError {
    match err {
        EngineError::Build { reason, log } => ScanError::Build {
            image: image.to_owned(),
            reason,
            build_log: log,
        },
        other => ScanError::Build {
            image: image.to_owned(),
            reason: other.to_string(),
            build_log: String::new(),
        },
    }
}

/// 이미지 하나를 스캔하는 파이프라인
pub struct ImageScanner<E: EngineClient> {
    engine: Arc<E>,
    config: Arc<ScannerConfig>,
    cancel: CancellationToken,
}

impl<E: EngineClient> Clone for ImageScanner<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            config: Arc::clone(&self.config),
            cancel: self.cancel.clone(),
        }
    }
}

impl<E: EngineClient> ImageScanner<E> {
    /// 새 파이프라인을 생성합니다.
    pub fn new(engine: Arc<E>, config: Arc<ScannerConfig>, cancel: CancellationToken) -> Self {
        Self {
            engine,
            config,
            cancel,
        }
    }

    /// 이미지를 스캔합니다.
    ///
    /// 성공하면 결과 하나를, 실패하면 단계로 태그된 에러 하나를 반환합니다.
    /// 어느 쪽이든 반환 전에 임시 아티팩트 정리를 시도합니다.
    pub async fn scan_image(
        &self,
        image: &str,
        options: &ImageScanOptions,
    ) -> Result<ImageScanResult, ScanError> {
        let started = Instant::now();
        let mut guard = ArtifactGuard::new(Arc::clone(&self.engine));

        let outcome = self.run_stages(image, options, &mut guard).await;
        guard.release().await;

        let result_label = match &outcome {
            Ok(result) => {
                info!(
                    image = image,
                    total = result.summary.total,
                    high = result.summary.high,
                    "image scan completed"
                );
                m::RESULT_SUCCESS
            }
            Err(e) => {
                warn!(image = image, stage = %e.stage(), error = %e, "image scan failed");
                metrics::counter!(m::SCAN_STAGE_FAILURES_TOTAL, m::LABEL_STAGE => e.stage().as_str())
                    .increment(1);
                m::RESULT_FAILURE
            }
        };
        metrics::histogram!(m::IMAGE_SCAN_DURATION_SECONDS, m::LABEL_RESULT => result_label)
            .record(started.elapsed().as_secs_f64());

        outcome
    }

    async fn run_stages(
        &self,
        image: &str,
        options: &ImageScanOptions,
        guard: &mut ArtifactGuard<E>,
    ) -> Result<ImageScanResult, ScanError> {
        let limits = StageLimits::start(&self.cancel, self.config.target_timeout());
        let engine = self.engine.as_ref();

        if options.skip_pull || !self.config.pull {
            debug!(image = image, "skipping pull");
        } else {
            debug!(image = image, "pulling image");
            limits
                .run(image, ScanStage::Pull, async {
                    engine.pull_image(image).await.map_err(|e| ScanError::Pull {
                        image: image.to_owned(),
                        reason: e.to_string(),
                    })
                })
                .await?;
        }

        let tag = unique_scan_tag(&self.config.tag_prefix);
        let recipe = ScanRecipe::new(image, &self.config.scanner_image, &tag).map_err(|reason| {
            ScanError::Recipe {
                image: image.to_owned(),
                reason,
            }
        })?;

        let context = build_context(&recipe).map_err(|e| ScanError::Context {
            image: image.to_owned(),
            reason: e.to_string(),
        })?;

        let build_options = recipe.build_options(options.token.expose(), self.config.pull_parent);
        guard.track_image(tag.as_str());
        debug!(image = image, tag = %tag, "building scan image");
        limits
            .run(image, ScanStage::Build, async {
                engine
                    .build_image(context, &build_options)
                    .await
                    .map_err(|e| build_failure(image, e))
            })
            .await?;

        let run_failure = |e: EngineError| ScanError::Run {
            image: image.to_owned(),
            reason: e.to_string(),
        };

        // 컨테이너 이름은 빌드 태그를 그대로 사용합니다.
        guard.track_container(tag.as_str());
        let container_id = limits
            .run(image, ScanStage::Run, async {
                engine.create_container(&tag, &tag).await.map_err(run_failure)
            })
            .await?;
        debug!(image = image, container_id = %short_id(&container_id), "starting scan container");

        limits
            .run(image, ScanStage::Run, async {
                engine.start_container(&container_id).await.map_err(run_failure)
            })
            .await?;

        let chunks = limits
            .run(image, ScanStage::Collect, async {
                engine
                    .container_logs(&container_id)
                    .await
                    .map_err(|e| ScanError::Collect {
                        image: image.to_owned(),
                        reason: e.to_string(),
                    })
            })
            .await?;

        decode_agent_output(image, &stdout_bytes(&chunks)).map_err(|reason| ScanError::Collect {
            image: image.to_owned(),
            reason: format!(
                "decoding output of scan container {}: {reason}",
                short_id(&container_id)
            ),
        })
    }
}

//! Container engine abstraction for testability.
//!
//! The [`EngineClient`] trait abstracts the engine operations a scan needs,
//! allowing production code to use [`BollardEngineClient`] while tests use
//! `MockEngineClient`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐
//! │ ImageScanner     │   │ContainerInspector│
//! └────────┬─────────┘   └────────┬─────────┘
//!          └──────────┬───────────┘
//!                     ▼
//!              ┌─────────────┐
//!              │EngineClient │ (trait)
//!              └─────────────┘
//!                 │       │
//!                 ▼       ▼
//!            ┌───────┐ ┌──────┐
//!            │Bollard│ │ Mock │
//!            └───┬───┘ └──────┘
//!                ▼
//!          Docker Daemon
//! ```
//!
//! # Container ID Validation
//!
//! Methods that accept container IDs validate them first:
//! - Must be 1-64 characters
//! - Must contain only ASCII hex digits ([0-9a-fA-F])
//!
//! Scan containers are created under a caller-chosen name so they can be
//! removed even when the create response never arrives. Creation and removal
//! therefore also accept engine container names (`[a-zA-Z0-9][a-zA-Z0-9_.-]*`).
//!
//! # Shared Engine
//!
//! Many pipelines talk to the same engine concurrently. Nothing here
//! serializes access; every method is safe to call from parallel tasks.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tracing::debug;

use dockscan_core::types::{ContainerDescriptor, ContainerRuntimeConfig};

use crate::error::EngineError;

/// Validates a container ID to prevent injection attacks.
///
/// Engine container IDs are 64-character hex strings (or shorter prefix forms).
fn validate_container_id(id: &str) -> Result<(), EngineError> {
    if id.is_empty() || id.len() > 64 {
        return Err(EngineError::Api(format!(
            "invalid container ID: length {} (must be 1-64)",
            id.len()
        )));
    }
    if !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EngineError::Api(
            "invalid container ID: contains non-hex characters".to_owned(),
        ));
    }
    Ok(())
}

/// Validates a container reference: a container ID or an engine container name.
fn validate_container_ref(reference: &str) -> Result<(), EngineError> {
    if validate_container_id(reference).is_ok() {
        return Ok(());
    }
    let mut chars = reference.chars();
    let valid_name = reference.len() <= MAX_CONTAINER_NAME_LEN
        && chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || "_.-".contains(c));
    if !valid_name {
        return Err(EngineError::Api(format!(
            "invalid container reference: {reference:?}"
        )));
    }
    Ok(())
}

/// Upper bound for container names accepted by [`validate_container_ref`].
const MAX_CONTAINER_NAME_LEN: usize = 128;

/// Options for a single image build.
///
/// `build_args` may carry secrets, so the `Debug` output lists only the keys.
#[derive(Clone, Default)]
pub struct BuildOptions {
    /// Recipe path inside the build context.
    pub dockerfile: String,
    /// Tag applied to the built image.
    pub tag: String,
    /// Always attempt to pull newer versions of base images.
    pub pull_parent: bool,
    /// Do not use the build cache.
    pub no_cache: bool,
    /// Suppress verbose build output.
    pub suppress_output: bool,
    /// Build-time arguments (`ARG` values).
    pub build_args: HashMap<String, String>,
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut arg_keys: Vec<&str> = self.build_args.keys().map(String::as_str).collect();
        arg_keys.sort_unstable();
        f.debug_struct("BuildOptions")
            .field("dockerfile", &self.dockerfile)
            .field("tag", &self.tag)
            .field("pull_parent", &self.pull_parent)
            .field("no_cache", &self.no_cache)
            .field("suppress_output", &self.suppress_output)
            .field("build_args", &arg_keys)
            .finish()
    }
}

/// One demultiplexed frame of container output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogChunk {
    /// Standard output bytes.
    StdOut(Bytes),
    /// Standard error bytes.
    StdErr(Bytes),
    /// Raw console bytes (TTY containers, no multiplexing).
    Console(Bytes),
}

/// Concatenates the standard-output frames, dropping everything else.
pub fn stdout_bytes(chunks: &[LogChunk]) -> Vec<u8> {
    let len = chunks
        .iter()
        .map(|c| match c {
            LogChunk::StdOut(b) => b.len(),
            _ => 0,
        })
        .sum();
    let mut out = Vec::with_capacity(len);
    for chunk in chunks {
        if let LogChunk::StdOut(b) = chunk {
            out.extend_from_slice(b);
        }
    }
    out
}

/// Trait abstracting container engine operations.
///
/// All engine calls go through this trait, enabling testability via mocking.
/// The trait is `Send + Sync + 'static`, allowing safe sharing across async tasks.
///
/// # Implementations
///
/// - [`BollardEngineClient`]: Production implementation using the `bollard` library
/// - `MockEngineClient`: Test implementation recording every call (tests only)
///
/// # Error Handling
///
/// - **404 errors**: Converted to `EngineError::NotFound`
/// - **Build failures**: `EngineError::Build` carrying the partial build log
/// - **Everything else**: `EngineError::Api`
pub trait EngineClient: Send + Sync + 'static {
    /// Lists containers. With `all = false` only running containers are returned.
    fn list_containers(
        &self,
        all: bool,
    ) -> impl Future<Output = Result<Vec<ContainerDescriptor>, EngineError>> + Send;

    /// Fetches the runtime configuration of a container.
    ///
    /// # Errors
    ///
    /// - `EngineError::NotFound`: Container does not exist (404)
    /// - `EngineError::Api`: Invalid ID or other API errors
    fn inspect_container(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<ContainerRuntimeConfig, EngineError>> + Send;

    /// Pulls an image from its registry, waiting for the pull to finish.
    ///
    /// Only the named tag (or digest) is pulled; an untagged reference pulls
    /// `latest`, never every tag of the repository.
    fn pull_image(&self, reference: &str)
    -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Builds an image from a tar build context.
    ///
    /// Returns the build log on success.
    ///
    /// # Errors
    ///
    /// `EngineError::Build` with whatever log was received before the failure.
    fn build_image(
        &self,
        context: Bytes,
        options: &BuildOptions,
    ) -> impl Future<Output = Result<String, EngineError>> + Send;

    /// Creates a non-interactive container (`tty: false`) named `name` and returns its ID.
    ///
    /// The name is usable with [`remove_container`](Self::remove_container)
    /// even if this call is dropped before the ID comes back.
    fn create_container(
        &self,
        image: &str,
        name: &str,
    ) -> impl Future<Output = Result<String, EngineError>> + Send;

    /// Starts a created container.
    fn start_container(&self, id: &str) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Reads a container's standard output until the container exits.
    ///
    /// The engine's multiplexed stream is split into [`LogChunk`] frames.
    fn container_logs(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Vec<LogChunk>, EngineError>> + Send;

    /// Force-removes a container (and its anonymous volumes) by ID or name.
    fn remove_container(&self, id: &str)
    -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Force-removes an image by tag.
    fn remove_image(&self, tag: &str) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Checks engine connectivity.
    fn ping(&self) -> impl Future<Output = Result<(), EngineError>> + Send;
}

/// Splits an image reference into the `fromImage` and `tag` pull parameters.
///
/// A reference without tag or digest pulls `latest`, never every tag.
fn split_reference(reference: &str) -> (&str, &str) {
    if let Some((repo, digest)) = reference.split_once('@') {
        return (repo, digest);
    }
    let name_start = reference.rfind('/').map_or(0, |i| i + 1);
    match reference[name_start..].rfind(':') {
        Some(i) => {
            let split = name_start + i;
            (&reference[..split], &reference[split + 1..])
        }
        None => (reference, "latest"),
    }
}

fn map_api_error(err: bollard::errors::Error, action: &str, subject: &str) -> EngineError {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message,
        } => EngineError::NotFound(format!("{subject}: {message}")),
        other => EngineError::Api(format!("{action} {subject} failed: {other}")),
    }
}

/// Production engine client implementation using `bollard`.
///
/// Communicates with the Docker daemon via a Unix socket or the platform
/// default (`DOCKER_HOST`). Internally uses `Arc<bollard::Docker>` for safe
/// sharing across async tasks.
///
/// # Examples
///
/// ```ignore
/// use dockscan_scanner::BollardEngineClient;
///
/// let client = BollardEngineClient::connect_local()?;
/// let client = BollardEngineClient::connect_with_socket("/run/docker.sock", 120)?;
/// # Ok::<(), dockscan_scanner::EngineError>(())
/// ```
pub struct BollardEngineClient {
    docker: Arc<bollard::Docker>,
}

impl BollardEngineClient {
    /// Connects to the engine using the platform defaults.
    pub fn connect_local() -> Result<Self, EngineError> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            EngineError::Connection(format!("failed to connect to docker: {e}"))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects to the engine using a specific socket path.
    pub fn connect_with_socket(socket_path: &str, timeout_secs: u64) -> Result<Self, EngineError> {
        let docker = bollard::Docker::connect_with_socket(
            socket_path,
            timeout_secs,
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|e| {
            EngineError::Connection(format!(
                "failed to connect to docker at {socket_path}: {e}"
            ))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects using the socket path if given, otherwise the platform defaults.
    pub fn connect(socket_path: &str, timeout_secs: u64) -> Result<Self, EngineError> {
        if socket_path.is_empty() {
            let client = Self::connect_local()?;
            let docker = (*client.docker)
                .clone()
                .with_timeout(Duration::from_secs(timeout_secs));
            Ok(Self {
                docker: Arc::new(docker),
            })
        } else {
            Self::connect_with_socket(socket_path, timeout_secs)
        }
    }
}

impl EngineClient for BollardEngineClient {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerDescriptor>, EngineError> {
        use bollard::container::ListContainersOptions;

        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| EngineError::Api(format!("list containers failed: {e}")))?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                Some(ContainerDescriptor {
                    id,
                    image: c.image.unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerRuntimeConfig, EngineError> {
        validate_container_id(id)?;

        let details = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| map_api_error(e, "inspect container", id))?;

        let running = details
            .state
            .and_then(|s| s.running)
            .unwrap_or_default();
        let host = details.host_config.unwrap_or_default();

        Ok(ContainerRuntimeConfig {
            privileged: host.privileged.unwrap_or_default(),
            cap_add: host.cap_add.unwrap_or_default(),
            binds: host.binds.unwrap_or_default(),
            publish_all_ports: host.publish_all_ports.unwrap_or_default(),
            running,
        })
    }

    async fn pull_image(&self, reference: &str) -> Result<(), EngineError> {
        use bollard::image::CreateImageOptions;

        let (from_image, tag) = split_reference(reference);
        let options = CreateImageOptions {
            from_image,
            tag,
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(item) = stream.next().await {
            let info = item.map_err(|e| map_api_error(e, "pull image", reference))?;
            if let Some(error) = info.error {
                return Err(EngineError::Api(format!(
                    "pull image {reference} failed: {error}"
                )));
            }
            if let Some(status) = info.status {
                debug!(image = reference, status = %status, "pull progress");
            }
        }
        Ok(())
    }

    async fn build_image(
        &self,
        context: Bytes,
        options: &BuildOptions,
    ) -> Result<String, EngineError> {
        use bollard::image::BuildImageOptions;

        let build_options = BuildImageOptions::<String> {
            dockerfile: options.dockerfile.clone(),
            t: options.tag.clone(),
            pull: options.pull_parent,
            nocache: options.no_cache,
            q: options.suppress_output,
            rm: true,
            forcerm: true,
            buildargs: options.build_args.clone(),
            ..Default::default()
        };

        let mut log = String::new();
        let mut stream = self.docker.build_image(build_options, None, Some(context));
        while let Some(item) = stream.next().await {
            match item {
                Ok(info) => {
                    if let Some(line) = info.stream {
                        log.push_str(&line);
                    }
                    if let Some(error) = info.error {
                        return Err(EngineError::Build { reason: error, log });
                    }
                }
                Err(e) => {
                    return Err(EngineError::Build {
                        reason: e.to_string(),
                        log,
                    });
                }
            }
        }
        Ok(log)
    }

    async fn create_container(&self, image: &str, name: &str) -> Result<String, EngineError> {
        validate_container_ref(name)?;

        use bollard::container::{Config, CreateContainerOptions};

        let config = Config::<String> {
            image: Some(image.to_owned()),
            tty: Some(false),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.to_owned(),
                    platform: None,
                }),
                config,
            )
            .await
            .map_err(|e| map_api_error(e, "create container from", image))?;
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        validate_container_id(id)?;

        use bollard::container::StartContainerOptions;

        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| map_api_error(e, "start container", id))
    }

    async fn container_logs(&self, id: &str) -> Result<Vec<LogChunk>, EngineError> {
        validate_container_id(id)?;

        use bollard::container::{LogOutput, LogsOptions};

        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: false,
            ..Default::default()
        };

        let mut chunks = Vec::new();
        let mut stream = self.docker.logs(id, Some(options));
        while let Some(item) = stream.next().await {
            let output = item.map_err(|e| map_api_error(e, "read logs of", id))?;
            chunks.push(match output {
                LogOutput::StdOut { message } => LogChunk::StdOut(message),
                LogOutput::StdErr { message } => LogChunk::StdErr(message),
                LogOutput::Console { message } => LogChunk::Console(message),
                LogOutput::StdIn { .. } => continue,
            });
        }
        Ok(chunks)
    }

    async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
        validate_container_ref(id)?;

        use bollard::container::RemoveContainerOptions;

        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| map_api_error(e, "remove container", id))
    }

    async fn remove_image(&self, tag: &str) -> Result<(), EngineError> {
        use bollard::image::RemoveImageOptions;

        self.docker
            .remove_image(
                tag,
                Some(RemoveImageOptions {
                    force: true,
                    ..Default::default()
                }),
                None,
            )
            .await
            .map_err(|e| map_api_error(e, "remove image", tag))?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), EngineError> {
        self.docker
            .ping()
            .await
            .map_err(|e| EngineError::Connection(format!("ping failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) use mock::{MockEngineClient, MockOp};

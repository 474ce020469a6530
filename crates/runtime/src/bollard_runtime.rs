use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, ResourcesUlimits};
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::engine::{ContainerHandle, ContainerRuntime, ContainerSpec, EngineKind, LineSink};
use crate::error::RuntimeError;

/// `ContainerRuntime` backed by a real Docker or Podman daemon over the
/// Docker Engine API. Podman exposes the same API on its own socket, so one
/// client type serves both; `engine` only changes the handful of options
/// that differ between them.
pub struct BollardRuntime {
    docker: Docker,
    engine: EngineKind,
    pull_lock: Mutex<()>,
}

impl BollardRuntime {
    pub fn new(docker: Docker, engine: EngineKind) -> Self {
        Self {
            docker,
            engine,
            pull_lock: Mutex::new(()),
        }
    }

    fn host_config(&self, spec: &ContainerSpec) -> HostConfig {
        let binds = match self.engine {
            EngineKind::Docker => spec.binds.clone(),
            EngineKind::Podman => spec
                .binds
                .iter()
                .map(|bind| format!("{bind}:rshared"))
                .collect(),
        };

        let mut host_config = HostConfig {
            binds: Some(binds),
            ..Default::default()
        };

        if self.engine == EngineKind::Docker {
            host_config.cap_add = Some(vec!["SYS_ADMIN".to_string()]);
            host_config.auto_remove = Some(true);
            host_config.ulimits = Some(vec![ResourcesUlimits {
                name: Some("nofile".to_string()),
                soft: Some(1024),
                hard: Some(1_048_576),
            }]);
        }

        host_config
    }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn pull_image(&self, name: &str) -> Result<(), RuntimeError> {
        let _guard = self.pull_lock.lock().await;
        let options = CreateImageOptions {
            from_image: name,
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            progress?;
        }
        Ok(())
    }

    async fn get_image(&self, name: &str) -> Result<String, RuntimeError> {
        match self.docker.inspect_image(name).await {
            Ok(_) => Ok(name.to_string()),
            Err(_) => {
                self.pull_image(name).await?;
                Ok(name.to_string())
            }
        }
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle, RuntimeError> {
        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.cmd.clone()),
            env: Some(spec.env.clone()),
            tty: Some(self.engine == EngineKind::Docker),
            host_config: Some(self.host_config(spec)),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await?;
        Ok(ContainerHandle { id: response.id })
    }

    async fn start(
        &self,
        handle: &ContainerHandle,
        line_sink: LineSink,
    ) -> Result<i64, RuntimeError> {
        let mut logs = self.docker.logs(
            &handle.id,
            Some(LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );

        self.docker
            .start_container(&handle.id, None::<StartContainerOptions<String>>)
            .await?;

        let id = handle.id.clone();
        let sink = line_sink.clone();
        tokio::spawn(async move {
            while let Some(chunk) = logs.next().await {
                match chunk {
                    Ok(LogOutput::StdOut { message } | LogOutput::StdErr { message }) => {
                        sink(&message)
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(container = %id, error = %err, "log stream error");
                        break;
                    }
                }
            }
        });

        let condition = match self.engine {
            EngineKind::Docker => "removed",
            EngineKind::Podman => "not-running",
        };
        let mut waits = self.docker.wait_container(
            &handle.id,
            Some(WaitContainerOptions {
                condition: condition.to_string(),
            }),
        );

        match waits.next().await {
            Some(Ok(result)) => Ok(result.status_code),
            Some(Err(err)) => Err(err.into()),
            None => Err(RuntimeError::Engine(
                "container wait stream ended with no result".to_string(),
            )),
        }
    }

    async fn kill(&self, handle: &ContainerHandle) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_container(&handle.id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

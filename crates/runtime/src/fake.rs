use std::sync::Mutex;

use async_trait::async_trait;

use crate::engine::{ContainerHandle, ContainerRuntime, ContainerSpec, LineSink};
use crate::error::RuntimeError;

/// In-memory `ContainerRuntime` for builder/database tests. Every `create`
/// hands out a sequential id; `start` replays a scripted output and exit
/// code instead of touching a real daemon.
pub struct FakeRuntime {
    pulls: Mutex<Vec<String>>,
    next_id: Mutex<u64>,
    exit_code: Mutex<i64>,
    output: Mutex<Vec<u8>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            pulls: Mutex::new(Vec::new()),
            next_id: Mutex::new(0),
            exit_code: Mutex::new(0),
            output: Mutex::new(Vec::new()),
        }
    }

    pub fn pulls(&self) -> Vec<String> {
        self.pulls.lock().unwrap().clone()
    }

    pub fn set_exit_code(&self, code: i64) {
        *self.exit_code.lock().unwrap() = code;
    }

    pub fn set_output(&self, bytes: Vec<u8>) {
        *self.output.lock().unwrap() = bytes;
    }
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn pull_image(&self, name: &str) -> Result<(), RuntimeError> {
        self.pulls.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn get_image(&self, name: &str) -> Result<String, RuntimeError> {
        Ok(name.to_string())
    }

    async fn create(&self, _spec: &ContainerSpec) -> Result<ContainerHandle, RuntimeError> {
        let mut next_id = self.next_id.lock().unwrap();
        let id = format!("fake-container-{next_id}");
        *next_id += 1;
        Ok(ContainerHandle { id })
    }

    async fn start(
        &self,
        _handle: &ContainerHandle,
        line_sink: LineSink,
    ) -> Result<i64, RuntimeError> {
        let output = self.output.lock().unwrap().clone();
        if !output.is_empty() {
            line_sink(&output);
        }
        Ok(*self.exit_code.lock().unwrap())
    }

    async fn kill(&self, _handle: &ContainerHandle) -> Result<(), RuntimeError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn start_replays_scripted_output_and_exit_code() {
        let fake = FakeRuntime::new();
        fake.set_exit_code(124);
        fake.set_output(b"timed out\n".to_vec());

        let spec = ContainerSpec {
            image: "builder:latest".to_string(),
            cmd: vec!["build".to_string()],
            binds: vec![],
            env: vec![],
        };
        let handle = fake.create(&spec).await.unwrap();

        let captured: Arc<std::sync::Mutex<Vec<u8>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink_captured = captured.clone();
        let sink: LineSink = Arc::new(move |bytes| sink_captured.lock().unwrap().extend_from_slice(bytes));

        let status = fake.start(&handle, sink).await.unwrap();
        assert_eq!(status, 124);
        assert_eq!(*captured.lock().unwrap(), b"timed out\n");
    }
}

//! [`KernelBackend`] implementation over a kernel gateway.

use async_trait::async_trait;
use tracing::debug;

use kernelmix_core::{BackendResult, KernelBackend, KernelChannel, StartOptions};
use kernelmix_types::{BackendKind, KernelModel, KernelSpec, SessionId};

use crate::channel::GatewayChannel;
use crate::client::GatewayClient;
use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// The remote side of the mix: kernels hosted by a kernel gateway.
///
/// # Example
///
/// ```no_run
/// use kernelmix_gateway::{GatewayBackend, GatewayConfig};
///
/// let backend = GatewayBackend::new(
///     GatewayConfig::new("https://gateway.example.com").with_auth_token("s3cret"),
/// )
/// .unwrap();
/// ```
#[derive(Clone)]
pub struct GatewayBackend {
    client: GatewayClient,
}

impl GatewayBackend {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            client: GatewayClient::new(config)?,
        })
    }

    pub fn client(&self) -> &GatewayClient {
        &self.client
    }
}

#[async_trait]
impl KernelBackend for GatewayBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn kernel_specs(&self) -> BackendResult<Vec<KernelSpec>> {
        self.client.kernel_specs().await
    }

    async fn kernel_spec(&self, name: &str) -> BackendResult<KernelSpec> {
        self.client.kernel_spec(name).await
    }

    async fn start_kernel(&self, name: &str, options: &StartOptions) -> BackendResult<String> {
        let model = self.client.start_kernel(name, options).await?;
        debug!(kernel_name = %name, delegate = %model.id, "Gateway kernel started");
        Ok(model.id)
    }

    async fn shutdown_kernel(&self, kernel_id: &str, _now: bool) -> BackendResult<()> {
        self.client.shutdown_kernel(kernel_id).await
    }

    async fn interrupt_kernel(&self, kernel_id: &str) -> BackendResult<()> {
        self.client.interrupt_kernel(kernel_id).await
    }

    async fn restart_kernel(&self, kernel_id: &str, _now: bool) -> BackendResult<()> {
        self.client.restart_kernel(kernel_id).await
    }

    async fn kernel_model(&self, kernel_id: &str) -> BackendResult<KernelModel> {
        self.client.kernel_model(kernel_id).await
    }

    async fn list_kernels(&self) -> BackendResult<Vec<KernelModel>> {
        self.client.list_kernels().await
    }

    async fn has_kernel(&self, kernel_id: &str) -> bool {
        self.client.kernel_model(kernel_id).await.is_ok()
    }

    async fn open_channel(
        &self,
        kernel_id: &str,
        session: SessionId,
    ) -> BackendResult<Box<dyn KernelChannel>> {
        let config = self.client.config();
        let channel = GatewayChannel::new(
            &config.ws_base(),
            kernel_id,
            session,
            self.client.headers().to_vec(),
            config.connect_timeout(),
        )?;
        Ok(Box::new(channel))
    }
}

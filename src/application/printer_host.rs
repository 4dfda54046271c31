// Port to the print server hosting the plugin
use crate::domain::heater::PrinterProfile;
use async_trait::async_trait;

#[async_trait]
pub trait PrinterHost: Send + Sync {
    /// The currently selected printer profile, if the host has one.
    async fn current_profile(&self) -> anyhow::Result<Option<PrinterProfile>>;

    /// Queue raw commands for the controller.
    async fn send_commands(&self, commands: &[String]) -> anyhow::Result<()>;
}

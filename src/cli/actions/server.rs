use crate::api::{self, PortalConfig};
use crate::cli::actions::Action;
use crate::clients::{
    adminusers::AdminUsersClient, connector::ConnectorClient, notify::NotifyClient,
};
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            adminusers_url,
            connector_url,
            notify_url,
            base_url,
        } => {
            let adminusers = AdminUsersClient::new(&adminusers_url, crate::APP_USER_AGENT)?;
            let connector = ConnectorClient::new(&connector_url, crate::APP_USER_AGENT)?;
            let notify = NotifyClient::new(&notify_url, crate::APP_USER_AGENT)?;
            let config = PortalConfig::new(&base_url);

            api::new(port, config, adminusers, connector, notify).await?;
        }
    }

    Ok(())
}

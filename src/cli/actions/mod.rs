pub mod server;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        adminusers_url: String,
        connector_url: String,
        notify_url: String,
        base_url: String,
    },
}

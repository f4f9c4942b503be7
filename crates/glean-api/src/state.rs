use glean_commands::Services;

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
}

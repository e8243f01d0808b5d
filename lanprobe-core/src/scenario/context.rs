//! Suite-wide fixtures
//!
//! Everything a suite run needs, built once and handed to the runner.

use std::sync::Arc;

use crate::config::HarnessConfig;
use crate::net::gateway::GatewayResolver;
use crate::net::probe::Reachability;
use crate::types::GatewayAddress;
use crate::vpn::{ConnectionController, SettingsController, VpnControl};

pub struct SuiteContext {
    pub config: HarnessConfig,
    pub settings: SettingsController,
    pub connection: ConnectionController,
    pub prober: Arc<dyn Reachability>,

    /// LAN peer; resolved with `resolver` at setup when not given
    pub gateway: Option<GatewayAddress>,
    pub resolver: GatewayResolver,
}

impl SuiteContext {
    /// Both controllers share the one client control channel
    pub fn new(
        config: HarnessConfig,
        client: Arc<dyn VpnControl>,
        prober: Arc<dyn Reachability>,
    ) -> Self {
        Self {
            settings: SettingsController::new(Arc::clone(&client), &config.client),
            connection: ConnectionController::new(client, &config.client),
            prober,
            gateway: None,
            resolver: GatewayResolver::new(&config.gateway),
            config,
        }
    }

    /// Resolve the gateway from other route tables than the live ones
    pub fn with_resolver(mut self, resolver: GatewayResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_gateway(mut self, gateway: GatewayAddress) -> Self {
        self.gateway = Some(gateway);
        self
    }
}

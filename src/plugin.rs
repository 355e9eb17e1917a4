//! Host-facing adapter layer.
//!
//! Exposes the transaction operations as the named hooks a host platform's
//! plugin runtime consumes, translating the host's flat configuration field
//! list into a typed [`GatewayConfig`]. Every hook takes the caller's previous
//! value and returns it unchanged when the integration is inactive or not yet
//! configured.

use async_trait::async_trait;

use crate::transactions;
use crate::types::{ConnectionParams, GatewayConfig, GatewayResponse, PaymentData};
use crate::utils::generate_client_token;

/// Configuration field names as persisted by the host.
pub mod fields {
    /// OAuth consumer key field name
    pub const CONSUMER_KEY: &str = "Consumer key";
    /// OAuth consumer secret field name
    pub const CONSUMER_SECRET: &str = "Consumer secret";
    /// API base URL field name
    pub const BASE_URL: &str = "Base URL";
    /// Business shortcode field name
    pub const SHORTCODE: &str = "Business shortcode";
    /// Online passkey field name
    pub const PASSKEY: &str = "Online passkey";
    /// Callback URL field name
    pub const CALLBACK_URL: &str = "Callback URL";
    /// Initiator name field name
    pub const INITIATOR_NAME: &str = "Initiator name";
    /// Initiator security credential field name
    pub const INITIATOR_CREDENTIAL: &str = "Initiator security credential";
}

/// A named configuration value persisted by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigField {
    /// Field name, matching one of [`fields`]
    pub name: String,
    /// Persisted value; `None` until the merchant fills it in
    pub value: Option<String>,
}

/// Descriptor of one configuration field, for the host's settings UI.
#[derive(Debug, Clone, Copy)]
pub struct ConfigFieldSpec {
    /// Field name
    pub name: &'static str,
    /// Short label shown to the merchant
    pub label: &'static str,
    /// Help text shown to the merchant
    pub help_text: &'static str,
    /// Whether the host must store and render this value as a secret
    pub secret: bool,
}

/// Describes the configuration fields this integration requires.
pub fn config_structure() -> Vec<ConfigFieldSpec> {
    vec![
        ConfigFieldSpec {
            name: fields::CONSUMER_KEY,
            label: "Consumer key",
            help_text: "Provide Mpesa Consumer Key",
            secret: true,
        },
        ConfigFieldSpec {
            name: fields::CONSUMER_SECRET,
            label: "Consumer secret",
            help_text: "Provide Mpesa Consumer Secret",
            secret: true,
        },
        ConfigFieldSpec {
            name: fields::BASE_URL,
            label: "Mpesa API URL",
            help_text: "Provide the base URL for the Mpesa API",
            secret: false,
        },
        ConfigFieldSpec {
            name: fields::SHORTCODE,
            label: "Business shortcode",
            help_text: "Provide Mpesa Business Shortcode",
            secret: false,
        },
        ConfigFieldSpec {
            name: fields::PASSKEY,
            label: "Online passkey",
            help_text: "Provide Mpesa online passkey",
            secret: true,
        },
        ConfigFieldSpec {
            name: fields::CALLBACK_URL,
            label: "Callback URL",
            help_text: "Provide the URL that Safaricom will call with transaction details",
            secret: false,
        },
        ConfigFieldSpec {
            name: fields::INITIATOR_NAME,
            label: "Initiator name",
            help_text: "Provide the initiator name used for reversals",
            secret: false,
        },
        ConfigFieldSpec {
            name: fields::INITIATOR_CREDENTIAL,
            label: "Initiator security credential",
            help_text: "Provide the initiator security credential used for reversals",
            secret: true,
        },
    ]
}

/// Default (empty) configuration for a fresh plugin installation.
pub fn default_configuration() -> Vec<ConfigField> {
    config_structure()
        .into_iter()
        .map(|spec| ConfigField {
            name: spec.name.to_string(),
            value: None,
        })
        .collect()
}

/// A field/value pair exposed to storefront clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfigEntry {
    /// Field name
    pub field: String,
    /// Field value
    pub value: String,
}

/// Named hooks consumed by the host plugin runtime.
///
/// Each hook receives the previous value from the host's plugin chain and must
/// return it unchanged when this integration does not apply.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Gateway name reported to the host.
    fn name(&self) -> &'static str;

    /// Initiates a push payment.
    async fn capture_payment(
        &self,
        payment: &PaymentData,
        previous: Option<GatewayResponse>,
    ) -> Option<GatewayResponse>;

    /// Confirms a previously captured push.
    async fn confirm_payment(
        &self,
        payment: &PaymentData,
        previous: Option<GatewayResponse>,
    ) -> Option<GatewayResponse>;

    /// Reverses a completed transaction.
    async fn refund_payment(
        &self,
        payment: &PaymentData,
        previous: Option<GatewayResponse>,
    ) -> Option<GatewayResponse>;

    /// Voids a transaction (local success; no upstream equivalent).
    async fn void_payment(
        &self,
        payment: &PaymentData,
        previous: Option<GatewayResponse>,
    ) -> Option<GatewayResponse>;

    /// Runs the synchronous capture-then-confirm flow.
    async fn process_payment(
        &self,
        payment: &PaymentData,
        previous: Option<GatewayResponse>,
    ) -> Option<GatewayResponse>;

    /// Issues a fresh client token for the storefront.
    async fn get_client_token(&self, previous: Option<String>) -> Option<String>;

    /// Exposes non-secret configuration to storefront clients.
    async fn get_payment_config(
        &self,
        previous: Option<Vec<PaymentConfigEntry>>,
    ) -> Option<Vec<PaymentConfigEntry>>;
}

/// The M-Pesa gateway plugin.
///
/// # Examples
///
/// ```
/// use mpesa_gateway::plugin::{ConfigField, MpesaGatewayPlugin, fields};
///
/// let configuration = vec![
///     ConfigField { name: fields::CONSUMER_KEY.into(), value: Some("key".into()) },
///     ConfigField { name: fields::CONSUMER_SECRET.into(), value: Some("secret".into()) },
///     ConfigField { name: fields::BASE_URL.into(), value: Some("https://sandbox.safaricom.co.ke/".into()) },
///     ConfigField { name: fields::SHORTCODE.into(), value: Some("174379".into()) },
///     ConfigField { name: fields::PASSKEY.into(), value: Some("passkey".into()) },
///     ConfigField { name: fields::CALLBACK_URL.into(), value: Some("https://shop.example.com/mpesa".into()) },
///     ConfigField { name: fields::INITIATOR_NAME.into(), value: Some("api_user".into()) },
///     ConfigField { name: fields::INITIATOR_CREDENTIAL.into(), value: Some("credential".into()) },
/// ];
///
/// let plugin = MpesaGatewayPlugin::from_configuration(&configuration, true);
/// assert!(plugin.is_configured());
/// ```
pub struct MpesaGatewayPlugin {
    active: bool,
    config: Option<GatewayConfig>,
}

impl MpesaGatewayPlugin {
    /// Creates a plugin from an already-built gateway configuration.
    pub fn new(active: bool, config: Option<GatewayConfig>) -> Self {
        Self { active, config }
    }

    /// Builds the plugin from the host's persisted field list.
    ///
    /// The plugin stays unconfigured (hooks pass previous values through) when
    /// any required field is missing or empty.
    pub fn from_configuration(configuration: &[ConfigField], active: bool) -> Self {
        let lookup = |name: &str| -> Option<String> {
            configuration
                .iter()
                .find(|field| field.name == name)
                .and_then(|field| field.value.clone())
                .filter(|value| !value.is_empty())
        };

        let connection = (|| {
            Some(ConnectionParams {
                consumer_key: lookup(fields::CONSUMER_KEY)?,
                consumer_secret: lookup(fields::CONSUMER_SECRET)?,
                base_url: lookup(fields::BASE_URL)?,
                shortcode: lookup(fields::SHORTCODE)?,
                passkey: lookup(fields::PASSKEY)?,
                callback_url: lookup(fields::CALLBACK_URL)?,
                initiator_name: lookup(fields::INITIATOR_NAME)?,
                initiator_security_credential: lookup(fields::INITIATOR_CREDENTIAL)?,
            })
        })();

        Self {
            active,
            config: connection.map(GatewayConfig::new),
        }
    }

    /// Whether a complete configuration was supplied.
    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Whether the integration is active for the current channel.
    pub fn is_active(&self) -> bool {
        self.active
    }

    fn gateway_config(&self) -> Option<&GatewayConfig> {
        if !self.active {
            return None;
        }
        self.config.as_ref()
    }
}

#[async_trait]
impl PaymentGateway for MpesaGatewayPlugin {
    fn name(&self) -> &'static str {
        "Mpesa"
    }

    async fn capture_payment(
        &self,
        payment: &PaymentData,
        previous: Option<GatewayResponse>,
    ) -> Option<GatewayResponse> {
        match self.gateway_config() {
            Some(config) => Some(transactions::capture(payment, config).await),
            None => previous,
        }
    }

    async fn confirm_payment(
        &self,
        payment: &PaymentData,
        previous: Option<GatewayResponse>,
    ) -> Option<GatewayResponse> {
        match self.gateway_config() {
            Some(config) => Some(transactions::confirm(payment, config).await),
            None => previous,
        }
    }

    async fn refund_payment(
        &self,
        payment: &PaymentData,
        previous: Option<GatewayResponse>,
    ) -> Option<GatewayResponse> {
        match self.gateway_config() {
            Some(config) => Some(transactions::refund(payment, config).await),
            None => previous,
        }
    }

    async fn void_payment(
        &self,
        payment: &PaymentData,
        previous: Option<GatewayResponse>,
    ) -> Option<GatewayResponse> {
        match self.gateway_config() {
            Some(config) => Some(transactions::void(payment, config)),
            None => previous,
        }
    }

    async fn process_payment(
        &self,
        payment: &PaymentData,
        previous: Option<GatewayResponse>,
    ) -> Option<GatewayResponse> {
        match self.gateway_config() {
            Some(config) => Some(transactions::process_payment(payment, config).await),
            None => previous,
        }
    }

    async fn get_client_token(&self, previous: Option<String>) -> Option<String> {
        match self.gateway_config() {
            Some(_) => Some(generate_client_token()),
            None => previous,
        }
    }

    async fn get_payment_config(
        &self,
        previous: Option<Vec<PaymentConfigEntry>>,
    ) -> Option<Vec<PaymentConfigEntry>> {
        match self.gateway_config() {
            Some(config) => Some(vec![
                PaymentConfigEntry {
                    field: "shortcode".to_string(),
                    value: config.connection.shortcode.clone(),
                },
                PaymentConfigEntry {
                    field: "callback_url".to_string(),
                    value: config.connection.callback_url.clone(),
                },
            ]),
            None => previous,
        }
    }
}

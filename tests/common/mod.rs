use chrono::{DateTime, Utc};
use dealgate::configuration::{get_configuration, Settings};
use dealgate::helpers::signature::{self, SIGNATURE_HEADER};
use dealgate::models::{Subscription, SubscriptionStatus};
use dealgate::services::InMemorySubscriptionStore;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::Arc;

pub const WEBHOOK_SECRET: &str = "whsec_integration_tests";

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemorySubscriptionStore>,
    pub client: reqwest::Client,
}

pub async fn spawn_app_with_configuration(mut configuration: Settings) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    configuration.webhook.secret = WEBHOOK_SECRET.to_string();

    let store = Arc::new(InMemorySubscriptionStore::new());
    let server = dealgate::startup::run(listener, store.clone(), configuration)
        .await
        .expect("Failed to bind address.");

    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        client: reqwest::Client::new(),
    }
}

pub async fn spawn_app() -> TestApp {
    let configuration = get_configuration().expect("Failed to get configuration");
    spawn_app_with_configuration(configuration).await
}

impl TestApp {
    pub async fn post_raw(&self, body: Vec<u8>, signature: Option<String>) -> reqwest::Response {
        let mut request = self
            .client
            .post(format!("{}/webhooks/billing", self.address))
            .header("Content-Type", "application/json")
            .body(body);
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn post_event(&self, event: &Value) -> reqwest::Response {
        let body = serde_json::to_vec(event).unwrap();
        let header =
            signature::sign(WEBHOOK_SECRET.as_bytes(), Utc::now().timestamp(), &body).unwrap();
        self.post_raw(body, Some(header)).await
    }

    pub async fn get_as(&self, path: &str, tenant_id: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .header("x-tenant-id", tenant_id)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn seed(&self, tenant_id: &str, plan_id: &str, status: SubscriptionStatus) {
        let now = Utc::now();
        self.store
            .put(Subscription {
                id: format!("sub_{tenant_id}"),
                tenant_id: tenant_id.to_string(),
                plan_id: plan_id.to_string(),
                status,
                trial_end: None,
                past_due_since: None,
                last_event_id: None,
                last_event_at: None,
                version: 1,
                created_at: now,
                updated_at: now,
            })
            .await;
    }
}

/// Event carrying a subscription object.
pub fn subscription_event(
    id: &str,
    event_type: &str,
    created: DateTime<Utc>,
    subscription_id: &str,
    status: Option<&str>,
) -> Value {
    json!({
        "id": id,
        "type": event_type,
        "created": created.timestamp(),
        "data": {
            "object": {
                "id": subscription_id,
                "tenant_id": "tenant_acme",
                "plan_id": "growth_monthly",
                "status": status,
            }
        }
    })
}

/// Event carrying an invoice object.
pub fn invoice_event(id: &str, event_type: &str, created: DateTime<Utc>, subscription_id: &str) -> Value {
    json!({
        "id": id,
        "type": event_type,
        "created": created.timestamp(),
        "data": { "object": { "subscription": subscription_id } }
    })
}

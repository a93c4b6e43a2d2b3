//! REST client for the CRM.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    courier_config::CrmConfig,
    reqwest::{Client, RequestBuilder, Response, StatusCode},
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    tracing::{debug, info, warn},
};

use crate::{
    Error, LeadId, Result,
    api::CrmApi,
    cache::CrmCache,
    types::{ChatDirection, ChatEntry, Comment, LeadField, NewLead},
};

#[derive(Serialize)]
struct LoginRequest<'a> {
    login: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(alias = "access_token")]
    token: String,
}

#[derive(Deserialize)]
struct CreatedLead {
    #[serde(alias = "lead_id")]
    id: i64,
}

#[derive(Serialize)]
struct CommentBody<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    message: &'a str,
    direction: ChatDirection,
}

/// CRM client speaking the lead/comment/chat REST API with bearer auth.
///
/// A 401 invalidates the cached token, triggers one re-login and one retry.
/// A second 401 is returned as [`Error::Unauthorized`].
pub struct HttpCrm {
    client: Client,
    base_url: String,
    login: String,
    password: Secret<String>,
    cache: Arc<CrmCache>,
}

impl HttpCrm {
    pub fn new(config: &CrmConfig, cache: Arc<CrmCache>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            login: config.login.clone(),
            password: config.password.clone(),
            cache,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn authenticate(&self) -> Result<Secret<String>> {
        debug!(login = %self.login, "logging in to crm");
        let resp = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest {
                login: &self.login,
                password: self.password.expose_secret(),
            })
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::unauthorized("login rejected"));
        }
        let resp = check_status(resp, "login").await?;
        let body: LoginResponse = decode(resp, "login").await?;
        info!("crm login succeeded");
        Ok(Secret::new(body.token))
    }

    async fn token(&self) -> Result<Secret<String>> {
        self.cache
            .token
            .get_or_login(|| self.authenticate())
            .await
    }

    /// Send an authenticated request built by `build`, re-logging in once on 401.
    async fn send<F>(&self, context: &str, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let token = self.token().await?;
        let resp = build(&self.client)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return check_status(resp, context).await;
        }

        debug!(context, "crm token rejected, logging in again");
        self.cache.token.invalidate(&token).await;
        let token = self.token().await?;
        let resp = build(&self.client)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!(context, "crm rejected a fresh token");
            self.cache.token.invalidate(&token).await;
            return Err(Error::unauthorized(context));
        }
        check_status(resp, context).await
    }
}

async fn check_status(resp: Response, context: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::status(status.as_u16(), context, body))
}

/// Parse a successful response body, keeping the endpoint in the error.
async fn decode<T: DeserializeOwned>(resp: Response, context: &str) -> Result<T> {
    let body = resp.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| Error::external(format!("unexpected {context} response"), e))
}

#[async_trait]
impl CrmApi for HttpCrm {
    async fn create_lead(&self, lead: &NewLead) -> Result<LeadId> {
        let url = self.url("/leads");
        let resp = self
            .send("create lead", |c| c.post(&url).json(lead))
            .await?;
        let created: CreatedLead = decode(resp, "create lead").await?;
        Ok(LeadId(created.id))
    }

    async fn lead_fields(&self) -> Result<Vec<LeadField>> {
        let url = self.url("/leads/fields");
        let resp = self.send("list lead fields", |c| c.get(&url)).await?;
        decode(resp, "list lead fields").await
    }

    async fn add_comment(&self, lead: LeadId, text: &str) -> Result<()> {
        let url = self.url(&format!("/leads/{lead}/comments"));
        self.send("add comment", |c| c.post(&url).json(&CommentBody { text }))
            .await?;
        Ok(())
    }

    async fn list_comments(&self, lead: LeadId) -> Result<Vec<Comment>> {
        let url = self.url(&format!("/leads/{lead}/comments"));
        let resp = self.send("list comments", |c| c.get(&url)).await?;
        decode(resp, "list comments").await
    }

    async fn list_chat_history(&self, lead: LeadId) -> Result<Vec<ChatEntry>> {
        let url = self.url(&format!("/leads/{lead}/chat"));
        let resp = self.send("list chat history", |c| c.get(&url)).await?;
        decode(resp, "list chat history").await
    }

    async fn add_chat_message(
        &self,
        lead: LeadId,
        text: &str,
        direction: ChatDirection,
    ) -> Result<()> {
        let url = self.url(&format!("/leads/{lead}/chat"));
        self.send("add chat message", |c| {
            c.post(&url).json(&ChatBody {
                message: text,
                direction,
            })
        })
        .await?;
        Ok(())
    }
}

//! Conversational assistant over the catalog.
//!
//! An utterance is interpreted by an ordered list of strategies: the remote
//! conversational model first (when configured and still reachable), then
//! the local [`IntentRouter`]. Both yield the same [`Routed`] value, so the
//! executor below never knows which one answered.
//!
//! ```text
//! utterance ──▶ pending delete? ──yes──▶ confirm / cancel
//!                    │no
//!                    ▼
//!        ConversationModel ──tag──▶ Routed ─┐
//!              │ error/empty                ├──▶ execute ──▶ reply text
//!              ▼                            │
//!          IntentRouter ──────────▶ Routed ─┘
//! ```
//!
//! Every failure is turned into reply text; [`Assistant::respond`] never
//! returns an error.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use macfreeapps_core::catalog::Catalog;
use macfreeapps_core::error::CatalogError;
use macfreeapps_core::intent::{
    parse_tagged_action, ChatReply, Intent, IntentRouter, ParseError, Routed,
};
use macfreeapps_core::models::{CatalogRecord, Category, RecordPatch};
use macfreeapps_core::normalize::normalize;
use macfreeapps_core::store::CatalogStore;

use crate::config::{AssistantConfig, ASSISTANT_KEY_ENV};
use crate::transport::lookup::{LookupTransport, SearchHit};
use crate::transport::TransportError;

/// What the model sees besides the utterance.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub apps: Vec<CatalogRecord>,
    /// Local time, `dd.mm.yyyy HH:MM:SS`.
    pub current_time: String,
}

impl ConversationContext {
    pub fn snapshot(apps: Vec<CatalogRecord>, now: DateTime<Local>) -> Self {
        Self {
            apps,
            current_time: now.format("%d.%m.%Y %H:%M:%S").to_string(),
        }
    }
}

/// A remote conversational model.
#[async_trait]
pub trait ConversationModel: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the model should still be asked. A model that rejected its
    /// credentials stays unavailable for the rest of the session.
    fn is_available(&self) -> bool {
        true
    }

    /// Send one utterance and return the model's raw reply text.
    async fn send(&self, utterance: &str, context: &ConversationContext) -> Result<String>;
}

/// Name search against the store, used when adding an app by name.
#[async_trait]
pub trait AppFinder: Send + Sync {
    async fn find(&self, name: &str) -> Result<Option<SearchHit>, TransportError>;
}

#[async_trait]
impl AppFinder for LookupTransport {
    async fn find(&self, name: &str) -> Result<Option<SearchHit>, TransportError> {
        self.search_app(name).await
    }
}

// ============ DeepSeek ============

/// Chat-completions client for the DeepSeek API.
///
/// Retries 429 and 5xx responses with exponential backoff (1s, 2s, 4s, …,
/// capped at 32s). A 401 marks the model unavailable; other 4xx fail
/// immediately.
pub struct DeepSeekModel {
    client: reqwest::Client,
    config: AssistantConfig,
    api_key: String,
    available: AtomicBool,
}

impl DeepSeekModel {
    /// Build from config, reading the key from `DEEPSEEK_API_KEY`.
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let api_key = std::env::var(ASSISTANT_KEY_ENV)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", ASSISTANT_KEY_ENV))?;
        Self::with_key(config, api_key)
    }

    pub fn with_key(config: &AssistantConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
            api_key: api_key.into(),
            available: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl ConversationModel for DeepSeekModel {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    async fn send(&self, utterance: &str, context: &ConversationContext) -> Result<String> {
        if !self.is_available() {
            bail!("model {} is unavailable", self.config.model);
        }

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system_prompt(context) },
                { "role": "user", "content": user_prompt(utterance) },
            ],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "stream": false,
        });

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.config.api_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_completion(&json);
                    }

                    if status.as_u16() == 401 {
                        self.available.store(false, Ordering::Relaxed);
                        tracing::warn!("DeepSeek rejected the API key; using local routing");
                        bail!("DeepSeek API error {}", status);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "DeepSeek API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("DeepSeek API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("DeepSeek request failed after retries")))
    }
}

/// Extract `choices[0].message.content` from a chat-completions response.
fn parse_completion(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))
}

pub fn system_prompt(context: &ConversationContext) -> String {
    format!(
        "Sen Mac Free Apps admin paneli için özel olarak tasarlanmış bir AI asistanısın.

GÖREVLERİN:
1. Uygulama yönetimi (ekleme, düzenleme, silme, listeleme)
2. App Store'dan veri çekme
3. Kullanıcı sorularını yanıtlama
4. Türkçe konuşma

MEVCUT UYGULAMALAR:
{}
ŞU AN: {}

YANIT FORMATI:
- Eğer uygulama ekleme isteniyorsa: \"APP_ADD: [uygulama_adı]\"
- Eğer uygulama arama isteniyorsa: \"APP_SEARCH: [arama_terimi]\"
- Eğer uygulama düzenleme isteniyorsa: \"APP_EDIT: [uygulama_adı]\"
- Eğer uygulama silme isteniyorsa: \"APP_DELETE: [uygulama_adı]\"
- Eğer liste isteniyorsa: \"APP_LIST: [kategori]\"
- Diğer durumlarda normal yanıt ver

TÜRKÇE KONUŞ ve samimi ol. Emoji kullan.",
        format_apps_list(&context.apps),
        context.current_time
    )
}

pub fn user_prompt(utterance: &str) -> String {
    format!(
        "Kullanıcı: \"{}\"\n\nLütfen bu isteği analiz et ve uygun aksiyonu belirle. \
         Eğer uygulama yönetimi ile ilgiliyse, yukarıdaki formatı kullan.",
        utterance
    )
}

fn format_apps_list(apps: &[CatalogRecord]) -> String {
    if apps.is_empty() {
        return "Henüz uygulama eklenmemiş.".to_string();
    }
    let mut out = format!("Toplam {} uygulama:\n", apps.len());
    for (i, app) in apps.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} ({})\n",
            i + 1,
            app.name,
            app.category.display_name()
        ));
    }
    out
}

// ============ Assistant ============

#[derive(Debug, Clone)]
struct PendingDelete {
    id: String,
    name: String,
}

const CONFIRM_WORDS: &[&str] = &["evet", "yes"];

pub struct Assistant<S: CatalogStore> {
    catalog: Arc<Catalog<S>>,
    model: Option<Box<dyn ConversationModel>>,
    finder: Option<Box<dyn AppFinder>>,
    router: IntentRouter,
    pending_delete: Mutex<Option<PendingDelete>>,
}

impl<S: CatalogStore> Assistant<S> {
    pub fn new(catalog: Arc<Catalog<S>>) -> Self {
        Self {
            catalog,
            model: None,
            finder: None,
            router: IntentRouter::default(),
            pending_delete: Mutex::new(None),
        }
    }

    pub fn with_model(mut self, model: Box<dyn ConversationModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_finder(mut self, finder: Box<dyn AppFinder>) -> Self {
        self.finder = Some(finder);
        self
    }

    /// Whether a delete is waiting for confirmation.
    pub fn awaiting_confirmation(&self) -> bool {
        self.pending_delete
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Answer one utterance.
    pub async fn respond(&self, utterance: &str) -> String {
        let pending = self
            .pending_delete
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(pending) = pending {
            return self.finish_delete(pending, utterance);
        }

        let routed = self.interpret(utterance).await;
        self.execute(routed).await
    }

    /// Run the strategy list: remote model, then the local router.
    pub async fn interpret(&self, utterance: &str) -> Routed {
        if let Some(model) = self.model.as_ref().filter(|m| m.is_available()) {
            let context = ConversationContext::snapshot(self.catalog.list(None), Local::now());
            match model.send(utterance, &context).await {
                Ok(raw) => match parse_tagged_action(&raw) {
                    Ok(action) => return action.routed,
                    Err(ParseError::NoTaggedAction) => {
                        return Routed::Execute(Intent::Chat(ChatReply::Text(
                            raw.trim().to_string(),
                        )))
                    }
                    Err(ParseError::Empty) => {
                        tracing::debug!(model = model.name(), "empty model reply, routing locally");
                    }
                },
                Err(e) => {
                    tracing::warn!(model = model.name(), "model unavailable, routing locally: {}", e);
                }
            }
        }
        self.router.route(utterance)
    }

    async fn execute(&self, routed: Routed) -> String {
        let intent = match routed {
            Routed::Execute(intent) => intent,
            Routed::Clarify(op) => return op.clarification_prompt().to_string(),
        };
        match intent {
            Intent::Add { app_name } => self.add(&app_name).await,
            Intent::Search { term } => self.search(&term),
            Intent::Update { app_name, category } => self.update(&app_name, category),
            Intent::Delete { app_name } => self.request_delete(&app_name),
            Intent::List { category } => self.list(category),
            Intent::Chat(reply) => reply.text().to_string(),
        }
    }

    async fn add(&self, app_name: &str) -> String {
        let Some(finder) = &self.finder else {
            return format!(
                "❌ \"{}\" aranamadı: App Store araması yapılandırılmamış.",
                app_name
            );
        };
        let hit = match finder.find(app_name).await {
            Ok(Some(hit)) => hit,
            Ok(None) => {
                return format!(
                    "❌ \"{}\" uygulaması App Store'da bulunamadı. Lütfen uygulama adını kontrol edin veya manuel olarak ekleyin.",
                    app_name
                )
            }
            Err(e) => return format!("❌ Uygulama aranırken bir hata oluştu: {}", e),
        };

        let draft = normalize(hit.raw, &hit.url);
        match self.catalog.add(draft) {
            Ok(record) => format!(
                "✅ \"{}\" uygulaması App Store'da bulundu ve {} kategorisine eklendi!",
                record.name,
                record.category.display_name()
            ),
            Err(CatalogError::Validation { missing }) => format!(
                "❌ \"{}\" eklenemedi, eksik alanlar: {}",
                app_name,
                missing.join(", ")
            ),
            Err(e) => format!("❌ \"{}\" eklenemedi: {}", app_name, e),
        }
    }

    fn search(&self, term: &str) -> String {
        let results = self.catalog.search(term);
        if results.is_empty() {
            return format!("❌ \"{}\" için uygulama bulunamadı.", term);
        }
        let mut out = format!("🔍 \"{}\" için {} uygulama bulundu:\n\n", term, results.len());
        for (i, app) in results.iter().enumerate() {
            let rating = if app.rating > 0.0 {
                format!("{}", app.rating)
            } else {
                "N/A".to_string()
            };
            out.push_str(&format!("{}. **{}**\n", i + 1, app.name));
            out.push_str(&format!("   📝 {}\n", app.description));
            out.push_str(&format!("   🏷️ Kategori: {}\n", app.category.display_name()));
            out.push_str(&format!("   ⭐ Değerlendirme: {}/5\n\n", rating));
        }
        out.trim_end().to_string()
    }

    fn update(&self, app_name: &str, category: Option<Category>) -> String {
        let Some(app) = self.catalog.find_by_name(app_name) else {
            return format!("❌ \"{}\" uygulaması bulunamadı.", app_name);
        };
        let Some(category) = category else {
            return describe(&app);
        };
        let patch = RecordPatch {
            category: Some(category),
            ..Default::default()
        };
        match self.catalog.update(&app.id, patch) {
            Ok(updated) => format!(
                "✅ \"{}\" uygulamasının kategorisi {} olarak güncellendi.",
                updated.name,
                updated.category.display_name()
            ),
            Err(e) => format!("❌ \"{}\" güncellenemedi: {}", app.name, e),
        }
    }

    fn request_delete(&self, app_name: &str) -> String {
        let Some(app) = self.catalog.find_by_name(app_name) else {
            return format!("❌ \"{}\" uygulaması bulunamadı.", app_name);
        };
        let reply = format!(
            "⚠️ \"{}\" uygulamasını silmek istediğinizden emin misiniz? \"Evet\" yazın.",
            app.name
        );
        *self
            .pending_delete
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(PendingDelete {
            id: app.id,
            name: app.name,
        });
        reply
    }

    fn finish_delete(&self, pending: PendingDelete, utterance: &str) -> String {
        let answer = utterance.trim().to_lowercase();
        if !CONFIRM_WORDS.contains(&answer.as_str()) {
            return format!("↩️ \"{}\" silme işlemi iptal edildi.", pending.name);
        }
        match self.catalog.delete(&pending.id) {
            Ok(removed) => format!("🗑️ \"{}\" uygulaması silindi.", removed.name),
            Err(e) if e.is_not_found() => {
                format!("❌ \"{}\" uygulaması artık mevcut değil.", pending.name)
            }
            Err(e) => format!("❌ \"{}\" silinemedi: {}", pending.name, e),
        }
    }

    fn list(&self, category: Option<Category>) -> String {
        let all = self.catalog.list(None);
        if all.is_empty() {
            return "📱 Henüz uygulama eklenmemiş.".to_string();
        }
        let apps: Vec<CatalogRecord> = match category {
            Some(c) => all.into_iter().filter(|a| a.category == c).collect(),
            None => all,
        };
        if apps.is_empty() {
            let name = category.map(|c| c.display_name()).unwrap_or_default();
            return format!("❌ \"{}\" kategorisinde uygulama bulunamadı.", name);
        }

        let mut out = match category {
            Some(c) => format!(
                "📱 \"{}\" kategorisinde {} uygulama:\n\n",
                c.display_name(),
                apps.len()
            ),
            None => format!("📱 Toplam {} uygulama:\n\n", apps.len()),
        };
        for (category, members) in group_by_category(&apps) {
            out.push_str(&format!(
                "**{}** ({} uygulama):\n",
                category.display_name(),
                members.len()
            ));
            for app in members {
                out.push_str(&format!("• {}\n", app.name));
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

/// Group records by category, in order of each category's first appearance.
fn group_by_category(apps: &[CatalogRecord]) -> Vec<(Category, Vec<&CatalogRecord>)> {
    let mut groups: Vec<(Category, Vec<&CatalogRecord>)> = Vec::new();
    for app in apps {
        match groups.iter_mut().find(|(c, _)| *c == app.category) {
            Some((_, members)) => members.push(app),
            None => groups.push((app.category, vec![app])),
        }
    }
    groups
}

fn describe(app: &CatalogRecord) -> String {
    let mut out = format!("✏️ **{}** {}\n", app.name, app.icon);
    out.push_str(&format!("   📝 {}\n", app.description));
    out.push_str(&format!("   🏷️ Kategori: {}\n", app.category.display_name()));
    if !app.version.is_empty() {
        out.push_str(&format!("   🔢 Sürüm: {}\n", app.version));
    }
    if let Some(url) = &app.download_url {
        out.push_str(&format!("   🔗 {}\n", url));
    }
    out.push_str(&format!(
        "\nKategoriyi değiştirmek için örneğin: \"{} uygulamasını tasarım olarak düzenle\"",
        app.name
    ));
    out
}

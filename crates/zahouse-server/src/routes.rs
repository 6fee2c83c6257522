use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Multipart, Query, State},
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Json, Response,
    },
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use tracing::{info, warn};
use zahouse_agent::CompletionRequest;
use zahouse_core::{
    document::extract_document,
    gate::{
        check_email_gate, is_valid_email, normalize_email, select_mode, should_search,
        thread_id_or_new, AuditRequest,
    },
    mailer::{self, send_in_background},
    prompt::{assemble, format_search_results, PromptBudget, PromptInputs, PERSONA},
    report::render_report,
    store::CaptureOutcome,
    ChatTurn, Mode, NewInquiry, SearchResult, UploadedDocument,
};

use crate::{
    error::{internal, ApiError},
    logging::replay_and_follow,
    AppState,
};

const FALLBACK_SEARCH_QUERY: &str = "music recording contract industry standard terms";

// ── Request body types ────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChatBody {
    #[serde(default)]
    pub message: String,
    pub thread_id: Option<String>,
    pub search: Option<bool>,
}

#[derive(Deserialize)]
pub(crate) struct CaptureLeadBody {
    #[serde(default)]
    pub email: String,
    pub name: Option<String>,
    pub source: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct ReportBody {
    #[serde(default)]
    pub analysis: String,
    pub title: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct KeyQuery {
    pub key: Option<String>,
}

struct Upload {
    filename: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

// ── Health / status ───────────────────────────────────────────────────────

pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let leads = state.leads.count().await.map_err(internal)?;
    let inquiries = state.inquiries.count().await.map_err(internal)?;
    Ok(Json(json!({
        "provider": state.backend.name(),
        "model": state.backend.model(),
        "uptime_s": state.start_time.elapsed().as_secs(),
        "knowledge_sources": state.knowledge.sources(),
        "search_enabled": state.config.search_enabled(),
        "mail_enabled": state.mailer.is_enabled(),
        "require_email_for_audit": state.config.require_email_for_audit,
        "threads": state.memory.thread_count().await,
        "leads": leads,
        "inquiries": inquiries,
    })))
}

// ── Audit / chat ──────────────────────────────────────────────────────────

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

async fn read_audit_form(
    mut multipart: Multipart,
) -> Result<(AuditRequest, Option<Upload>, Option<String>), ApiError> {
    let mut req = AuditRequest::default();
    let mut upload = None;
    let mut name = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" | "contract" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                // Browsers send an empty part when no file was chosen.
                if !(bytes.is_empty() && filename.is_empty()) {
                    upload = Some(Upload {
                        filename,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            },
            other => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                match other {
                    "message" => req.message = Some(value),
                    "threadId" | "thread_id" => req.thread_id = Some(value),
                    "email" => req.email = Some(value),
                    "name" => name = Some(value),
                    "search" => req.search = parse_flag(&value),
                    _ => {},
                }
            },
        }
    }
    req.has_file = upload.is_some();
    Ok((req, upload, name))
}

pub(crate) async fn audit(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (req, upload, name) = read_audit_form(multipart).await?;
    let mode = select_mode(&req)?;
    let email = check_email_gate(mode, req.email.as_deref(), state.config.require_email_for_audit)?;

    if let Some(email) = &email {
        capture_lead(&state, email, name, "audit").await;
    }

    let document = match upload {
        Some(upload) => {
            info!(
                filename = %upload.filename,
                bytes = upload.bytes.len(),
                "contract uploaded"
            );
            let doc = tokio::task::spawn_blocking(move || {
                extract_document(&upload.filename, upload.content_type.as_deref(), &upload.bytes)
            })
            .await
            .map_err(internal)??;
            Some(doc)
        },
        None => None,
    };

    let thread_id = thread_id_or_new(req.thread_id.as_deref(), state.backend.name());
    respond(&state, mode, req.message(), document.as_ref(), &thread_id, req.search).await
}

pub(crate) async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let req = AuditRequest {
        message: Some(body.message),
        thread_id: body.thread_id,
        search: body.search,
        ..AuditRequest::default()
    };
    let mode = select_mode(&req)?;
    let thread_id = thread_id_or_new(req.thread_id.as_deref(), state.backend.name());
    respond(&state, mode, req.message(), None, &thread_id, req.search).await
}

async fn run_search(state: &AppState, query: &str) -> Option<Vec<SearchResult>> {
    match state.search.search(query, state.config.search_max_results).await {
        Ok(results) => Some(results),
        Err(e) => {
            warn!("web search failed, continuing without it: {e:#}");
            None
        },
    }
}

/// Shared tail of `/audit` and `/chat`: search, assemble, complete, remember.
async fn respond(
    state: &AppState,
    mode: Mode,
    message: Option<&str>,
    document: Option<&UploadedDocument>,
    thread_id: &str,
    explicit_search: Option<bool>,
) -> Result<Json<Value>, ApiError> {
    let wants_search = should_search(mode, message, explicit_search, state.config.search_enabled());
    let results = if wants_search {
        run_search(state, message.unwrap_or(FALLBACK_SEARCH_QUERY)).await
    } else {
        None
    };
    let searched = results.is_some();
    let results = results.unwrap_or_default();
    let search_text = format_search_results(&results);

    let history = state.memory.history(thread_id).await;
    let prompt = assemble(
        PromptInputs {
            mode,
            persona: PERSONA,
            knowledge: state.knowledge.text(),
            search: &search_text,
            document: document.map(|d| d.text.as_str()),
            message,
            history: &history,
        },
        PromptBudget::from_config(&state.config),
    );
    let messages = prompt.messages();

    info!(
        mode = mode.as_str(),
        thread_id,
        history_turns = prompt.history.len(),
        dropped_turns = history.len() - prompt.history.len(),
        history_chars = prompt.history_chars,
        kb_chars = prompt.kb_chars,
        search_chars = prompt.search_chars,
        doc_chars = prompt.doc_chars,
        est_tokens = prompt.estimated_tokens(),
        "prompt assembled"
    );

    let reply = state
        .backend
        .complete(CompletionRequest {
            system: prompt.system,
            messages,
            temperature: state.config.temperature,
            max_tokens: state.config.max_tokens,
        })
        .await?;

    state
        .memory
        .record(thread_id, ChatTurn::user(prompt.user), ChatTurn::assistant(reply.clone()))
        .await;

    let sources: Vec<Value> = results
        .iter()
        .map(|r| json!({ "title": r.title, "url": r.url }))
        .collect();
    let mut body = json!({
        "response": reply,
        "threadId": thread_id,
        "mode": mode,
        "searched": searched,
        "sources": sources,
    });
    if mode == Mode::Audit {
        body["analysis"] = json!(reply);
    }
    Ok(Json(body))
}

// ── Leads / inquiries ─────────────────────────────────────────────────────

/// Store the lead and welcome first-timers. Storage failures are logged, not returned.
async fn capture_lead(state: &AppState, email: &str, name: Option<String>, source: &str) {
    let welcome_name = name.clone();
    match state.leads.capture(email, name, source).await {
        Ok(CaptureOutcome::Created) => send_in_background(
            Arc::clone(&state.mailer),
            mailer::lead_welcome(email, welcome_name.as_deref()),
        ),
        Ok(CaptureOutcome::Duplicate) => {},
        Err(e) => warn!(email, "lead capture failed: {e:#}"),
    }
}

pub(crate) async fn capture_lead_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CaptureLeadBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let email = normalize_email(&body.email);
    if !is_valid_email(&email) {
        return Err(ApiError::BadRequest("A valid email address is required.".into()));
    }
    let source = body
        .source
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("website")
        .to_string();

    let outcome = state
        .leads
        .capture(&email, body.name.clone(), &source)
        .await
        .map_err(internal)?;
    if outcome == CaptureOutcome::Created {
        send_in_background(
            Arc::clone(&state.mailer),
            mailer::lead_welcome(&email, body.name.as_deref()),
        );
    }
    Ok(Json(json!({
        "success": true,
        "duplicate": outcome == CaptureOutcome::Duplicate,
    })))
}

pub(crate) async fn submit_inquiry(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewInquiry>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(new) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if new.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Name is required.".into()));
    }
    if !is_valid_email(&normalize_email(&new.email)) {
        return Err(ApiError::BadRequest("A valid email address is required.".into()));
    }
    if new.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message is required.".into()));
    }

    let inquiry = state.inquiries.submit(new).await.map_err(internal)?;

    send_in_background(Arc::clone(&state.mailer), mailer::inquiry_auto_reply(&inquiry));
    if !state.config.admin_email.is_empty() {
        send_in_background(
            Arc::clone(&state.mailer),
            mailer::inquiry_admin_notice(&inquiry, &state.config.admin_email),
        );
    }

    Ok(Json(json!({ "success": true, "id": inquiry.id })))
}

// ── Report ────────────────────────────────────────────────────────────────

pub(crate) async fn generate_report(
    body: Result<Json<ReportBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if body.analysis.trim().is_empty() {
        return Err(ApiError::BadRequest("Nothing to put in the report.".into()));
    }
    let title = body
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "ZaHouse Contract Audit".to_string());

    let bytes = tokio::task::spawn_blocking(move || render_report(&title, &body.analysis))
        .await
        .map_err(internal)?
        .map_err(internal)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"zahouse-audit.pdf\"",
            ),
        ],
        bytes,
    )
        .into_response())
}

// ── Admin ─────────────────────────────────────────────────────────────────

fn check_admin_key(state: &AppState, key: Option<&str>) -> Result<(), ApiError> {
    if state.config.admin_key.is_empty() || key == Some(state.config.admin_key.as_str()) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub(crate) async fn admin(
    State(state): State<Arc<AppState>>,
    Query(q): Query<KeyQuery>,
) -> Result<Html<String>, ApiError> {
    check_admin_key(&state, q.key.as_deref())?;
    let leads = state.leads.list().await.map_err(internal)?;
    let inquiries = state.inquiries.list().await.map_err(internal)?;

    let lead_rows: String = leads
        .iter()
        .map(|l| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&l.email),
                escape_html(l.name.as_deref().unwrap_or("")),
                escape_html(&l.source),
                l.created_at.format("%Y-%m-%d %H:%M"),
            )
        })
        .collect();

    let inquiry_rows: String = inquiries
        .iter()
        .map(|i| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&i.id),
                escape_html(&i.name),
                escape_html(&i.email),
                escape_html(i.artist_name.as_deref().unwrap_or("")),
                escape_html(&i.inquiry_type),
                escape_html(&i.message),
                i.created_at.format("%Y-%m-%d %H:%M"),
            )
        })
        .collect();

    let logs_url = match q.key.as_deref() {
        Some(k) => format!("/api/logs?key={}", urlencoding::encode(k)),
        None => "/api/logs".to_string(),
    };
    // Percent-encoding leaves no quote or angle bracket for the script context.
    let logs_url = serde_json::to_string(&logs_url).map_err(internal)?;

    Ok(Html(format!(
        r#"<!doctype html>
<html><head><meta charset="utf-8"><title>ZaHouse Admin</title>
<style>
body{{font-family:system-ui,sans-serif;background:#0b0b0b;color:#eee;margin:2rem}}
h1,h2{{color:#d4af37}}
table{{border-collapse:collapse;width:100%;margin-bottom:2rem}}
td,th{{border:1px solid #333;padding:.4rem;text-align:left;vertical-align:top}}
#logs{{background:#111;height:16rem;overflow:auto;font:12px monospace;padding:.5rem}}
</style></head><body>
<h1>ZaHouse Admin</h1>
<p>Provider: {provider} ({model})</p>
<h2>Leads ({lead_count})</h2>
<table><tr><th>Email</th><th>Name</th><th>Source</th><th>Captured</th></tr>{lead_rows}</table>
<h2>Inquiries ({inquiry_count})</h2>
<table><tr><th>ID</th><th>Name</th><th>Email</th><th>Artist</th><th>Type</th><th>Message</th><th>Received</th></tr>{inquiry_rows}</table>
<h2>Live log</h2>
<div id="logs"></div>
<script>
const box = document.getElementById('logs');
const es = new EventSource({logs_url});
es.onmessage = (e) => {{
  try {{
    const l = JSON.parse(e.data);
    const row = document.createElement('div');
    row.textContent = `[${{l.level}}] ${{l.category}}: ${{l.message}}`;
    box.appendChild(row);
    box.scrollTop = box.scrollHeight;
  }} catch (_) {{}}
}};
</script>
</body></html>"#,
        provider = escape_html(state.backend.name()),
        model = escape_html(state.backend.model()),
        lead_count = leads.len(),
        inquiry_count = inquiries.len(),
    )))
}

// ── SSE logs ──────────────────────────────────────────────────────────────

pub(crate) async fn sse_logs(
    State(state): State<Arc<AppState>>,
    Query(q): Query<KeyQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>>, ApiError>
{
    check_admin_key(&state, q.key.as_deref())?;
    let stream = replay_and_follow(&state.log_tx, &state.log_ring)
        .map(|data| Ok::<_, std::convert::Infallible>(Event::default().data(data)));
    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("ping"),
    ))
}

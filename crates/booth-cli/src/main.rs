use std::fs;
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use booth_contracts::catalog::WardrobeCatalog;
use booth_contracts::events::{BoothEvent, CaptureSource, SessionLog};
use booth_contracts::prompt::{
    build_enhanced_prompt, compose_directives, directives_submittable, BACKGROUND_BLEND_NOTE,
};
use booth_contracts::screens::{
    Modal, NavigationError, Screen, ScreenNavigator, TransitionHooks, DEFAULT_NAVIGATION_COOLDOWN,
};
use booth_contracts::selection::SelectionStore;
use booth_contracts::share::{best_share_link, is_valid_email, qr_code_url};
use booth_engine::capture::{CaptureNegotiator, CaptureSession, Facing, StillImageBackend};
use booth_engine::crop::crop_to_portrait_data_uri;
use booth_engine::delivery::{decode_image_payload, EmailConfig, EmailDelivery};
use booth_engine::{
    error_chain_text, is_data_image_url, EditRequest, FalAdapter, GoogleAdapter,
    ImageEditProvider, RunwareAdapter, TransformOrchestrator, TransformResult,
};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tiny_http::{Header, Method, Response, Server};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "booth", version, about = "Virtual try-on photo booth")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API used by booth front-ends.
    Serve(ServeArgs),
    /// Run an interactive kiosk session on the terminal.
    Kiosk(KioskArgs),
    /// Apply one transform to an image file and exit.
    Transform(TransformArgs),
    /// Print provider and email configuration status.
    Health,
    /// Email a rendered result to a guest.
    SendEmail(SendEmailArgs),
}

#[derive(Debug, Parser)]
struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    #[arg(long, default_value_t = 3000)]
    port: u16,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    wardrobe: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct KioskArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    /// Image file standing in for the booth camera.
    #[arg(long)]
    camera: Option<PathBuf>,
    #[arg(long)]
    wardrobe: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct TransformArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct SendEmailArgs {
    #[arg(long)]
    to: String,
    #[arg(long)]
    image: PathBuf,
}

const LOADING_MESSAGES: &[&str] = &[
    "Pinning hems and adjusting the fit... \u{2702}\u{fe0f}",
    "Threading the perfect style together... \u{1f9f6}",
    "Sliding on those statement sunglasses... \u{1f576}\u{fe0f}",
    "Buttoning up your sharp blazer... \u{1f454}",
    "Wrapping you in cozy outerwear... \u{1f9e5}",
    "Slipping into your favorite tee... \u{1f455}",
    "Twirling in your dream dress... \u{1f457}",
    "Zipping up your go-to jeans... \u{1f456}",
    "Stepping into fresh sneakers... \u{1f45f}",
    "Stomping in sturdy boots... \u{1f97e}",
    "Clicking in those heels... \u{1f461}",
    "Shopping for the perfect accessories... \u{1f6cd}\u{fe0f}",
    "Carrying your chic handbag... \u{1f45c}",
    "Topping off with the perfect cap... \u{1f9e2}",
    "Crowning with a stylish hat... \u{1f452}",
    "Sketching your style vision... \u{270f}\u{fe0f}",
    "Adding sparkle to your look... \u{2728}",
    "Pinning every detail in place... \u{1f4cc}",
];

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("booth error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => {
            run_serve(args)?;
            Ok(0)
        }
        Command::Kiosk(args) => {
            run_kiosk(args)?;
            Ok(0)
        }
        Command::Transform(args) => run_transform(args),
        Command::Health => {
            println!("{}", serde_json::to_string_pretty(&health_payload())?);
            Ok(0)
        }
        Command::SendEmail(args) => {
            run_send_email(args)?;
            Ok(0)
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP server

struct ServerState {
    orchestrator: TransformOrchestrator,
    email: Option<EmailDelivery>,
    wardrobe_json: String,
}

fn run_serve(args: ServeArgs) -> Result<()> {
    let mut orchestrator = TransformOrchestrator::from_env();
    if let Some(events) = &args.events {
        orchestrator =
            orchestrator.with_log(SessionLog::create(events, Uuid::new_v4().to_string())?);
    }
    let catalog = load_catalog(args.wardrobe.as_deref());
    let state = ServerState {
        orchestrator,
        email: EmailDelivery::from_env(),
        wardrobe_json: serde_json::to_string(&catalog)?,
    };

    let addr = format!("{}:{}", args.host, args.port);
    let server = Server::http(&addr)
        .map_err(|err| anyhow::anyhow!("failed to bind {addr}: {err}"))?;
    println!("Booth server listening on http://{addr}");
    println!("{}", serde_json::to_string(&health_payload())?);

    for mut request in server.incoming_requests() {
        let response = handle_request(&state, &mut request);
        if let Err(err) = request.respond(response) {
            eprintln!("booth: failed to write response: {err}");
        }
    }
    Ok(())
}

fn handle_request(
    state: &ServerState,
    request: &mut tiny_http::Request,
) -> Response<io::Cursor<Vec<u8>>> {
    let method = request.method().clone();
    let url = request.url().to_string();
    match (method, url.as_str()) {
        (Method::Options, _) => preflight_response(),
        (Method::Get, "/api/health") => json_response(200, health_payload()),
        (Method::Get, "/data/wardrobe.json") => raw_json_response(200, state.wardrobe_json.clone()),
        (Method::Post, "/api/send-email") => match read_body(request) {
            Ok(body) => {
                let (code, payload) = handle_send_email(state, &body);
                json_response(code, payload)
            }
            Err(_) => json_response(400, json!({ "error": "Unreadable request body" })),
        },
        (Method::Post, path) if path.starts_with("/api/transform/") => {
            let provider = path["/api/transform/".len()..].to_string();
            match read_body(request) {
                Ok(body) => {
                    let (code, payload) = handle_transform(state, &provider, &body);
                    json_response(code, payload)
                }
                Err(_) => json_response(400, json!({ "error": "Unreadable request body" })),
            }
        }
        _ => json_response(404, json!({ "error": "Not found" })),
    }
}

fn handle_transform(state: &ServerState, provider: &str, body: &str) -> (u16, Value) {
    let provider = match provider {
        "runware" | "fal" | "google" => provider,
        _ => return (404, json!({ "error": "Unknown provider" })),
    };
    let payload: Value = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) => return (400, json!({ "error": "Invalid JSON body" })),
    };
    let image = payload.get("image").and_then(Value::as_str).unwrap_or("");
    if !is_data_image_url(image) {
        return (
            400,
            json!({ "error": "Invalid or missing image (must be data URL)." }),
        );
    }
    let prompt = payload.get("prompt").and_then(Value::as_str).unwrap_or("");
    if prompt.trim().is_empty() {
        return (400, json!({ "error": "Missing prompt." }));
    }

    let extra = (provider == "google").then_some(BACKGROUND_BLEND_NOTE);
    let enhanced = build_enhanced_prompt(prompt, extra);
    let request = EditRequest::new(image, enhanced);
    match state.orchestrator.transform_with_preferred(provider, &request) {
        Ok(result) => {
            let image_url = result
                .public_url
                .clone()
                .unwrap_or_else(|| result.data_uri.clone());
            let mut body = json!({
                "success": true,
                "image_url": image_url,
                "data_url": result.data_uri,
                "prompt_used": result.prompt_used,
                "provider": result.provider,
            });
            // real_url is only present when republishing produced one.
            if let Some(url) = &result.public_url {
                body["real_url"] = json!(url);
            }
            (200, body)
        }
        Err(err) => (
            500,
            json!({
                "error": "Transform failed",
                "details": error_chain_text(&err, 500),
            }),
        ),
    }
}

fn handle_send_email(state: &ServerState, body: &str) -> (u16, Value) {
    let payload: Value = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) => return (400, json!({ "error": "Invalid JSON body" })),
    };
    let to = payload.get("to").and_then(Value::as_str).unwrap_or("");
    if to.is_empty() {
        return (400, json!({ "error": "Missing 'to' address" }));
    }
    if !is_valid_email(to) {
        return (400, json!({ "error": "Invalid email address" }));
    }
    let image = payload
        .get("imageUrl")
        .or_else(|| payload.get("image"))
        .and_then(Value::as_str)
        .unwrap_or("");
    if image.is_empty() {
        return (400, json!({ "error": "Missing image payload" }));
    }
    let Some(email) = &state.email else {
        return (500, json!({ "error": "Email is not configured" }));
    };
    let bytes = match decode_image_payload(image) {
        Ok(bytes) => bytes,
        Err(_) => return (400, json!({ "error": "Invalid image payload" })),
    };
    match email.send_result(to, &bytes) {
        Ok(()) => (200, json!({ "ok": true })),
        Err(err) => (
            500,
            json!({
                "error": "Email send failed",
                "details": error_chain_text(&err, 500),
            }),
        ),
    }
}

fn health_payload() -> Value {
    json!({
        "status": "ok",
        "runwareConfigured": RunwareAdapter::new().configured(),
        "falConfigured": FalAdapter::new().configured(),
        "googleImagenConfigured": GoogleAdapter::new().configured(),
        "emailConfigured": EmailConfig::from_env().is_some(),
    })
}

// Generous enough for a base64 portrait plus prompt text.
const MAX_BODY_BYTES: u64 = 20 * 1024 * 1024;

fn read_body(request: &mut tiny_http::Request) -> Result<String> {
    read_bounded(request.as_reader(), MAX_BODY_BYTES)
}

fn read_bounded(reader: impl Read, limit: u64) -> Result<String> {
    let mut body = String::new();
    reader
        .take(limit)
        .read_to_string(&mut body)
        .context("reading request body")?;
    Ok(body)
}

const PREFLIGHT_HEADERS: &[(&str, &str)] = &[
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

fn preflight_response() -> Response<io::Cursor<Vec<u8>>> {
    let mut response = Response::from_string(String::new()).with_status_code(204);
    for (name, value) in PREFLIGHT_HEADERS {
        if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            response.add_header(header);
        }
    }
    response
}

fn json_response(code: u16, value: Value) -> Response<io::Cursor<Vec<u8>>> {
    raw_json_response(code, value.to_string())
}

fn raw_json_response(code: u16, body: String) -> Response<io::Cursor<Vec<u8>>> {
    let mut response = Response::from_string(body).with_status_code(code);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response.add_header(header);
    }
    if let Ok(header) = Header::from_bytes(&b"Access-Control-Allow-Origin"[..], &b"*"[..]) {
        response.add_header(header);
    }
    response
}

// ---------------------------------------------------------------------------
// One-shot commands

fn run_transform(args: TransformArgs) -> Result<i32> {
    let bytes = fs::read(&args.image)
        .with_context(|| format!("failed reading {}", args.image.display()))?;
    let data_uri = crop_to_portrait_data_uri(&bytes)?;

    let mut orchestrator = TransformOrchestrator::from_env();
    if let Some(events) = &args.events {
        orchestrator =
            orchestrator.with_log(SessionLog::create(events, Uuid::new_v4().to_string())?);
    }

    let provider = args.provider.as_deref();
    let extra = (provider == Some("google")).then_some(BACKGROUND_BLEND_NOTE);
    let request = EditRequest::new(data_uri, build_enhanced_prompt(&args.prompt, extra));
    let result = match provider {
        Some(name) => orchestrator.transform_with_preferred(name, &request)?,
        None => orchestrator.transform(&request)?,
    };

    if let Some(parent) = args.out.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.out, &result.bytes)
        .with_context(|| format!("failed writing {}", args.out.display()))?;
    println!("Saved {} ({})", args.out.display(), result.provider);
    if let Some(url) = &result.public_url {
        println!("Public link: {url}");
    }
    Ok(0)
}

fn run_send_email(args: SendEmailArgs) -> Result<()> {
    let Some(email) = EmailDelivery::from_env() else {
        bail!("email is not configured; set SMTP_HOST, SMTP_USER and SMTP_PASS");
    };
    let bytes = fs::read(&args.image)
        .with_context(|| format!("failed reading {}", args.image.display()))?;
    email.send_result(&args.to, &bytes)?;
    println!("Sent result to {}", args.to);
    Ok(())
}

// ---------------------------------------------------------------------------
// Kiosk

fn run_kiosk(args: KioskArgs) -> Result<()> {
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let log = SessionLog::create(&events_path, Uuid::new_v4().to_string())?;
    let orchestrator = TransformOrchestrator::from_env().with_log(log.clone());
    let email = EmailDelivery::from_env();
    let catalog = load_catalog(args.wardrobe.as_deref());

    let backend = StillImageBackend::new(args.camera.clone().unwrap_or_default());
    let mut session = CaptureSession::new(CaptureNegotiator::new(Box::new(backend), Facing::User));
    let mut navigator = ScreenNavigator::new();
    let mut store = SelectionStore::new();
    store.seed_labels(catalog.labels());

    let mut additional_note = String::new();
    let mut general_outfit = String::new();
    let mut last_result: Option<TransformResult> = None;
    let mut loading_step = 0usize;

    println!("Booth kiosk started on the welcome screen. Type /help for commands.");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("[{}] > ", navigator.active());
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let (command, rest) = split_command(input);
        if command.is_empty() {
            continue;
        }

        match command {
            "/help" => {
                println!("Session: /start /capture /upload <path> /switch /back /reset /quit");
                println!("Styling: /categories /items <category> /pick <category> <item>");
                println!("         /custom <category> <text> /remove <category> /clear /selections");
                println!("         /note <text> /outfit <text>");
                println!("Render:  /render [provider] /share /email <address>");
            }
            "/start" => {
                let outcome = navigator.navigate_with(
                    Screen::Camera,
                    TransitionHooks::new().before(|| {
                        match session.start_camera() {
                            Ok(()) => println!("Camera ready ({})", session.facing().as_str()),
                            Err(err) => println!("{err}"),
                        }
                        Ok(())
                    }),
                );
                match outcome {
                    Ok(()) => {
                        log.record(BoothEvent::ScreenChanged {
                            to: "camera".to_string(),
                        })?;
                    }
                    Err(err) => println!("Cannot start: {err}"),
                }
            }
            "/switch" => match session.switch_camera() {
                Ok(()) => println!("Now facing {}", session.facing().as_str()),
                Err(err) => println!("{err}"),
            },
            "/capture" => {
                if navigator.active() != Screen::Camera {
                    println!("Capture only works on the camera screen; /start first");
                    continue;
                }
                if !session.has_feed() {
                    println!("No live camera; use /upload <path> instead");
                    continue;
                }
                session.start_countdown();
                while let Some(countdown) = session.countdown() {
                    println!("{}...", countdown.remaining());
                    thread::sleep(Duration::from_secs(1));
                    session.tick_countdown();
                }
                if let Err(err) = session.capture_photo() {
                    println!("Capture failed: {err:#}");
                    continue;
                }
                log.record(BoothEvent::PhotoCaptured {
                    source: CaptureSource::Camera,
                })?;
                advance_after_capture(&mut navigator, &log)?;
            }
            "/upload" => {
                if navigator.active() != Screen::Camera {
                    println!("Upload only works on the camera screen; /start first");
                    continue;
                }
                if rest.is_empty() {
                    println!("/upload requires a path");
                    continue;
                }
                let bytes = match fs::read(rest) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        println!("Cannot read {rest}: {err}");
                        continue;
                    }
                };
                if let Err(err) = session.accept_upload(&bytes) {
                    println!("Upload rejected: {err:#}");
                    continue;
                }
                log.record(BoothEvent::PhotoCaptured {
                    source: CaptureSource::Upload,
                })?;
                advance_after_capture(&mut navigator, &log)?;
            }
            "/back" => {
                let target = match navigator.active() {
                    Screen::Camera => Some(Screen::Welcome),
                    Screen::Character => Some(Screen::Camera),
                    Screen::Result => Some(Screen::Welcome),
                    _ => None,
                };
                let Some(target) = target else {
                    println!("Nothing to go back to from here");
                    continue;
                };
                match settle_navigate(&mut navigator, target) {
                    Ok(()) => {
                        if target == Screen::Welcome {
                            session.stop_camera();
                        } else if let Err(err) = session.start_camera() {
                            println!("{err}");
                        }
                        log.record(BoothEvent::ScreenChanged {
                            to: target.as_str().to_string(),
                        })?;
                    }
                    Err(err) => println!("Cannot go back: {err}"),
                }
            }
            "/categories" => {
                for category in &catalog.categories {
                    println!("{} {} ({})", category.emoji, category.label, category.id);
                }
            }
            "/items" => {
                let Some(category) = catalog.get(rest) else {
                    println!("Unknown category: {rest}");
                    continue;
                };
                for item in &category.items {
                    println!("{} ({})", item.name, item.id);
                }
            }
            "/pick" => {
                let (category_id, item_name) = split_command(rest);
                let Some(category) = catalog.get(category_id) else {
                    println!("Unknown category: {category_id}");
                    continue;
                };
                let Some(item) = category.item(item_name) else {
                    println!("No item '{item_name}' in {}; try /items {category_id}", category.label);
                    continue;
                };
                store.select_preset(category_id, &item.name, item.descriptor());
                log.record(BoothEvent::SelectionChanged {
                    category: category_id.to_string(),
                    choice: item.name.clone(),
                })?;
                println!("{}: {}", category.label, item.name);
            }
            "/custom" => {
                let (category_id, text) = split_command(rest);
                if text.is_empty() {
                    println!("/custom requires a category and a description");
                    continue;
                }
                let label = catalog.label_for(category_id).unwrap_or(category_id);
                store.select_custom(category_id, label, text);
                log.record(BoothEvent::SelectionChanged {
                    category: category_id.to_string(),
                    choice: text.to_string(),
                })?;
                println!("{label}: {text}");
            }
            "/remove" => {
                if store.remove(rest) {
                    println!("Removed {rest}");
                } else {
                    println!("No selection for {rest}");
                }
            }
            "/clear" => {
                store.clear();
                println!("Selections cleared");
            }
            "/selections" => {
                if store.is_empty() {
                    println!("No selections yet");
                }
                for selection in store.list() {
                    println!("{}: {}", selection.label, selection.display_value);
                }
            }
            "/note" => {
                additional_note = rest.to_string();
                println!("Additional direction set");
            }
            "/outfit" => {
                general_outfit = rest.to_string();
                println!("General outfit direction set");
            }
            "/render" => {
                if navigator.active() != Screen::Character {
                    println!("Render only works on the styling screen");
                    continue;
                }
                let Some(image) = session.captured_image().map(str::to_string) else {
                    println!("No captured photo yet");
                    continue;
                };
                let directives = compose_directives(&store, &additional_note, &general_outfit);
                if !directives_submittable(&directives) {
                    println!("Add at least one selection or note before rendering");
                    continue;
                }
                if let Err(err) = settle_navigate(&mut navigator, Screen::Loading) {
                    println!("Cannot render: {err}");
                    continue;
                }
                println!("{}", LOADING_MESSAGES[loading_step % LOADING_MESSAGES.len()]);
                loading_step += 1;

                let preferred = rest.trim();
                let extra = (preferred == "google").then_some(BACKGROUND_BLEND_NOTE);
                let request = EditRequest::new(image, build_enhanced_prompt(&directives, extra));
                let outcome = if preferred.is_empty() {
                    orchestrator.transform(&request)
                } else {
                    orchestrator.transform_with_preferred(preferred, &request)
                };
                match outcome {
                    Ok(result) => {
                        let saved = save_result(&args.out, &result)?;
                        println!("Saved {} ({})", saved.display(), result.provider);
                        last_result = Some(result);
                        settle_navigate(&mut navigator, Screen::Result)
                            .map_err(|err| anyhow::anyhow!("{err}"))?;
                        log.record(BoothEvent::ScreenChanged {
                            to: "result".to_string(),
                        })?;
                    }
                    Err(err) => {
                        println!("Transform failed: {}", error_chain_text(&err, 500));
                        settle_navigate(&mut navigator, Screen::Character)
                            .map_err(|err| anyhow::anyhow!("{err}"))?;
                    }
                }
            }
            "/share" => {
                let Some(result) = &last_result else {
                    println!("Nothing to share yet");
                    continue;
                };
                navigator.open_modal(Modal::Share);
                let link = best_share_link(result.public_url.as_deref(), &result.data_uri);
                match qr_code_url(link) {
                    Some(qr) => {
                        println!("Share link: {link}");
                        println!("QR code:    {qr}");
                    }
                    None => println!("No public link for this result; use /email instead"),
                }
                navigator.close_modal();
            }
            "/email" => {
                if !is_valid_email(rest) {
                    println!("'{rest}' does not look like an email address");
                    continue;
                }
                let Some(result) = &last_result else {
                    println!("Nothing to send yet");
                    continue;
                };
                let Some(email) = &email else {
                    println!("Email is not configured; set SMTP_HOST, SMTP_USER and SMTP_PASS");
                    continue;
                };
                match email.send_result(rest, &result.bytes) {
                    Ok(()) => {
                        log.record(BoothEvent::EmailSent {
                            to: rest.to_string(),
                        })?;
                        println!("Sent to {rest}");
                    }
                    Err(err) => println!("Email send failed: {}", error_chain_text(&err, 500)),
                }
            }
            "/reset" => {
                navigator.reset();
                session.reset();
                store.clear();
                additional_note.clear();
                general_outfit.clear();
                last_result = None;
                log.record(BoothEvent::SessionReset)?;
                println!("Back to the welcome screen");
            }
            "/quit" | "/exit" => break,
            _ => println!("Unknown command: {command}; type /help"),
        }
    }
    Ok(())
}

fn advance_after_capture(navigator: &mut ScreenNavigator, log: &SessionLog) -> Result<()> {
    match settle_navigate(navigator, Screen::Character) {
        Ok(()) => {
            log.record(BoothEvent::ScreenChanged {
                to: "character".to_string(),
            })?;
            println!("Photo captured; pick wardrobe items, then /render");
        }
        Err(err) => println!("Captured, but cannot advance: {err}"),
    }
    Ok(())
}

/// Navigation retried once after the cooldown window; back-to-back programmatic
/// transitions (loading then result) would otherwise trip it.
fn settle_navigate(navigator: &mut ScreenNavigator, to: Screen) -> Result<(), NavigationError> {
    match navigator.navigate(to) {
        Err(NavigationError::Cooldown) => {
            thread::sleep(DEFAULT_NAVIGATION_COOLDOWN);
            navigator.navigate(to)
        }
        other => other,
    }
}

fn load_catalog(path: Option<&Path>) -> WardrobeCatalog {
    let Some(path) = path else {
        return WardrobeCatalog::builtin();
    };
    match fs::read_to_string(path) {
        Ok(raw) => WardrobeCatalog::from_json_or_builtin(&raw),
        Err(err) => {
            eprintln!(
                "booth: cannot read {} ({err}); using the builtin wardrobe",
                path.display()
            );
            WardrobeCatalog::builtin()
        }
    }
}

fn save_result(out_dir: &Path, result: &TransformResult) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed creating {}", out_dir.display()))?;
    let ext = extension_for_data_uri(&result.data_uri);
    let path = out_dir.join(format!("result-{}.{ext}", Uuid::new_v4()));
    fs::write(&path, &result.bytes)
        .with_context(|| format!("failed writing {}", path.display()))?;
    Ok(path)
}

fn extension_for_data_uri(data_uri: &str) -> &'static str {
    if data_uri.starts_with("data:image/png") {
        "png"
    } else if data_uri.starts_with("data:image/webp") {
        "webp"
    } else {
        "jpg"
    }
}

fn split_command(input: &str) -> (&str, &str) {
    let trimmed = input.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    }
}

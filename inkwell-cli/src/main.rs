//! inkwell-cli: terminal front end for the Inkwell editor
//!
//! # Subcommands
//! - `write`                 interactive writing session with autosave and recovery
//! - `draft show|clear`      inspect or discard the autosave slot
//! - `seo`                   score a draft locally
//! - `suggest`               ask the server's assistant for suggestions
//! - `publish`               publish the autosaved draft
//! - `feed`                  list published posts, six per page, with optional search
//! - `like <post-id>`        toggle a like on a post
//! - `collab ...`            list, create, join or leave collaborations; invite; ask for feedback
//! - `status`                show server health

mod write;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use inkwell_core::models::{Collaboration, FeedbackRequest, Invitation, NewCollaboration, PostFilter};
use inkwell_core::seo::{self, SeoInput, SeoReport};
use inkwell_core::{
    CollaborationService, DraftStore, FileDraftStore, InkwellConfig, InkwellError, PostService, RestPostClient,
    SuggestionAction, SuggestionResponse,
};
use inkwell_editor::{Editor, EditorError, PublishOptions};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "inkwell-cli", version, about = "Inkwell writing tools for the terminal")]
struct Cli {
    /// Inkwell HTTP server URL (overrides INKWELL_HTTP_URL env var)
    #[arg(long, env = "INKWELL_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Config file (TOML). Missing file means defaults.
    #[arg(short, long, env = "INKWELL_CONFIG", default_value = "inkwell.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start an interactive writing session
    Write,

    /// Inspect or discard the autosaved draft
    Draft {
        #[command(subcommand)]
        action: DraftAction,
    },

    /// Score a draft against the SEO rules
    Seo {
        #[arg(long, default_value = "")]
        title: String,

        #[arg(long = "meta", default_value = "")]
        meta_description: String,

        /// Repeat for each keyword
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,

        /// Read content from a file instead of the autosaved draft
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Ask the assistant for writing suggestions
    Suggest {
        #[arg(long, value_enum, default_value_t = ActionArg::Generate)]
        action: ActionArg,

        /// Suggestions to avoid when regenerating
        #[arg(long)]
        prior: Vec<String>,

        /// Read the draft from a file instead of the autosave slot
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Publish the autosaved draft
    Publish {
        #[arg(long, env = "INKWELL_USER_ID")]
        user_id: Uuid,

        #[arg(long, env = "INKWELL_ACCESS_TOKEN", hide_env_values = true)]
        token: String,

        /// Save as an unpublished post
        #[arg(long)]
        draft: bool,

        #[arg(long)]
        excerpt: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// List published posts, newest first
    Feed {
        /// Zero-based page of six posts
        #[arg(short, long, default_value_t = 0)]
        page: u32,

        /// Match title, content or excerpt
        #[arg(short, long, default_value = "")]
        search: String,

        #[arg(long)]
        category: Option<String>,
    },

    /// Toggle a like on a post
    Like {
        post_id: Uuid,

        #[arg(long, env = "INKWELL_USER_ID")]
        user_id: Uuid,

        #[arg(long, env = "INKWELL_ACCESS_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Work with collaboration rooms
    Collab {
        #[arg(long, env = "INKWELL_USER_ID")]
        user_id: Uuid,

        #[arg(long, env = "INKWELL_ACCESS_TOKEN", hide_env_values = true)]
        token: String,

        #[command(subcommand)]
        action: CollabAction,
    },

    /// Show Inkwell server status
    Status,
}

#[derive(Debug, Subcommand)]
enum CollabAction {
    /// Rooms you created or joined
    List,

    Create {
        title: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        max: Option<i32>,
    },

    Join {
        collaboration_id: Uuid,

        #[arg(long, default_value = "collaborator")]
        role: String,
    },

    Leave {
        collaboration_id: Uuid,
    },

    Invite {
        collaboration_id: Uuid,

        email: String,

        #[arg(long, default_value = "collaborator")]
        role: String,
    },

    /// Ask everyone in the room for feedback
    Feedback {
        collaboration_id: Uuid,

        message: String,
    },
}

#[derive(Debug, Subcommand)]
enum DraftAction {
    Show,
    Clear,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ActionArg {
    Generate,
    Seo,
    Regenerate,
}

impl From<ActionArg> for SuggestionAction {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Generate => SuggestionAction::Generate,
            ActionArg::Seo => SuggestionAction::Seo,
            ActionArg::Regenerate => SuggestionAction::Regenerate,
        }
    }
}

// ============================================================================
// Output formatting
// ============================================================================

fn mark(passed: bool) -> &'static str {
    if passed {
        "✅"
    } else {
        "❌"
    }
}

/// Human-readable SEO report.
pub fn render_seo(report: &SeoReport) -> String {
    let mut out = format!("SEO score: {}/100 ({:?})\n", report.score, report.grade);
    out.push_str(&format!("{} Title length (30-60 chars)\n", mark(report.title_length)));
    out.push_str(&format!(
        "{} Meta description (120-160 chars)\n",
        mark(report.meta_description)
    ));
    out.push_str(&format!(
        "{} Keywords ({} of at least 3)\n",
        mark(report.keywords),
        report.keyword_count
    ));
    out.push_str(&format!("{} Content length (300+ chars)\n", mark(report.content_length)));
    out
}

/// Numbered suggestion list, or a placeholder when there are none.
pub fn render_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        return "No suggestions available.\n".to_string();
    }
    suggestions
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}\n", i + 1, s))
        .collect()
}

/// One line per room with its seat count.
pub fn render_collaborations(rooms: &[Collaboration]) -> String {
    if rooms.is_empty() {
        return "No collaborations yet.\n".to_string();
    }
    rooms
        .iter()
        .map(|room| {
            let seats = match room.max_collaborators {
                Some(max) => format!("{}/{}", room.current_collaborators, max),
                None => room.current_collaborators.to_string(),
            };
            format!("{}  {} [{}] {} seats\n", room.id, room.title, room.status, seats)
        })
        .collect()
}

// ============================================================================
// Helpers
// ============================================================================

/// Errors from the data service or assistant, however they were wrapped.
fn is_remote_failure(e: &anyhow::Error) -> bool {
    e.downcast_ref::<InkwellError>().is_some_and(InkwellError::is_remote)
        || e.downcast_ref::<EditorError>().is_some_and(EditorError::is_remote)
}

fn load_config(path: &str) -> Result<InkwellConfig, InkwellError> {
    Ok(InkwellConfig::load_or_default(path)?)
}

fn draft_store(config: &InkwellConfig) -> FileDraftStore {
    FileDraftStore::from_config(&config.storage)
}

/// Title and content from a file, or from the autosave slot.
fn read_draft(config: &InkwellConfig, file: Option<&PathBuf>) -> anyhow::Result<(String, String)> {
    match file {
        Some(path) => Ok((String::new(), std::fs::read_to_string(path)?)),
        None => match draft_store(config).load() {
            Some(record) => Ok((record.title, record.content)),
            None => anyhow::bail!("no autosaved draft; pass --file"),
        },
    }
}

fn posts_client(config: &InkwellConfig, token: Option<String>) -> anyhow::Result<RestPostClient> {
    let client = RestPostClient::from_env(&config.posts)?;
    Ok(match token {
        Some(token) => client.with_access_token(token),
        None => client,
    })
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}

// ============================================================================
// Commands
// ============================================================================

fn do_draft(config: &InkwellConfig, action: DraftAction) -> anyhow::Result<()> {
    let store = draft_store(config);
    match action {
        DraftAction::Show => match store.load() {
            Some(record) => {
                println!("Title:      {}", record.title);
                println!("Last saved: {}", record.saved_at.format("%Y-%m-%d %H:%M:%S UTC"));
                println!();
                println!("{}", record.content);
            }
            None => println!("No autosaved draft at {}", store.path().display()),
        },
        DraftAction::Clear => {
            store.clear()?;
            println!("Draft cleared");
        }
    }
    Ok(())
}

fn do_seo(
    config: &InkwellConfig,
    title: String,
    meta_description: String,
    keywords: Vec<String>,
    file: Option<PathBuf>,
    json_output: bool,
) -> anyhow::Result<()> {
    let (draft_title, content) = read_draft(config, file.as_ref())?;
    let mut keyword_set = seo::KeywordSet::new();
    for keyword in &keywords {
        keyword_set.add(keyword);
    }

    let input = SeoInput {
        title: if title.is_empty() { draft_title } else { title },
        meta_description,
        keywords: keyword_set.into_vec(),
        content,
    };
    let report = seo::score(&input);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_seo(&report));
    }
    Ok(())
}

/// Call POST /assist and print what comes back.
fn do_suggest(
    server: &str,
    config: &InkwellConfig,
    action: ActionArg,
    prior: Vec<String>,
    file: Option<PathBuf>,
    title: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    let (draft_title, content) = read_draft(config, file.as_ref())?;
    let mut request = inkwell_core::SuggestionRequest::new(action.into(), title.unwrap_or(draft_title), content);
    if !prior.is_empty() {
        request = request.with_prior(prior);
    }

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()?;

    let url = format!("{}/assist", server);
    let resp = match client.post(&url).json(&request).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("inkwell-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    // Error bodies share the response shape, so parse before checking status.
    let status = resp.status();
    let response: SuggestionResponse = match resp.json() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("inkwell-cli: server returned {} with an unreadable body: {}", status, e);
            std::process::exit(1);
        }
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if let SuggestionResponse::Error { error } = &response {
        eprintln!("inkwell-cli: assistant error: {}", error);
    }
    print!("{}", render_suggestions(&response.into_suggestions()));
    Ok(())
}

fn do_publish(
    config: &InkwellConfig,
    user_id: Uuid,
    token: String,
    options: PublishOptions,
) -> anyhow::Result<()> {
    let store: Arc<dyn DraftStore> = Arc::new(draft_store(config));
    let client = posts_client(config, Some(token))?;

    runtime()?.block_on(async move {
        let mut editor = Editor::new(store, &config.autosave);
        if editor.mount().is_none() {
            anyhow::bail!("no autosaved draft to publish");
        }
        editor.recover()?;

        let post = editor.publish(&client, user_id, options).await?;
        println!("Published \"{}\" ({})", post.title, post.id);
        anyhow::Ok(())
    })
}

fn do_feed(config: &InkwellConfig, page: u32, search: &str, category: Option<String>) -> anyhow::Result<()> {
    let client = posts_client(config, None)?;
    let filter = PostFilter {
        category,
        ..PostFilter::discover(page, search)
    };

    let posts = runtime()?.block_on(client.fetch_posts(&filter)).map_err(InkwellError::from)?;
    if posts.is_empty() {
        eprintln!("No published posts on page {}", page);
        return Ok(());
    }
    for post in posts {
        println!("{}  {}", post.id, post.title);
        println!(
            "    {} min read · {} likes · {}",
            post.reading_time.unwrap_or(1),
            post.likes_count,
            post.created_at.format("%Y-%m-%d")
        );
    }
    Ok(())
}

fn do_like(config: &InkwellConfig, post_id: Uuid, user_id: Uuid, token: String) -> anyhow::Result<()> {
    let client = posts_client(config, Some(token))?;
    let outcome = runtime()?
        .block_on(client.like_post(post_id, user_id))
        .map_err(InkwellError::from)?;
    println!("{:?}", outcome);
    Ok(())
}

fn do_collab(config: &InkwellConfig, user_id: Uuid, token: String, action: CollabAction) -> anyhow::Result<()> {
    let client = posts_client(config, Some(token))?;
    let rt = runtime()?;

    match action {
        CollabAction::List => {
            let rooms = rt.block_on(client.fetch_collaborations(user_id)).map_err(InkwellError::from)?;
            print!("{}", render_collaborations(&rooms));
        }
        CollabAction::Create {
            title,
            description,
            category,
            max,
        } => {
            let mut room = NewCollaboration::new(user_id, title);
            if let Some(description) = description {
                room = room.with_description(description);
            }
            if let Some(category) = category {
                room = room.with_category(category);
            }
            if let Some(max) = max {
                room = room.with_max_collaborators(max);
            }
            let created = rt.block_on(client.create_collaboration(room)).map_err(InkwellError::from)?;
            println!("Created \"{}\" ({})", created.title, created.id);
        }
        CollabAction::Join { collaboration_id, role } => {
            rt.block_on(client.join_collaboration(collaboration_id, user_id, &role))
                .map_err(InkwellError::from)?;
            println!("Joined {} as {}", collaboration_id, role);
        }
        CollabAction::Leave { collaboration_id } => {
            rt.block_on(client.leave_collaboration(collaboration_id, user_id))
                .map_err(InkwellError::from)?;
            println!("Left {}", collaboration_id);
        }
        CollabAction::Invite {
            collaboration_id,
            email,
            role,
        } => {
            let invitation = Invitation {
                collaboration_id,
                inviter_id: user_id,
                email: email.clone(),
                role: role.clone(),
            };
            rt.block_on(client.invite_collaborator(invitation)).map_err(InkwellError::from)?;
            println!("Invitation sent to {} for role: {}", email, role);
        }
        CollabAction::Feedback {
            collaboration_id,
            message,
        } => {
            let request = FeedbackRequest {
                collaboration_id,
                requester_id: user_id,
                message,
            };
            rt.block_on(client.request_feedback(request)).map_err(InkwellError::from)?;
            println!("Feedback requested from everyone in {}", collaboration_id);
        }
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let url = format!("{}/health", server);
    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Inkwell server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:        {}", body["version"].as_str().unwrap_or("?"));
            println!("Relay scope:    {}", body["relay_scope"].as_str().unwrap_or("?"));
            println!("Assistant:      {}", body["assistant"].as_str().unwrap_or("not configured"));
        }
        Ok(r) => {
            eprintln!("inkwell-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("inkwell-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with command output.
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let server = cli.server.trim_end_matches('/').to_string();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("inkwell-cli: failed to load config from {}: {}", cli.config, e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Write => runtime().and_then(|rt| rt.block_on(write::run(&config))),
        Commands::Draft { action } => do_draft(&config, action),
        Commands::Seo {
            title,
            meta_description,
            keywords,
            file,
            json,
        } => do_seo(&config, title, meta_description, keywords, file, json),
        Commands::Suggest {
            action,
            prior,
            file,
            title,
            json,
        } => do_suggest(&server, &config, action, prior, file, title, json),
        Commands::Publish {
            user_id,
            token,
            draft,
            excerpt,
            category,
            tags,
        } => do_publish(
            &config,
            user_id,
            token,
            PublishOptions {
                published: !draft,
                excerpt,
                category,
                tags,
            },
        ),
        Commands::Feed { page, search, category } => do_feed(&config, page, &search, category),
        Commands::Like {
            post_id,
            user_id,
            token,
        } => do_like(&config, post_id, user_id, token),
        Commands::Collab {
            user_id,
            token,
            action,
        } => do_collab(&config, user_id, token, action),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("inkwell-cli: {}", e);
        if is_remote_failure(&e) {
            eprintln!("inkwell-cli: the remote service failed; try again later");
        }
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

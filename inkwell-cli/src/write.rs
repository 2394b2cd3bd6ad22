//! Interactive writing session.
//!
//! Plain lines are appended to the content; lines starting with `:` are
//! commands. Autosave runs in the background with the configured quiet period.

use std::sync::Arc;

use inkwell_core::seo::{self, SeoInput};
use inkwell_core::{DraftStore, InkwellConfig};
use inkwell_editor::{Editor, EditorError, EditorNotice, PublishOptions};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

const HELP: &str = "\
Type to append lines to the draft. Commands:
  :title <text>   set the title
  :save           save the draft now
  :show           print the draft
  :seo            score the draft
  :clear          discard the autosaved copy
  :publish        publish (needs INKWELL_USER_ID and INKWELL_ACCESS_TOKEN)
  :quit           leave the session
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Text(String),
    Title(String),
    Save,
    Show,
    Seo,
    Clear,
    Publish,
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_line(line: &str) -> Input {
    let Some(command) = line.strip_prefix(':') else {
        return Input::Text(line.to_string());
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command.trim(), ""),
    };

    match name {
        "title" | "t" => Input::Title(rest.to_string()),
        "save" | "w" => Input::Save,
        "show" | "p" => Input::Show,
        "seo" => Input::Seo,
        "clear" => Input::Clear,
        "publish" => Input::Publish,
        "help" | "h" => Input::Help,
        "quit" | "q" => Input::Quit,
        other => Input::Unknown(other.to_string()),
    }
}

/// Content after appending one typed line.
pub fn append_line(content: &str, line: &str) -> String {
    if content.is_empty() {
        line.to_string()
    } else {
        format!("{}\n{}", content, line)
    }
}

/// Yes unless the answer starts with `n`.
pub fn wants_recovery(answer: &str) -> bool {
    !answer.trim().to_lowercase().starts_with('n')
}

fn describe(notice: &EditorNotice) -> String {
    match notice {
        EditorNotice::AutoSaved { saved_at } => format!("Draft auto-saved at {}", saved_at.format("%H:%M:%S")),
        EditorNotice::Saved { saved_at } => format!("Draft saved at {}", saved_at.format("%H:%M:%S")),
        EditorNotice::DraftCleared => "Draft cleared".to_string(),
        EditorNotice::Published { post_id } => format!("Published {}", post_id),
        EditorNotice::PublishFailed { error } => format!("Publish failed: {}", error),
        EditorNotice::AutoSaveFailed { error } => format!("Autosave failed: {}", error),
    }
}

/// Show visible notices until the editor goes away. Falling behind only skips
/// the missed toasts.
async fn show_notices(mut notices: broadcast::Receiver<EditorNotice>, mut show: impl FnMut(&EditorNotice)) {
    loop {
        match notices.recv().await {
            Ok(notice) if notice.is_visible() => show(&notice),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "Missed editor notices"),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn next_line(lines: &mut Lines<BufReader<Stdin>>) -> anyhow::Result<Option<String>> {
    Ok(lines.next_line().await?)
}

pub async fn run(config: &InkwellConfig) -> anyhow::Result<()> {
    let store: Arc<dyn DraftStore> = Arc::new(crate::draft_store(config));
    let mut editor = Editor::new(store, &config.autosave);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // Toasts go to stderr so the draft itself can be piped.
    let toaster = tokio::spawn(show_notices(editor.subscribe(), |notice| {
        eprintln!("· {}", describe(notice))
    }));

    if let Some(offered) = editor.mount().cloned() {
        eprintln!(
            "Found an unsaved draft \"{}\" from {}. Recover it? [Y/n]",
            offered.title,
            offered.saved_at.format("%Y-%m-%d %H:%M")
        );
        let answer = next_line(&mut lines).await?.unwrap_or_default();
        if wants_recovery(&answer) {
            editor.recover()?;
            eprintln!("Recovered {} characters", editor.session().content().chars().count());
        } else {
            editor.dismiss()?;
        }
    }

    eprint!("{}", HELP);

    while let Some(line) = next_line(&mut lines).await? {
        match parse_line(&line) {
            Input::Text(text) => {
                let content = append_line(editor.session().content(), &text);
                editor.set_content(content);
            }
            Input::Title(title) => editor.set_title(title),
            Input::Save => {
                if let Err(e) = editor.force_save() {
                    eprintln!("Save failed: {}", e);
                }
            }
            Input::Show => {
                let session = editor.session();
                println!("# {}\n\n{}", session.title(), session.content());
            }
            Input::Seo => {
                let session = editor.session();
                let report = seo::score(&SeoInput {
                    title: session.title().to_string(),
                    content: session.content().to_string(),
                    ..Default::default()
                });
                print!("{}", crate::render_seo(&report));
            }
            Input::Clear => {
                if let Err(e) = editor.clear_draft() {
                    eprintln!("Clear failed: {}", e);
                }
            }
            Input::Publish => publish(&editor, config).await,
            Input::Help => eprint!("{}", HELP),
            Input::Quit => break,
            Input::Unknown(name) => eprintln!("Unknown command :{} (try :help)", name),
        }
    }

    if editor.session().is_dirty() {
        eprintln!("Unsaved changes since the last autosave were not kept.");
    }
    editor.unmount();
    toaster.abort();
    Ok(())
}

async fn publish(editor: &Editor, config: &InkwellConfig) {
    let user_id = std::env::var("INKWELL_USER_ID").ok().and_then(|v| Uuid::parse_str(&v).ok());
    let token = std::env::var("INKWELL_ACCESS_TOKEN").ok();
    let (Some(user_id), Some(token)) = (user_id, token) else {
        eprintln!("Set INKWELL_USER_ID and INKWELL_ACCESS_TOKEN to publish");
        return;
    };

    let client = match crate::posts_client(config, Some(token)) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Cannot reach the posts service: {}", e);
            return;
        }
    };

    let options = PublishOptions {
        published: true,
        ..Default::default()
    };
    // Service outcomes arrive as notices; only local refusals are printed here.
    match editor.publish(&client, user_id, options).await {
        Err(e @ EditorError::Incomplete(_)) => eprintln!("{}", e),
        Err(e) => tracing::debug!(error = %e, "Publish from session failed"),
        Ok(_) => {}
    }
}

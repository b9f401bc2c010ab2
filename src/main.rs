use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use render_critic::config::{
    self, DEFAULT_COMPLETION_ENDPOINT, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT,
    DEFAULT_USER_PROMPT, ENV_COMPLETION_ENDPOINT, ENV_MAX_TOKENS, ENV_MODEL,
};
use render_critic::{
    AutoConfirm, CredentialBundle, CritiqueConfig, CritiqueOutcome, HttpCompletionClient,
    MenuStatus, PromptPair, PublishOutcome, PublishPlan, RenderArtifact, ReviewSurface,
    SelectionMenu, Session, SessionFields, ShotgridClient, TerminalReview,
    TrackingConfig, cleanup_old_sessions, list_sessions, review_and_publish, run_critique_stage,
};

/// Render Critic - vision model critique and Shotgrid publish for renders
#[derive(Parser, Debug)]
#[command(
    name = "render-critic",
    about = "Critique renders with a vision model and publish them to Shotgrid",
    after_help = "ENVIRONMENT VARIABLES:\n\
        RENDER_CRITIC_COMPLETION_ENDPOINT   Chat completions endpoint URL\n\
        RENDER_CRITIC_MODEL                 Vision model name\n\
        RENDER_CRITIC_MAX_TOKENS            Maximum tokens per critique\n\
        RENDER_CRITIC_COMPLETION_TIMEOUT    Completion request timeout in seconds\n\
        RENDER_CRITIC_TRACKING_TIMEOUT      Shotgrid request timeout in seconds\n\
        RENDER_CRITIC_PAGE_SIZE             Records per Shotgrid search page\n\
        RENDER_CRITIC_NOTE_SUBJECT          Subject of published notes\n\
        RENDER_CRITIC_SESSION_DIR           Base directory for sessions\n\
        RUST_LOG                            Log filter (overrides -v)"
)]
struct Args {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args, Debug)]
struct RenderArgs {
    /// Rendered image to critique
    #[arg(short, long)]
    render: PathBuf,

    /// Credentials JSON file
    #[arg(short, long)]
    creds: PathBuf,

    /// System prompt for the vision model
    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT)]
    system_prompt: String,

    /// User prompt for the vision model
    #[arg(long, default_value = DEFAULT_USER_PROMPT)]
    user_prompt: String,

    /// Description stored on the published Version
    #[arg(short, long, default_value = "")]
    description: String,

    /// Enable Shotgrid lookups and publish
    #[arg(long)]
    tracking: bool,

    /// Render resolution as WxH (default: read from the image)
    #[arg(long)]
    resolution: Option<String>,

    /// Base directory for sessions (default: $RENDER_CRITIC_SESSION_DIR)
    #[arg(long)]
    session_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct CompletionArgs {
    /// Chat completions endpoint URL
    #[arg(long, env = ENV_COMPLETION_ENDPOINT, default_value = DEFAULT_COMPLETION_ENDPOINT)]
    endpoint: String,

    /// Vision model name
    #[arg(long, env = ENV_MODEL, default_value = DEFAULT_MODEL)]
    model: String,

    /// Maximum tokens in the critique
    #[arg(long, env = ENV_MAX_TOKENS, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,
}

#[derive(clap::Args, Debug, Default)]
struct SelectArgs {
    /// Project id to select
    #[arg(long)]
    project: Option<i64>,

    /// Sequence id to select (within the project)
    #[arg(long)]
    sequence: Option<i64>,

    /// Shot id to select (within the sequence)
    #[arg(long)]
    shot: Option<i64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a review session for a render
    Init {
        #[command(flatten)]
        render: RenderArgs,

        /// Session name prefix (default: render file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Critique the session's render and store the result
    Critique {
        /// Session directory
        #[arg(short, long)]
        session: PathBuf,

        #[command(flatten)]
        completion: CompletionArgs,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Refresh the Project / Sequence / Shot menus and update the selection
    Menus {
        /// Session directory
        #[arg(short, long)]
        session: PathBuf,

        #[command(flatten)]
        select: SelectArgs,
    },

    /// Review the render and critique, then publish to Shotgrid on confirmation
    Review {
        /// Session directory
        #[arg(short, long)]
        session: PathBuf,

        /// Publish without the interactive review
        #[arg(short, long)]
        yes: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Critique, select and review in one go
    Run {
        #[command(flatten)]
        render: RenderArgs,

        #[command(flatten)]
        completion: CompletionArgs,

        #[command(flatten)]
        select: SelectArgs,

        /// Keep the session directory afterwards
        #[arg(long, short = 'k')]
        keep: bool,

        /// Publish without the interactive review
        #[arg(short, long)]
        yes: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List or prune sessions
    Sessions {
        /// Base directory for sessions
        #[arg(long, global = true)]
        session_dir: Option<PathBuf>,

        #[command(subcommand)]
        action: SessionsAction,
    },
}

#[derive(Subcommand, Debug)]
enum SessionsAction {
    /// List session directories
    List,

    /// Remove sessions older than the given age
    Prune {
        /// Maximum age in hours
        #[arg(long, default_value_t = 24)]
        max_age_hours: u64,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Some(Commands::Init { render, name }) => {
            let session = create_session(&render, name.as_deref(), true)?;
            println!("Created session: {}", session.dir.display());
        }

        Some(Commands::Critique {
            session,
            completion,
            json,
        }) => {
            let session = Session::open(&session)?;
            let outcome = critique(&session, &completion)?;
            print_critique(&outcome, json)?;
        }

        Some(Commands::Menus { session, select }) => {
            let session = Session::open(&session)?;
            let fields = refresh_menus(&session, &select)?;
            print_menus(&fields);
        }

        Some(Commands::Review { session, yes, json }) => {
            let session = Session::open(&session)?;
            let outcome = review(&session, yes)?;
            print_publish(&outcome, json)?;
        }

        Some(Commands::Run {
            render,
            completion,
            select,
            keep,
            yes,
            json,
        }) => {
            let tracking = render.tracking;
            let session = create_session(&render, None, keep)?;

            let outcome = critique(&session, &completion)?;
            print_critique(&outcome, json)?;

            if tracking {
                refresh_menus(&session, &select)?;
                let outcome = review(&session, yes)?;
                print_publish(&outcome, json)?;
            }

            if keep && !json {
                println!("\nSession: {}", session.dir.display());
            }
        }

        Some(Commands::Sessions {
            session_dir,
            action,
        }) => {
            let session_dir = base_dir(session_dir.as_deref());
            match action {
                SessionsAction::List => {
                    for dir in list_sessions(&session_dir)? {
                        println!("{}", dir.display());
                    }
                }
                SessionsAction::Prune { max_age_hours } => {
                    let max_age = Duration::from_secs(max_age_hours * 3600);
                    let removed = cleanup_old_sessions(&session_dir, max_age)?;
                    println!("Removed {} session(s)", removed);
                }
            }
        }

        None => {
            println!("Render Critic - vision model critique and Shotgrid publish for renders");
            println!();
            println!("Usage: render-critic <COMMAND>");
            println!();
            println!("Commands:");
            println!("  init      Create a review session for a render");
            println!("  critique  Critique the session's render");
            println!("  menus     Refresh Shotgrid menus and select the publish target");
            println!("  review    Review and publish to Shotgrid");
            println!("  run       Critique, select and review in one go");
            println!("  sessions  List or prune sessions");
            println!();
            println!("Run with --help for more information.");
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "render_critic=warn",
        1 => "render_critic=info",
        _ => "render_critic=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn create_session(args: &RenderArgs, name: Option<&str>, keep: bool) -> Result<Session> {
    let render = match &args.resolution {
        Some(res) => {
            let (w, h) = parse_resolution(res)
                .with_context(|| format!("Invalid resolution '{}'. Use WxH, e.g. 1920x1080", res))?;
            RenderArtifact::with_resolution(&args.render, w, h)
        }
        None => RenderArtifact::open(&args.render)?,
    };

    let mut fields = SessionFields {
        credentials_path: Some(absolute(&args.creds)?),
        prompts: PromptPair::new(&args.system_prompt, &args.user_prompt),
        description: args.description.clone(),
        tracking_enabled: args.tracking,
        ..Default::default()
    };
    if !args.tracking {
        fields.selection.disable_all();
    }

    let name = name.map(str::to_string).unwrap_or_else(|| render.stem());
    fields.render = Some(render);

    let session = Session::with_name(base_dir(args.session_dir.as_deref()), &name).keep(keep);
    session.init(&fields)?;
    Ok(session)
}

fn base_dir(flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(config::session_base_dir()))
}

fn load_credentials(fields: &SessionFields) -> Result<CredentialBundle> {
    let path = fields
        .credentials_path
        .as_ref()
        .context("session has no credentials file")?;
    Ok(CredentialBundle::load(path)?)
}

fn critique(session: &Session, args: &CompletionArgs) -> Result<CritiqueOutcome> {
    let _lock = session.lock()?;
    let mut fields = session.load_fields()?;
    let creds = load_credentials(&fields)?;

    let config = CritiqueConfig::new(&args.endpoint)
        .model(&args.model)
        .max_tokens(args.max_tokens);
    let client = HttpCompletionClient::new(creds.completion_key()?, &config);

    let critique = run_critique_stage(&mut fields, &client, &config).context("Critique failed")?;
    session.save_fields(&fields)?;

    Ok(CritiqueOutcome {
        session: session.dir.clone(),
        image: fields.render.map(|r| r.path).unwrap_or_default(),
        model: config.model,
        critique,
    })
}

fn refresh_menus(session: &Session, select: &SelectArgs) -> Result<SessionFields> {
    let _lock = session.lock()?;
    let mut fields = session.load_fields()?;

    if !fields.tracking_enabled {
        fields.selection.disable_all();
        session.save_fields(&fields)?;
        return Ok(fields);
    }

    let creds = load_credentials(&fields)?;
    let client = ShotgridClient::connect(creds.tracking()?, &TrackingConfig::default())
        .context("Could not connect to Shotgrid")?;

    let selection = &mut fields.selection;
    selection.refresh(&client);
    if let Some(id) = select.project {
        selection.choose_project(&client, id)?;
    }
    if let Some(id) = select.sequence {
        selection.choose_sequence(&client, id)?;
    }
    if let Some(id) = select.shot {
        selection.select_shot(id)?;
    }

    session.save_fields(&fields)?;
    Ok(fields)
}

fn review(session: &Session, yes: bool) -> Result<PublishOutcome> {
    let _lock = session.lock()?;
    let fields = session.load_fields()?;
    if !fields.tracking_enabled {
        bail!("Shotgrid integration is disabled for this session (use --tracking)");
    }

    let render = fields.render.as_ref().context("session has no render")?;
    let target = fields.selection.target()?;
    let tracking_config = TrackingConfig::default();
    let plan = PublishPlan::new(
        target,
        render,
        &fields.description,
        fields.critique.as_deref(),
        &tracking_config.note_subject,
    )?;

    let creds = load_credentials(&fields)?;
    let client = ShotgridClient::connect(creds.tracking()?, &tracking_config)
        .context("Could not connect to Shotgrid")?;

    let mut terminal = TerminalReview::new();
    let mut auto = AutoConfirm;
    let surface: &mut dyn ReviewSurface = if yes { &mut auto } else { &mut terminal };

    let review = review_and_publish(surface, render, &plan, &client)?;
    Ok(PublishOutcome::new(&session.dir, &plan.target, review))
}

fn print_critique(outcome: &CritiqueOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        println!("Critique of {} ({}):", outcome.image.display(), outcome.model);
        println!("{}", outcome.critique);
    }
    Ok(())
}

fn print_publish(outcome: &PublishOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    match (outcome.version_id, outcome.note_id) {
        (Some(version_id), Some(note_id)) if !outcome.cancelled => println!(
            "Published to Shotgrid: version {}, note {} (project {}, shot {})",
            version_id, note_id, outcome.project_id, outcome.shot_id
        ),
        _ => println!("Review cancelled, nothing published"),
    }
    Ok(())
}

fn print_menus(fields: &SessionFields) {
    print_menu("Projects", &fields.selection.projects);
    print_menu("Sequences", &fields.selection.sequences);
    print_menu("Shots", &fields.selection.shots);
}

fn print_menu(title: &str, menu: &SelectionMenu) {
    match &menu.status {
        MenuStatus::Unloaded => println!("{}: (select a parent first)", title),
        MenuStatus::Disabled => println!("{}: (Shotgrid integration disabled)", title),
        MenuStatus::Failed { reason } => println!("{}: lookup failed: {}", title, reason),
        MenuStatus::Ready => {
            println!("{}:", title);
            for choice in &menu.items {
                let marker = if menu.selected == Some(choice.id) { '*' } else { ' ' };
                println!("  {} {:>8}  {}", marker, choice.id, choice.label);
            }
        }
    }
}

/// Parse a resolution string "WxH"
fn parse_resolution(res: &str) -> Option<(u32, u32)> {
    let res = res.to_lowercase();
    let (w, h) = res.split_once('x')?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

/// Sessions outlive the working directory they were created from
fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path {}", path.display()))
}

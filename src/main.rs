use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use crossterm::event::{Event, EventStream, KeyCode, KeyModifiers};
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::{DefaultTerminal, Frame};
use tokio_stream::StreamExt;

use vlogs_export::config::{Config, ConfigOverrides};
use vlogs_export::query::{self, QueryParameters, parse_param};
use vlogs_export::transfer::{HttpTransfer, Transfer};

mod env;
mod help;
mod logging;
mod subcommands;
mod util;
mod widgets;

use env::Message;
use logging::LogTarget;
use widgets::{EnvHandle, Widget, theme::Theme};

#[derive(clap::Parser)]
#[command(
    name = "vlogs-export",
    version,
    about = "Export VictoriaLogs query results to JSON Lines files",
    long_about = None
)]
struct Cli {
    /// Increase output verbosity (-v, -vv, etc.)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Base URL of the logs server
    #[arg(long, global = true)]
    server: Option<String>,

    /// Directory the exported files are written to
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// What closing the dialog does to a running download: detach or cancel
    #[arg(long, global = true)]
    on_close: Option<String>,

    /// Request timeout in seconds, 0 disables it
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Log file for the interactive mode
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(flatten)]
    query: QueryArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args)]
struct QueryArgs {
    /// LogsQL query
    #[arg(short, long, global = true)]
    query: Option<String>,

    /// Start of the time range
    #[arg(long, global = true)]
    start: Option<String>,

    /// End of the time range
    #[arg(long, global = true)]
    end: Option<String>,

    /// Tenant account id
    #[arg(long, global = true)]
    account_id: Option<String>,

    /// Tenant project id
    #[arg(long, global = true)]
    project_id: Option<String>,

    /// Extra query parameter, may be repeated
    #[arg(
        short = 'p',
        long = "param",
        value_name = "KEY=VALUE",
        value_parser = parse_param,
        global = true
    )]
    params: Vec<(String, String)>,
}

impl QueryArgs {
    /// `None` when no query parameter was given at all.
    fn into_params(self) -> Option<QueryParameters> {
        let mut params: QueryParameters = self.params.into_iter().collect();
        let named = [
            (query::QUERY, self.query),
            (query::START, self.start),
            (query::END, self.end),
            (query::ACCOUNT_ID, self.account_id),
            (query::PROJECT_ID, self.project_id),
        ];
        for (key, value) in named {
            if let Some(value) = value {
                params.insert(key, value);
            }
        }
        (!params.is_empty()).then_some(params)
    }
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Download the query results without starting the interface
    Export {
        /// File name without extension
        #[arg(short, long)]
        filename: Option<String>,

        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = <Cli as clap::Parser>::parse();

    let overrides = ConfigOverrides {
        server_url: cli.server,
        output_dir: cli.output_dir,
        on_close: cli.on_close,
        timeout_secs: cli.timeout_secs,
    };
    let config = Config::load(overrides).wrap_err("invalid configuration")?;

    let target = match cli.command {
        Some(Commands::Export { .. }) => LogTarget::Stderr,
        None => LogTarget::File(cli.log_file.unwrap_or_else(logging::default_log_file)),
    };
    logging::init(cli.verbose, target)?;
    tracing::info!(
        server = %config.server_url,
        output_dir = %config.output_dir.display(),
        close_policy = ?config.close_policy,
        "config_loaded"
    );

    let transfer = Arc::new(HttpTransfer::new(
        &config.server_url,
        config.output_dir.clone(),
        config.timeout,
    )?);
    let params = cli.query.into_params();

    match cli.command {
        Some(Commands::Export { filename, json }) => {
            let options = subcommands::export::Options { filename, json };
            subcommands::export::command(transfer.as_ref(), params, options).await
        }
        None => {
            let view = widgets::LogsView::new(
                params,
                config.server_url.clone(),
                transfer as Arc<dyn Transfer>,
                config.close_policy,
            );
            App::new(Arc::new(view)).run_tui().await
        }
    }
}

struct App {
    should_quit: bool,
    root: Arc<dyn Widget>,
}

impl App {
    const FRAMES_PER_SECOND: f32 = 60.0;

    fn new(root: Arc<dyn Widget>) -> Self {
        Self {
            should_quit: false,
            root,
        }
    }

    pub async fn run_tui(self) -> Result<()> {
        // Luma detection talks to the terminal, so it runs before raw mode.
        let theme = Theme::default();
        let terminal = ratatui::init();
        let app_result = self.run(terminal, theme).await;
        ratatui::restore();
        app_result
    }

    pub async fn run(
        mut self,
        mut terminal: DefaultTerminal,
        theme: Theme,
    ) -> Result<()> {
        let mut env = env::Env::new();
        let tx = env.tx();
        let rx = env.rx();

        let period = Duration::from_secs_f32(1.0 / Self::FRAMES_PER_SECOND);
        let mut interval = tokio::time::interval(period);
        let mut events = EventStream::new();
        let mut dirty = true;

        while !self.should_quit {
            tokio::select! {
                _ = interval.tick() => {
                    if dirty || self.root.is_animating() {
                        terminal
                            .draw(|frame| self.render(frame, &theme))
                            .wrap_err("drawing frame")?;
                        dirty = false;
                    }
                },
                Some(Ok(event)) = events.next() => {
                    self.handle_event(tx.clone(), &event);
                    dirty = true;
                },
                Some(message) = rx.recv() => {
                    match message {
                        Message::Invalidate => {}
                        Message::DownloadFinished(event) => {
                            self.root.on_download_finished(tx.clone(), event);
                        }
                    }
                    dirty = true;
                },
            }
        }
        Ok(())
    }

    fn render(&self, frame: &mut Frame, theme: &Theme) {
        let area = frame.area();
        util::fill_bg(frame.buffer_mut(), area, theme.bg());

        let entries = self.root.help().unwrap_or(&[]);
        let help_height = help::height(entries, area, theme);
        let layout = Layout::vertical([
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(help_height),
        ]);
        let [title_area, body_area, help_area] = area.layout(&layout);

        let title = Line::styled(
            "vlogs-export",
            Style::default()
                .fg(theme.accent())
                .add_modifier(Modifier::BOLD),
        )
        .centered();
        frame.render_widget(title, title_area);
        self.root.render(frame, body_area, theme);
        help::render(entries, frame, help_area, theme);
    }

    fn handle_event(&mut self, env: EnvHandle, event: &Event) {
        if let Some(key) = event.as_key_press_event()
            && key.code == KeyCode::Char('c')
            && key.modifiers.contains(KeyModifiers::CONTROL)
        {
            self.should_quit = true;
            return;
        }
        if self.root.handle_event(env, event) {
            return;
        }
        if let Some(key) = event.as_key_press_event() {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                _ => {}
            }
        }
    }
}

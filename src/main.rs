use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use research_stream::cli::{default_log_filter, resolve_config, Args};
use research_stream::client::JobStreamClient;
use research_stream::render::{self, Renderer};
use research_stream::session::{Progress, ResearchSession};
use research_stream::ResearchError;

enum Submitted {
    Done(Result<research_stream::TurnId, ResearchError>),
    Interrupted,
}

enum Step {
    Progress(Option<Progress>),
    Interrupted,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter(args.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if args.no_color {
        colored::control::set_override(false);
    }

    let config = resolve_config(&args)?;
    tracing::info!(base_url = %config.base_url, "using research backend");
    let client = JobStreamClient::new(config)?;
    let mut session = ResearchSession::new(client);
    let mut renderer = Renderer::new(args.thinking);

    if let Some(query) = &args.query {
        run_query(&mut session, &mut renderer, query).await;
        return Ok(());
    }

    println!(
        "{}",
        "Ask a research question. Ctrl-C stops a running search; /status, /quit.".dimmed()
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(render::prompt().as_bytes()).await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/status" => match session.current_job_status().await {
                Ok(Some(status)) => println!("job {}: {}", status.job_id, status.status),
                Ok(None) => println!("{}", "no job yet".dimmed()),
                Err(e) => println!("{}", render::banner(&e.to_string())),
            },
            query => run_query(&mut session, &mut renderer, query).await,
        }
    }
    Ok(())
}

async fn run_query(session: &mut ResearchSession, renderer: &mut Renderer, query: &str) {
    renderer.reset();

    let submitted = tokio::select! {
        r = session.ask(query) => Submitted::Done(r),
        _ = tokio::signal::ctrl_c() => Submitted::Interrupted,
    };
    let turn_id = match submitted {
        Submitted::Done(Ok(id)) => id,
        Submitted::Done(Err(e)) => {
            println!("{}", render::banner(&e.to_string()));
            return;
        }
        Submitted::Interrupted => match session.stop() {
            Some(id) => id,
            None => return,
        },
    };

    print_turn(session, renderer, turn_id);

    loop {
        let step = tokio::select! {
            p = session.next_update() => Step::Progress(p),
            _ = tokio::signal::ctrl_c() => Step::Interrupted,
        };
        match step {
            Step::Progress(None) | Step::Progress(Some(Progress::ConnectionLost(_))) => break,
            Step::Progress(Some(_)) => print_turn(session, renderer, turn_id),
            Step::Interrupted => {
                session.stop();
                print_turn(session, renderer, turn_id);
                break;
            }
        }
    }
    if let Some(text) = session.banner() {
        println!("{}", render::banner(text));
    }
}

fn print_turn(session: &ResearchSession, renderer: &mut Renderer, turn_id: research_stream::TurnId) {
    if let Some(turn) = session.store().get(turn_id) {
        for line in renderer.render(turn) {
            println!("{}", line);
        }
    }
}

pub mod agent_engine;
pub mod cli;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use crate::agent_engine::engine::{AgentEngine, EngineSettings};
use crate::agent_engine::interrupt::{InterruptKind, InterruptSignal};
use crate::cli::Cli;
use crate::config::AppConfig;
use crate::errors::{SeeClickError, SeeClickResult};
use crate::executor::input::driver_for;
use crate::executor::safety::CornerWatch;
use crate::llm::decision::DecisionClient;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;
use crate::perception::screenshot::XcapCapturer;

pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("seeclick=info,seeclick_lib=info")
                }),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(cli)) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> SeeClickResult<ExitCode> {
    let mut config = config::load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    let decider = build_decider(&config)?;

    if cli.ping {
        return ping(&decider, &config).await;
    }

    let goal = cli
        .goal
        .ok_or_else(|| SeeClickError::Config("a goal is required".into()))?;

    let interrupt = InterruptSignal::new();
    {
        let signal = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl-C received, stopping");
                signal.trip(InterruptKind::UserRequested);
            }
        });
    }

    // Held for the whole session; dropping it stops the watcher thread.
    let _corner_watch = (!config.agent.dry_run).then(|| {
        CornerWatch::spawn(
            interrupt.clone(),
            config.safety.corner_margin_px,
            config.safety.watch_interval(),
        )
    });

    if config.agent.dry_run {
        tracing::info!("dry run: clicks will be logged, not performed");
    } else {
        tracing::info!(
            "live run: move the pointer to the top-left corner or press Ctrl-C to abort"
        );
    }

    let engine = AgentEngine::new(
        Arc::new(XcapCapturer::new(config.agent.max_frame_width)),
        decider,
        driver_for(
            config.agent.dry_run,
            config.safety.corner_margin_px,
            interrupt.clone(),
        ),
        interrupt,
        EngineSettings::from(&config.agent),
    );

    let report = engine.run(&goal).await;

    println!("{}", report.status);
    match &report.log_path {
        Some(path) => println!("{} click(s) saved to {}", report.steps.len(), path.display()),
        None => println!("no clicks executed"),
    }

    Ok(if report.status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn build_decider(config: &AppConfig) -> SeeClickResult<DecisionClient> {
    let provider = OpenAiCompatibleProvider::new(
        "openai_compatible".into(),
        config.llm.api_url.clone(),
        config.llm.api_key.clone(),
        config.llm.request_timeout(),
        config.llm.retry_delay(),
    )?;
    tracing::info!(
        api_url = %config.llm.api_url,
        model = %config.llm.model,
        "model endpoint configured"
    );

    Ok(DecisionClient::new(
        Arc::new(provider),
        CallConfig {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        },
        config.agent.max_history_entries,
    ))
}

async fn ping(decider: &DecisionClient, config: &AppConfig) -> SeeClickResult<ExitCode> {
    let result = tokio::select! {
        r = decider.ping() => r,
        _ = tokio::signal::ctrl_c() => Err(SeeClickError::Interrupted("ping cancelled".into())),
    };

    match result {
        Ok(report) => {
            println!(
                "{} answered in {} ms: {}",
                config.llm.api_url,
                report.latency.as_millis(),
                report.text
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!(error = %e, api_url = %config.llm.api_url, "endpoint probe failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

//! `finqa chat`: Ask free-form questions about one dataset record.

use super::{CmdResult, build_provider, build_telemetry, load_config, require_api_key};
use finqa_agent::{ConversationOrchestrator, PromptSet, ReasoningGateway};
use finqa_core::{StudyCondition, TurnResult};
use finqa_eval::Dataset;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(config_path: Option<&Path>, record_id: &str, condition: u8) -> CmdResult {
    let config = load_config(config_path)?;
    require_api_key(&config)?;

    let condition = StudyCondition::from_id(condition).ok_or_else(|| {
        format!(
            "Unknown condition {condition} (expected 1-{})",
            StudyCondition::ALL.len()
        )
    })?;

    let dataset = Dataset::load(&config.study.data_path, &config.study.split)?;
    let record = dataset.find(record_id)?;
    let prompts = Arc::new(PromptSet::resolve(config.prompts.dir.as_deref())?);

    let mut gateway =
        ReasoningGateway::new(build_provider(&config)?).with_max_tokens(config.max_tokens);
    if let Some(telemetry) = build_telemetry(&config) {
        gateway = gateway.with_telemetry(telemetry);
    }
    let orchestrator = ConversationOrchestrator::new(gateway, condition, &config.models, prompts);
    let mut state = orchestrator.start(record);

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        FinQA Chat - Interactive Mode         ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Record:     {}", record.id);
    println!("  Condition:  {}", condition.label());
    println!("  Model:      {}", orchestrator.model());
    println!();
    for line in state.context().text_table.lines() {
        println!("  {line}");
    }
    println!();
    println!("  Earlier answers are available as ans_0, ans_1, ...");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        eprint!("  ...");
        let outcome = orchestrator.process_turn(&mut state, question).await;
        eprint!("\r     \r");

        match outcome {
            Ok(turn) => print_turn(&turn),
            Err(e) => println!("  [Error] {e}\n"),
        }
    }

    orchestrator.finish(&state);
    println!("  Goodbye! ({} turns)", state.history().len());
    Ok(())
}

fn print_turn(turn: &TurnResult) {
    if let Some(plan) = &turn.plan {
        println!("  Plan:       {}", plan.intent);
    }
    if turn.corrected {
        println!("  Review:     corrected after feedback");
    } else if turn.review_flagged() {
        println!("  Review:     flagged, correction not usable");
    }
    println!("  Expression: {}", turn.final_expression);
    println!("  Answer:     {}", turn.response);
    println!("              (ans_{} = {})", turn.turn_index, turn.raw_output);
    println!();
}

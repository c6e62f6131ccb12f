use prometheus::{Encoder, IntCounterVec, Registry, TextEncoder};
use lazy_static::lazy_static;
use std::sync::OnceLock;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}
static TURNS: OnceLock<IntCounterVec> = OnceLock::new();
static SUMMARY_FOLDS: OnceLock<IntCounterVec> = OnceLock::new();
static TOOL_CALLS: OnceLock<IntCounterVec> = OnceLock::new();

/// Register the process-wide counters. Safe to call more than once.
pub fn init_metrics() -> prometheus::Result<()> {
    if TURNS.get().is_some() {
        return Ok(());
    }
    let turns = IntCounterVec::new(
        prometheus::opts!("turns_total", "Chat turns by outcome"),
        &["outcome"],
    )?;
    let folds = IntCounterVec::new(
        prometheus::opts!("summary_folds_total", "Rolling summary maintenance runs by outcome"),
        &["outcome"],
    )?;
    let tools = IntCounterVec::new(
        prometheus::opts!("tool_calls_total", "Tool invocations requested by the agent"),
        &["tool"],
    )?;

    if TURNS.set(turns.clone()).is_ok() {
        REGISTRY.register(Box::new(turns)).ok();
    }
    if SUMMARY_FOLDS.set(folds.clone()).is_ok() {
        REGISTRY.register(Box::new(folds)).ok();
    }
    if TOOL_CALLS.set(tools.clone()).is_ok() {
        REGISTRY.register(Box::new(tools)).ok();
    }
    Ok(())
}

pub fn inc_turn(outcome: &str) {
    if let Some(counter) = TURNS.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn inc_summary_fold(outcome: &str) {
    if let Some(counter) = SUMMARY_FOLDS.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn inc_tool_call(tool: &str) {
    if let Some(counter) = TOOL_CALLS.get() {
        counter.with_label_values(&[tool]).inc();
    }
}

/// Prometheus text exposition of everything registered.
pub fn render_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

//! One-shot pipeline run printed as plain text.
//!
//! Region, category and period come from TRENDS_REGION / TRENDS_CATEGORY /
//! TRENDS_PERIOD, falling back to the config file.

use anyhow::Context;
use trend_radar::bootstrap::TrendRuntime;
use trend_radar::ingest::types::TimePeriod;
use trend_radar::RunRequest;

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let rt = TrendRuntime::from_env()?;

    let region = env_nonempty("TRENDS_REGION").unwrap_or_else(|| rt.cfg.region.clone());
    let period = match env_nonempty("TRENDS_PERIOD") {
        Some(p) => p.parse::<TimePeriod>().context("TRENDS_PERIOD")?,
        None => rt.cfg.period,
    };
    let mut req = RunRequest::new(region).period(period);
    if let Some(c) = env_nonempty("TRENDS_CATEGORY") {
        req = req.category(c);
    }

    let report = rt.pipeline.run(&req).await?;

    println!(
        "trends region={} source={} period={}",
        report.region,
        report.source.as_str(),
        report.period.as_str()
    );
    if let Some(w) = report.warning {
        println!("{w}");
    }
    for b in report.buckets.iter().filter(|b| !b.terms.is_empty()) {
        println!("[{}] {}", b.category, b.terms.join(", "));
    }
    if !report.top_traffic.is_empty() {
        println!("top by search volume:");
        for r in report.top_traffic.iter().take(10) {
            println!("  {:>10}  {}", r.traffic, r.topic);
        }
    }
    if !report.summaries.is_empty() {
        println!("week-over-week:");
        for s in &report.summaries {
            println!(
                "  {:>8.1}%  {:<8}  {} ({} -> {})",
                s.percent_change,
                format!("{:?}", s.status),
                s.term,
                s.start_value,
                s.end_value
            );
        }
    }
    Ok(())
}

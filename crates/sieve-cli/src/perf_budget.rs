use std::time::Instant;

use sieve_core::{
    BlockingSettings, FilterIndex, PolicyGate, RequestDescriptor, ResourceType, Verdict,
};

use crate::lists;

pub struct PerfBudgetOptions {
    pub input_paths: Vec<String>,
    pub iterations: usize,
}

struct BudgetRequest {
    url: &'static str,
    resource_type: ResourceType,
    initiator: Option<&'static str>,
}

const BUDGET_COLD_START_MS: f64 = 500.0;
const BUDGET_EVALUATE_P99_US: f64 = 1000.0;
const BUDGET_EVALUATE_P50_US: f64 = 50.0;

const BUDGET_REQUESTS: &[BudgetRequest] = &[
    BudgetRequest {
        url: "https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js",
        resource_type: ResourceType::Script,
        initiator: Some("example.com"),
    },
    BudgetRequest {
        url: "https://www.google-analytics.com/analytics.js",
        resource_type: ResourceType::Script,
        initiator: Some("example.com"),
    },
    BudgetRequest {
        url: "https://example.com/style.css",
        resource_type: ResourceType::Stylesheet,
        initiator: Some("example.com"),
    },
    BudgetRequest {
        url: "https://cdn.example.com/image.png",
        resource_type: ResourceType::Image,
        initiator: Some("example.com"),
    },
    BudgetRequest {
        url: "https://api.example.com/data.json?fbclid=abc&page=2",
        resource_type: ResourceType::Xhr,
        initiator: Some("example.com"),
    },
    BudgetRequest {
        url: "https://www.amazon.com/dp/B000?pd_rd_r=1&pd_rd_w=2&th=1",
        resource_type: ResourceType::MainFrame,
        initiator: None,
    },
];

pub fn run_perf_budget(opts: PerfBudgetOptions) -> Result<(), String> {
    println!("Performance Budget Check");
    println!("==================================================");

    println!("Compiling {} list(s)...", opts.input_paths.len());
    let cold_start_begin = Instant::now();
    let (index, stats) = lists::compile_lists(&opts.input_paths, false)?;
    let cold_start_ms = cold_start_begin.elapsed().as_secs_f64() * 1000.0;
    println!(
        "Indexed {} rules ({} host, {} token, {} fallback)",
        stats.build.index.rules,
        stats.build.index.host_rules,
        stats.build.index.token_rules,
        stats.build.index.fallback_rules
    );

    let gate = PolicyGate::default();
    let settings = BlockingSettings::default();

    println!("Warming up...");
    for _ in 0..1000 {
        for req in BUDGET_REQUESTS {
            let _ = evaluate(&gate, &index, &settings, req);
        }
    }

    println!("Measuring evaluate latency...");
    let latencies = measure_latency(&gate, &index, &settings, opts.iterations.max(1));
    let p50_us = percentile(&latencies, 0.50);
    let p99_us = percentile(&latencies, 0.99);

    let mut passed = true;
    println!();
    println!("Results");
    println!("--------------------------------------------------");

    passed &= report_budget("Cold Start", cold_start_ms, BUDGET_COLD_START_MS, "ms");
    passed &= report_budget("Evaluate P50 Latency", p50_us, BUDGET_EVALUATE_P50_US, "μs");
    passed &= report_budget("Evaluate P99 Latency", p99_us, BUDGET_EVALUATE_P99_US, "μs");

    println!();
    println!("==================================================");

    if passed {
        println!("✓ All performance budgets passed");
        Ok(())
    } else {
        Err("Performance budget exceeded".to_string())
    }
}

fn report_budget(name: &str, actual: f64, limit: f64, unit: &str) -> bool {
    let passed = actual <= limit;
    let status = if passed { "✓" } else { "✗" };
    println!(
        "{} {}: {:.2} {} (limit: {:.2} {})",
        status, name, actual, unit, limit, unit
    );
    passed
}

fn measure_latency(
    gate: &PolicyGate,
    index: &FilterIndex,
    settings: &BlockingSettings,
    iterations: usize,
) -> Vec<f64> {
    let mut latencies = Vec::with_capacity(iterations * BUDGET_REQUESTS.len());

    for _ in 0..iterations {
        for req in BUDGET_REQUESTS {
            let start = Instant::now();
            let _ = evaluate(gate, index, settings, req);
            latencies.push(start.elapsed().as_secs_f64() * 1_000_000.0);
        }
    }

    latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    latencies
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64) * p).ceil() as usize;
    let idx = idx.saturating_sub(1).min(sorted.len() - 1);
    sorted[idx]
}

fn evaluate(
    gate: &PolicyGate,
    index: &FilterIndex,
    settings: &BlockingSettings,
    req: &BudgetRequest,
) -> Verdict {
    gate.evaluate(
        index,
        settings,
        &RequestDescriptor {
            url: req.url,
            resource_type: req.resource_type,
            initiating_domain: req.initiator,
            is_main_frame: req.resource_type == ResourceType::MainFrame,
        },
    )
}

//! Sieve CLI
//!
//! CLI tool for compiling filter lists, checking requests against them and
//! stripping tracking parameters.

use clap::{Parser, Subcommand};

use sieve_core::{
    BlockingSettings, Decision, MatchContext, Matcher, ParamRewriter, PolicyGate, RawSettings,
    RequestDescriptor, ResourceType,
};

mod lists;
mod perf_budget;

#[derive(Parser)]
#[command(name = "sieve")]
#[command(about = "Sieve filter list compiler and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile filter lists and print index statistics
    Compile {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Decide a single request and print the decision as JSON
    Check {
        /// Request URL
        #[arg(long)]
        url: String,

        /// Resource type (script, image, xhr, mainFrame, ...)
        #[arg(long = "type", default_value = "other")]
        resource_type: ResourceType,

        /// Domain of the document that issued the request
        #[arg(long)]
        initiator: Option<String>,

        /// Blocking level: 0 off, 1 third-party, 2 all
        #[arg(long, default_value_t = 1)]
        level: u8,

        /// Resource types to block regardless of lists
        #[arg(long = "block-type")]
        block_types: Vec<String>,

        /// Initiating domains exempt from list blocking
        #[arg(long = "exception")]
        exceptions: Vec<String>,

        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,
    },

    /// Strip tracking parameters from URLs
    Strip {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Run the latency budget check
    Budget {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Rounds over the sample requests
        #[arg(long, default_value_t = 2000)]
        iterations: usize,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { input, verbose } => cmd_compile(&input, verbose),
        Commands::Check {
            url,
            resource_type,
            initiator,
            level,
            block_types,
            exceptions,
            input,
        } => {
            let settings = RawSettings {
                blocking_level: level,
                content_types: block_types,
                exception_domains: exceptions,
            };
            cmd_check(&input, &url, resource_type, initiator.as_deref(), &settings)
        }
        Commands::Strip { urls } => {
            cmd_strip(&urls);
            Ok(())
        }
        Commands::Budget { input, iterations } => {
            perf_budget::run_perf_budget(perf_budget::PerfBudgetOptions {
                input_paths: input,
                iterations,
            })
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_compile(inputs: &[String], verbose: bool) -> Result<(), String> {
    let (_, stats) = lists::compile_lists(inputs, verbose)?;
    let build = &stats.build;

    println!("Compiled {} filter lists", inputs.len());
    println!("  Lines:    {}", stats.lines);
    println!(
        "  Parsed:   {} rules ({} exceptions), {} ignored, {} skipped",
        build.parse.rules, build.parse.exceptions, build.parse.ignored, build.parse.errors
    );
    println!(
        "  Rules:    {} -> {} (dedupe {}, badfilter {} incl {})",
        build.optimize.before,
        build.optimize.after,
        build.optimize.deduped,
        build.optimize.badfiltered_rules + build.optimize.badfilter_rules,
        build.optimize.badfilter_rules
    );
    println!(
        "  Buckets:  {} host ({} rules), {} token ({} rules), {} fallback rules, largest {}",
        build.index.host_buckets,
        build.index.host_rules,
        build.index.token_buckets,
        build.index.token_rules,
        build.index.fallback_rules,
        build.index.largest_bucket
    );
    println!(
        "  Time:     {:.1}ms (parse: {:.1}ms, build: {:.1}ms)",
        stats.parse_ms + stats.build_ms,
        stats.parse_ms,
        stats.build_ms
    );

    Ok(())
}

fn cmd_check(
    inputs: &[String],
    url: &str,
    resource_type: ResourceType,
    initiator: Option<&str>,
    raw: &RawSettings,
) -> Result<(), String> {
    let settings = BlockingSettings::from_raw(raw).map_err(|e| e.to_string())?;
    let (index, _) = lists::compile_lists(inputs, false)?;

    let request = RequestDescriptor {
        url,
        resource_type,
        initiating_domain: initiator,
        is_main_frame: resource_type == ResourceType::MainFrame,
    };
    let decision = Decision::from(PolicyGate::default().evaluate(&index, &settings, &request));

    let outcome = Matcher::new(&index).match_request(&MatchContext::new(
        url,
        initiator,
        resource_type.element_type(),
    ));
    for (label, id) in [("blocked by", outcome.rule_id), ("allowed by", outcome.exception_id)] {
        if let Some(rule) = id.and_then(|id| index.rule(id)) {
            eprintln!("{label}: {}", rule.raw);
        }
    }

    let json = serde_json::to_string(&decision).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

fn cmd_strip(urls: &[String]) {
    let rewriter = ParamRewriter::default();
    for url in urls {
        println!("{}", rewriter.strip_tracking_params(url));
    }
}
